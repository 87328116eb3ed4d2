//! PostgreSQL 저장소 구현.
//!
//! sqlx 연결 풀 위에서 관측값 upsert, 수집 실행 기록, 체크포인트, 데이터 품질
//! 이슈 테이블을 다룹니다. 스키마는 `migrations/`에 있습니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use monitor_core::{
    Checkpoint, CheckpointKind, CheckpointStatus, CollectionRun, DataQualityIssue,
    DatabaseConfig, Observation, RunMode, RunStatus, RunType, StoreBackend,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    dedupe_observations, CheckpointStore, MonitorStore, ObservationStore, RunStore,
};
use crate::error::{DataError, Result};

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 새로운 데이터베이스 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(DataError::ConfigError(
                "DATABASE_URL이 설정되지 않았습니다".to_string(),
            ));
        }

        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 기존 연결 풀에서 Database 인스턴스를 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;
        Ok(true)
    }
}

// =============================================================================
// Records
// =============================================================================

/// 관측값 레코드.
#[derive(Debug, Clone, FromRow)]
struct ObservationRecord {
    series_id: String,
    date: NaiveDate,
    value: f64,
    vintage_date: NaiveDate,
}

impl From<ObservationRecord> for Observation {
    fn from(r: ObservationRecord) -> Self {
        Observation::new(r.series_id, r.date, r.value, r.vintage_date)
    }
}

/// 수집 실행 레코드.
#[derive(Debug, Clone, FromRow)]
struct RunRecord {
    id: Uuid,
    run_type: String,
    mode: String,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    total_series: i64,
    succeeded_series: i64,
    failed_series: i64,
    total_fetched: i64,
    total_inserted: i64,
    total_skipped: i64,
    total_missing: i64,
    errors: serde_json::Value,
    results: serde_json::Value,
}

impl RunRecord {
    fn into_run(self) -> Result<CollectionRun> {
        Ok(CollectionRun {
            id: self.id,
            run_type: self.run_type.parse::<RunType>()?,
            mode: self.mode.parse::<RunMode>()?,
            status: self.status.parse::<RunStatus>()?,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total_series: to_usize(self.total_series),
            succeeded_series: to_usize(self.succeeded_series),
            failed_series: to_usize(self.failed_series),
            total_fetched: to_usize(self.total_fetched),
            total_inserted: to_usize(self.total_inserted),
            total_skipped: to_usize(self.total_skipped),
            total_missing: to_usize(self.total_missing),
            errors: serde_json::from_value(self.errors)?,
            results: serde_json::from_value(self.results)?,
        })
    }
}

/// 체크포인트 레코드.
#[derive(Debug, Clone, FromRow)]
struct CheckpointRecord {
    id: String,
    checkpoint_type: String,
    run_id: Option<Uuid>,
    source: String,
    status: String,
    start_position: i64,
    current_position: i64,
    total_expected: Option<i64>,
    records_processed: i64,
    error_count: i32,
    last_error: Option<String>,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    fn into_checkpoint(self) -> Result<Checkpoint> {
        Ok(Checkpoint {
            id: self.id,
            kind: self.checkpoint_type.parse::<CheckpointKind>()?,
            run_id: self.run_id,
            source: self.source,
            status: self.status.parse::<CheckpointStatus>()?,
            start_position: self.start_position,
            current_position: self.current_position,
            total_expected: self.total_expected,
            records_processed: self.records_processed,
            error_count: self.error_count,
            last_error: self.last_error,
            payload: serde_json::from_value(self.payload)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn to_usize(v: i64) -> usize {
    usize::try_from(v).unwrap_or(0)
}

fn to_i64(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

// =============================================================================
// PgStore
// =============================================================================

/// PostgreSQL 기반 [`MonitorStore`].
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    /// 새 저장소 생성
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 내부 데이터베이스
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ObservationStore for PgStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_observations(&self, records: &[Observation]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut affected = 0;

        // 청크 단위 UNNEST 배치 upsert
        for chunk in dedupe_observations(records).chunks(1000) {
            let series_ids: Vec<String> = chunk.iter().map(|o| o.series_id.clone()).collect();
            let dates: Vec<NaiveDate> = chunk.iter().map(|o| o.date).collect();
            let values: Vec<f64> = chunk.iter().map(|o| o.value).collect();
            let vintages: Vec<NaiveDate> = chunk.iter().map(|o| o.vintage_date).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO economic_observations (series_id, date, value, vintage_date, updated_at)
                SELECT s, d, v, vd, NOW()
                FROM UNNEST($1::text[], $2::date[], $3::float8[], $4::date[]) AS t(s, d, v, vd)
                ON CONFLICT (series_id, date) DO UPDATE SET
                    value = EXCLUDED.value,
                    vintage_date = EXCLUDED.vintage_date,
                    updated_at = NOW()
                "#,
            )
            .bind(&series_ids)
            .bind(&dates)
            .bind(&values)
            .bind(&vintages)
            .execute(self.db.pool())
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            affected += result.rows_affected() as usize;
        }

        debug!(affected = affected, "Upserted observations");
        Ok(affected)
    }

    async fn latest_observation(&self, series_id: &str) -> Result<Option<Observation>> {
        let record: Option<ObservationRecord> = sqlx::query_as(
            r#"
            SELECT series_id, date, value, vintage_date
            FROM economic_observations
            WHERE series_id = $1
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(series_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(record.map(Observation::from))
    }

    async fn recent_observations(&self, series_id: &str, limit: usize) -> Result<Vec<Observation>> {
        let records: Vec<ObservationRecord> = sqlx::query_as(
            r#"
            SELECT series_id, date, value, vintage_date FROM (
                SELECT series_id, date, value, vintage_date
                FROM economic_observations
                WHERE series_id = $1
                ORDER BY date DESC
                LIMIT $2
            ) recent
            ORDER BY date ASC
            "#,
        )
        .bind(series_id)
        .bind(to_i64(limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(records.into_iter().map(Observation::from).collect())
    }
}

#[async_trait]
impl RunStore for PgStore {
    #[instrument(skip(self, run), fields(run_id = %run.id))]
    async fn insert_run(&self, run: &CollectionRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_runs (
                id, run_type, mode, status, started_at, finished_at,
                total_series, succeeded_series, failed_series,
                total_fetched, total_inserted, total_skipped, total_missing,
                errors, results
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(run.id)
        .bind(run.run_type.as_str())
        .bind(run.mode.as_str())
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(to_i64(run.total_series))
        .bind(to_i64(run.succeeded_series))
        .bind(to_i64(run.failed_series))
        .bind(to_i64(run.total_fetched))
        .bind(to_i64(run.total_inserted))
        .bind(to_i64(run.total_skipped))
        .bind(to_i64(run.total_missing))
        .bind(serde_json::to_value(&run.errors)?)
        .bind(serde_json::to_value(&run.results)?)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self, run), fields(run_id = %run.id))]
    async fn update_run(&self, run: &CollectionRun) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_runs SET
                status = $2,
                finished_at = $3,
                total_series = $4,
                succeeded_series = $5,
                failed_series = $6,
                total_fetched = $7,
                total_inserted = $8,
                total_skipped = $9,
                total_missing = $10,
                errors = $11,
                results = $12
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.finished_at)
        .bind(to_i64(run.total_series))
        .bind(to_i64(run.succeeded_series))
        .bind(to_i64(run.failed_series))
        .bind(to_i64(run.total_fetched))
        .bind(to_i64(run.total_inserted))
        .bind(to_i64(run.total_skipped))
        .bind(to_i64(run.total_missing))
        .bind(serde_json::to_value(&run.errors)?)
        .bind(serde_json::to_value(&run.results)?)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("collection run {}", run.id)));
        }
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<CollectionRun>> {
        let records: Vec<RunRecord> = sqlx::query_as(
            r#"
            SELECT id, run_type, mode, status, started_at, finished_at,
                   total_series, succeeded_series, failed_series,
                   total_fetched, total_inserted, total_skipped, total_missing,
                   errors, results
            FROM collection_runs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(to_i64(limit))
        .fetch_all(self.db.pool())
        .await?;

        records.into_iter().map(RunRecord::into_run).collect()
    }

    #[instrument(skip(self, issues), fields(count = issues.len()))]
    async fn insert_quality_issues(
        &self,
        run_id: Uuid,
        issues: &[DataQualityIssue],
    ) -> Result<usize> {
        if issues.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.pool().begin().await?;
        for issue in issues {
            sqlx::query(
                r#"
                INSERT INTO data_quality_issues (
                    run_id, series_id, issue_type, date_from, date_to,
                    severity, description, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(run_id)
            .bind(&issue.series_id)
            .bind(issue.issue_type.as_str())
            .bind(issue.date_from)
            .bind(issue.date_to)
            .bind(issue.severity.as_str())
            .bind(&issue.description)
            .bind(issue.detected_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(issues.len())
    }
}

#[async_trait]
impl CheckpointStore for PgStore {
    #[instrument(skip(self, checkpoint), fields(checkpoint_id = %checkpoint.id))]
    async fn insert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collection_checkpoints (
                id, checkpoint_type, run_id, source, status,
                start_position, current_position, total_expected,
                records_processed, error_count, last_error, payload,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&checkpoint.id)
        .bind(checkpoint.kind.as_str())
        .bind(checkpoint.run_id)
        .bind(&checkpoint.source)
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.start_position)
        .bind(checkpoint.current_position)
        .bind(checkpoint.total_expected)
        .bind(checkpoint.records_processed)
        .bind(checkpoint.error_count)
        .bind(&checkpoint.last_error)
        .bind(serde_json::to_value(&checkpoint.payload)?)
        .bind(checkpoint.created_at)
        .bind(checkpoint.updated_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self, checkpoint), fields(checkpoint_id = %checkpoint.id))]
    async fn update_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_checkpoints SET
                status = $2,
                current_position = $3,
                records_processed = $4,
                error_count = $5,
                last_error = $6,
                payload = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(&checkpoint.id)
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.current_position)
        .bind(checkpoint.records_processed)
        .bind(checkpoint.error_count)
        .bind(&checkpoint.last_error)
        .bind(serde_json::to_value(&checkpoint.payload)?)
        .bind(checkpoint.updated_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("checkpoint {}", checkpoint.id)));
        }
        Ok(())
    }

    async fn get_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>> {
        let record: Option<CheckpointRecord> = sqlx::query_as(
            r#"
            SELECT id, checkpoint_type, run_id, source, status,
                   start_position, current_position, total_expected,
                   records_processed, error_count, last_error, payload,
                   created_at, updated_at
            FROM collection_checkpoints
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        record.map(CheckpointRecord::into_checkpoint).transpose()
    }

    async fn query_checkpoints(
        &self,
        run_id: Option<Uuid>,
        source: Option<&str>,
    ) -> Result<Vec<Checkpoint>> {
        let records: Vec<CheckpointRecord> = sqlx::query_as(
            r#"
            SELECT id, checkpoint_type, run_id, source, status,
                   start_position, current_position, total_expected,
                   records_processed, error_count, last_error, payload,
                   created_at, updated_at
            FROM collection_checkpoints
            WHERE ($1::uuid IS NULL OR run_id = $1)
              AND ($2::text IS NULL OR source = $2)
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(run_id)
        .bind(source)
        .fetch_all(self.db.pool())
        .await?;

        records
            .into_iter()
            .map(CheckpointRecord::into_checkpoint)
            .collect()
    }
}

#[async_trait]
impl MonitorStore for PgStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Postgres
    }

    async fn health_check(&self) -> Result<()> {
        self.db.health_check().await.map(|_| ())
    }
}
