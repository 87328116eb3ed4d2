//! Standalone economic data collector CLI.

use chrono::Utc;
use clap::{Parser, Subcommand};
use monitor_collector::modules::{self, RunCoordinator, RunOptions};
use monitor_collector::{CollectorConfig, SchedulerStats};
use monitor_core::{init_logging, AppConfig, LogConfig, RunMode, RunType, SeriesCatalog};
use monitor_data::{open_store, FredClient, MonitorStore};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "monitor-collector")]
#[command(about = "Economic time-series collector with checkpoint recovery", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 1회 수집 실행
    Run {
        /// 수집 모드 (incremental, full, daily, weekly, monthly, quarterly)
        #[arg(long, default_value = "incremental")]
        mode: String,

        /// 특정 시계열만 수집 (쉼표로 구분, 예: "UNRATE,CPIAUCSL")
        #[arg(long)]
        series: Option<String>,
    },

    /// 데몬 모드: 주기적으로 증분 수집 실행
    Daemon,

    /// 체크포인트 기반 복구 실행
    Recover,

    /// 스케줄러 통계 및 데이터 신선도 출력
    Stats {
        /// 최근 실행 표시 개수
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// 체크포인트 목록 조회
    Checkpoints {
        /// 실행 ID 필터
        #[arg(long)]
        run_id: Option<Uuid>,

        /// 소스 필터 (시계열 ID 또는 group:{주기})
        #[arg(long)]
        source: Option<String>,
    },

    /// 저장 이력 기반 이상 탐지
    ScanAnomalies {
        /// 특정 시계열만 검사 (쉼표로 구분)
        #[arg(long)]
        series: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 설정 로드
    let app_config = AppConfig::load(&cli.config)?;

    // 로깅 초기화
    let mut log_config = LogConfig::from_settings(&app_config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = format!("monitor_collector={level},monitor_data={level},{level}");
    }
    init_logging(log_config)?;

    tracing::info!("Economic Data Collector 시작");

    let config = CollectorConfig::from_app_config(&app_config);
    let catalog = Arc::new(SeriesCatalog::from_config(&app_config.series));
    let store = open_store(&app_config).await?;
    tracing::info!(
        backend = ?store.backend(),
        series = catalog.len(),
        batch_size = config.batch_size,
        "저장소 연결 완료"
    );

    let provider = Arc::new(FredClient::from_config(&app_config.provider)?);
    let coordinator =
        RunCoordinator::new(Arc::clone(&catalog), Arc::clone(&store), provider, &config);

    // 명령 실행
    match cli.command {
        Commands::Run { mode, series } => {
            let mode: RunMode = mode.parse()?;
            let mut options = RunOptions::new(RunType::Manual, mode);
            if let Some(ids) = parse_csv(series) {
                options = options.with_series(ids);
            }
            let run = coordinator.run_collection(options).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Commands::Recover => {
            let run = coordinator.run_collection(RunOptions::recovery()).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Commands::Daemon => {
            tracing::info!(
                interval_minutes = config.daemon.interval_minutes,
                "=== 데몬 모드 시작 ==="
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        let collection = coordinator.run_collection(RunOptions::new(
                            RunType::Scheduled,
                            RunMode::Incremental,
                        ));
                        tokio::pin!(collection);

                        tokio::select! {
                            _ = tokio::signal::ctrl_c() => {
                                tracing::warn!("수집 중 종료 신호 수신, 진행 상태 저장 중...");
                                if let Some(run_id) = coordinator.current_run_id() {
                                    match coordinator.checkpoints().mark_interrupted(run_id).await {
                                        Ok(paused) => tracing::info!(run_id = %run_id, paused = paused, "중단된 체크포인트 저장 완료"),
                                        Err(e) => tracing::error!(run_id = %run_id, error = %e, "체크포인트 중단 처리 실패"),
                                    }
                                }
                                break;
                            }
                            result = &mut collection => match result {
                                Ok(run) => tracing::info!(
                                    run_id = %run.id,
                                    status = run.status.as_str(),
                                    next_in_minutes = config.daemon.interval_minutes,
                                    "=== 수집 완료, 다음 실행 대기 ==="
                                ),
                                Err(e) => tracing::warn!(error = %e, "이번 주기 수집 건너뜀"),
                            },
                        }
                    }
                }
            }
        }
        Commands::Stats { limit } => {
            let today = Utc::now().date_naive();
            let stats = SchedulerStats::collect(store.as_ref(), &catalog, today, limit).await?;
            stats.log_summary();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Checkpoints { run_id, source } => {
            let checkpoints = coordinator
                .checkpoints()
                .list_checkpoints(run_id, source.as_deref())
                .await?;
            tracing::info!(count = checkpoints.len(), "체크포인트 조회 완료");
            println!("{}", serde_json::to_string_pretty(&checkpoints)?);
        }
        Commands::ScanAnomalies { series } => {
            let results = match parse_csv(series) {
                Some(ids) => {
                    let mut found = Vec::new();
                    for id in ids {
                        if let Some(anomaly) =
                            modules::scan_series(store.as_ref(), &id, &config.anomaly).await?
                        {
                            found.push(anomaly);
                        }
                    }
                    found
                }
                None => modules::scan_all(store.as_ref(), &catalog, &config.anomaly).await,
            };
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    tracing::info!("Economic Data Collector 종료");
    Ok(())
}

/// 쉼표 구분 목록 파싱 (비어 있으면 None)
fn parse_csv(raw: Option<String>) -> Option<Vec<String>> {
    let ids: Vec<String> = raw?
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    (!ids.is_empty()).then_some(ids)
}
