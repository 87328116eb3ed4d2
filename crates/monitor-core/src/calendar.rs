//! 발표 캘린더.
//!
//! 주기별로 "발표가 기대되는 날짜"를 계산합니다. 주말/공휴일/비발표 주기에
//! 해당하는 날짜는 처음부터 기대 날짜에 포함되지 않으므로, 누락 날짜는
//! 정상적인 미발표와 구분된 실제 누락만 남습니다.
//!
//! - **daily**: 미국 연방 공휴일을 제외한 영업일 (월~금)
//! - **weekly**: 시계열의 고정 발표 요일 (기본: 금요일)
//! - **monthly**: 매월 1일
//! - **quarterly**: 분기 첫날 (1/4/7/10월 1일)

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::domain::{Cadence, Series};

/// 주별 시계열의 발표 요일이 지정되지 않았을 때 사용하는 요일
pub const DEFAULT_WEEKLY_WEEKDAY: Weekday = Weekday::Fri;

// =============================================================================
// 미국 연방 공휴일
// =============================================================================

/// 해당 연도의 미국 연방 공휴일 (대체 휴일 적용).
///
/// 토요일 공휴일은 전 금요일, 일요일 공휴일은 다음 월요일에 쉽니다.
pub fn us_federal_holidays(year: i32) -> Vec<NaiveDate> {
    let mut holidays = Vec::with_capacity(11);

    let mut push_observed = |date: Option<NaiveDate>| {
        if let Some(date) = date {
            holidays.push(observed(date));
        }
    };

    // 고정일 공휴일
    push_observed(NaiveDate::from_ymd_opt(year, 1, 1));
    if year >= 2022 {
        push_observed(NaiveDate::from_ymd_opt(year, 6, 19));
    }
    push_observed(NaiveDate::from_ymd_opt(year, 7, 4));
    push_observed(NaiveDate::from_ymd_opt(year, 11, 11));
    push_observed(NaiveDate::from_ymd_opt(year, 12, 25));

    // 요일 기준 공휴일
    let floating = [
        NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3), // MLK
        NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3), // Presidents
        last_weekday_of_month(year, 5, Weekday::Mon),                   // Memorial
        NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1), // Labor
        NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2), // Columbus
        NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4), // Thanksgiving
    ];
    holidays.extend(floating.into_iter().flatten());

    holidays.sort();
    holidays
}

/// 주말 공휴일의 대체 휴일
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    (1..=5)
        .rev()
        .find_map(|n| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n))
}

/// 미국 연방 공휴일 여부.
///
/// 다음 해 1월 1일이 토요일이면 12월 31일이 대체 휴일이 되므로 다음 해도 확인합니다.
pub fn is_us_federal_holiday(date: NaiveDate) -> bool {
    us_federal_holidays(date.year()).contains(&date)
        || (date.month() == 12 && us_federal_holidays(date.year() + 1).contains(&date))
}

/// 영업일 여부 (주말 및 연방 공휴일 제외)
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_us_federal_holiday(date)
}

// =============================================================================
// 기대 날짜 계산
// =============================================================================

/// `[from, to]` 구간에서 주기별 발표 기대 날짜.
pub fn expected_dates(
    cadence: Cadence,
    weekday: Option<Weekday>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    if from > to {
        return Vec::new();
    }

    match cadence {
        Cadence::Daily => from
            .iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| is_business_day(*d))
            .collect(),
        Cadence::Weekly => {
            let target = weekday.unwrap_or(DEFAULT_WEEKLY_WEEKDAY);
            let offset = (7 + target.num_days_from_monday() as i64
                - from.weekday().num_days_from_monday() as i64)
                % 7;
            let first = from + Duration::days(offset);
            first
                .iter_weeks()
                .take_while(|d| *d <= to)
                .collect()
        }
        Cadence::Monthly => period_starts(from, to, 1),
        Cadence::Quarterly => period_starts(from, to, 3),
    }
}

/// `[from, to]` 구간에 포함되는 `step`개월 주기의 시작일 (1일)
fn period_starts(from: NaiveDate, to: NaiveDate, step: u32) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut year = from.year();
    // 주기 경계로 정렬 (분기: 1/4/7/10월)
    let mut month = ((from.month0() / step) * step) + 1;

    while let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
        if date > to {
            break;
        }
        if date >= from {
            dates.push(date);
        }
        month += step;
        if month > 12 {
            month -= 12;
            year += 1;
        }
    }
    dates
}

/// 반환된 날짜와 기대 날짜를 비교해 누락 날짜를 계산합니다.
///
/// 기대 구간은 `[max(window_start, 첫 반환일), today - 발표 지연]`이므로
/// 아직 발표되지 않았을 날짜는 누락으로 보고되지 않습니다.
/// `returned`에는 센티널 값으로 반환된 날짜도 포함해야 합니다 (발표는 된 날짜).
pub fn missing_dates(
    series: &Series,
    window_start: NaiveDate,
    today: NaiveDate,
    returned: &[NaiveDate],
) -> Vec<NaiveDate> {
    let policy = series.window_policy();
    let from = returned
        .iter()
        .min()
        .map(|first| (*first).max(window_start))
        .unwrap_or(window_start);
    let to = today - Duration::days(policy.publication_lag_days);

    expected_dates(series.cadence, series.publication_weekday, from, to)
        .into_iter()
        .filter(|d| !returned.contains(d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_federal_holidays_2024() {
        let holidays = us_federal_holidays(2024);
        assert!(holidays.contains(&date(2024, 1, 15))); // MLK
        assert!(holidays.contains(&date(2024, 5, 27))); // Memorial
        assert!(holidays.contains(&date(2024, 6, 19))); // Juneteenth
        assert!(holidays.contains(&date(2024, 11, 28))); // Thanksgiving
        assert_eq!(holidays.len(), 11);
    }

    #[test]
    fn test_juneteenth_starts_in_2022() {
        // 2021-06-19 토요일이지만 2022년부터 적용하므로 6/18 금요일은 영업일
        assert!(is_business_day(date(2021, 6, 18)));
        assert_eq!(us_federal_holidays(2021).len(), 10);
        // 2022-06-19 일요일 → 6/20 월요일
        assert!(!is_business_day(date(2022, 6, 20)));
    }

    #[test]
    fn test_observed_rules() {
        // 2021-07-04 일요일 → 7/5 월요일
        assert!(is_us_federal_holiday(date(2021, 7, 5)));
        // 2022-01-01 토요일 → 2021-12-31 금요일
        assert!(is_us_federal_holiday(date(2021, 12, 31)));
        assert!(!is_business_day(date(2021, 12, 31)));
    }

    #[test]
    fn test_daily_expected_skips_weekends_and_holidays() {
        // 2024-07-01(월) ~ 2024-07-07(일), 7/4 독립기념일
        let dates = expected_dates(Cadence::Daily, None, date(2024, 7, 1), date(2024, 7, 7));
        assert_eq!(
            dates,
            vec![date(2024, 7, 1), date(2024, 7, 2), date(2024, 7, 3), date(2024, 7, 5)]
        );
    }

    #[test]
    fn test_weekly_expected_uses_publication_weekday() {
        let dates = expected_dates(
            Cadence::Weekly,
            Some(Weekday::Thu),
            date(2024, 3, 1),
            date(2024, 3, 31),
        );
        assert_eq!(
            dates,
            vec![date(2024, 3, 7), date(2024, 3, 14), date(2024, 3, 21), date(2024, 3, 28)]
        );

        let fridays = expected_dates(Cadence::Weekly, None, date(2024, 3, 1), date(2024, 3, 8));
        assert_eq!(fridays, vec![date(2024, 3, 1), date(2024, 3, 8)]);
    }

    #[test]
    fn test_monthly_and_quarterly_period_starts() {
        let monthly = expected_dates(Cadence::Monthly, None, date(2023, 11, 15), date(2024, 2, 1));
        assert_eq!(monthly, vec![date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]);

        let quarterly =
            expected_dates(Cadence::Quarterly, None, date(2023, 2, 1), date(2024, 1, 1));
        assert_eq!(
            quarterly,
            vec![date(2023, 4, 1), date(2023, 7, 1), date(2023, 10, 1), date(2024, 1, 1)]
        );
    }

    #[test]
    fn test_missing_dates_respects_publication_lag() {
        let series = Series::new("UNRATE", "Unemployment", Cadence::Monthly);
        // today 2024-06-10, lag 45일 → 2024-04-26까지만 기대
        let returned = vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 4, 1)];
        let missing = missing_dates(&series, date(2023, 12, 15), date(2024, 6, 10), &returned);
        assert_eq!(missing, vec![date(2024, 3, 1)]);
    }

    #[test]
    fn test_missing_dates_starts_at_first_returned() {
        let series = Series::new("NEW", "new", Cadence::Monthly);
        let returned = vec![date(2024, 3, 1)];
        let missing = missing_dates(&series, date(2019, 1, 1), date(2024, 5, 10), &returned);
        assert!(missing.is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn daily_expected_dates_are_business_days(offset in 0i64..3000, span in 0i64..120) {
                let from = date(2018, 1, 1) + Duration::days(offset);
                let to = from + Duration::days(span);
                let dates = expected_dates(Cadence::Daily, None, from, to);

                prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));
                for d in &dates {
                    prop_assert!(*d >= from && *d <= to);
                    prop_assert!(is_business_day(*d));
                }
            }

            #[test]
            fn returned_dates_are_never_missing(offset in 0i64..2000, keep in 0usize..40) {
                let series = Series::new("DFF", "Fed Funds", Cadence::Daily);
                let start = date(2019, 1, 1) + Duration::days(offset);
                let today = start + Duration::days(60);
                let returned: Vec<NaiveDate> =
                    expected_dates(Cadence::Daily, None, start, today).into_iter().take(keep).collect();

                let missing = missing_dates(&series, start, today, &returned);
                prop_assert!(missing.iter().all(|d| !returned.contains(d)));
            }
        }
    }
}
