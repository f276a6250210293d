use crate::records::{
    parse_record_date, ActivityRecord, AttendanceRecord, AttendanceStatus, ExpenseRecord,
    MemorizationRecord, StudentDated,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semester {
    /// July through December.
    First,
    /// January through June.
    Second,
}

impl Semester {
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Semester::First),
            2 => Some(Semester::Second),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Semester::First => 1,
            Semester::Second => 2,
        }
    }

    /// 0-based month indices covered by this half of the year.
    pub fn month_range(self) -> std::ops::RangeInclusive<u32> {
        match self {
            Semester::First => 6..=11,
            Semester::Second => 0..=5,
        }
    }
}

/// A reporting window. Both variants are bound to a single calendar year:
/// semester 2 of 2025 is January–June 2025, not the half following
/// semester 1 of 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Month { year: i32, month0: u32 },
    Semester { year: i32, semester: Semester },
}

impl Window {
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            Window::Month { year, month0 } => date.year() == year && date.month0() == month0,
            Window::Semester { year, semester } => {
                date.year() == year && semester.month_range().contains(&date.month0())
            }
        }
    }

    /// Unparsable dates never fall inside a window.
    pub fn contains_raw(&self, raw: &str) -> bool {
        parse_record_date(raw)
            .map(|d| self.contains(d))
            .unwrap_or(false)
    }

    pub fn label(&self) -> String {
        match *self {
            Window::Month { year, month0 } => format!("{:04}-{:02}", year, month0 + 1),
            Window::Semester { year, semester } => format!("{:04}-S{}", year, semester.number()),
        }
    }
}

fn in_window<R: StudentDated>(window: Option<&Window>, r: &R) -> bool {
    match window {
        Some(w) => w.contains_raw(r.date()),
        None => true,
    }
}

/// Sum `field` over one student's records inside `window`.
pub fn window_total<R, F>(records: &[R], student_name: &str, window: &Window, field: F) -> f64
where
    R: StudentDated,
    F: Fn(&R) -> f64,
{
    records
        .iter()
        .filter(|r| r.student_name() == student_name && window.contains_raw(r.date()))
        .map(field)
        .sum()
}

pub fn monthly_total<R, F>(records: &[R], student_name: &str, month0: u32, year: i32, field: F) -> f64
where
    R: StudentDated,
    F: Fn(&R) -> f64,
{
    window_total(records, student_name, &Window::Month { year, month0 }, field)
}

pub fn semester_total<R, F>(
    records: &[R],
    student_name: &str,
    semester: Semester,
    year: i32,
    field: F,
) -> f64
where
    R: StudentDated,
    F: Fn(&R) -> f64,
{
    window_total(records, student_name, &Window::Semester { year, semester }, field)
}

/// round(min(actual/target, 1) * 100), 0 when target is not positive.
pub fn percentage(actual: f64, target: f64) -> u8 {
    if !(target > 0.0) || !actual.is_finite() {
        return 0;
    }
    let ratio = (actual / target).clamp(0.0, 1.0);
    (ratio * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBand {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl StatusBand {
    pub fn from_percentage(pct: u8) -> Self {
        match pct {
            80..=u8::MAX => StatusBand::Excellent,
            60..=79 => StatusBand::Good,
            40..=59 => StatusBand::Fair,
            20..=39 => StatusBand::Poor,
            _ => StatusBand::VeryPoor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusBand::Excellent => "Excellent",
            StatusBand::Good => "Good",
            StatusBand::Fair => "Fair",
            StatusBand::Poor => "Poor",
            StatusBand::VeryPoor => "Very Poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub target_total: f64,
    pub actual_total: f64,
    pub percentage: u8,
    pub status: &'static str,
    pub record_count: usize,
}

pub fn progress_summary(
    records: &[MemorizationRecord],
    student_name: &str,
    window: &Window,
) -> ProgressSummary {
    let mut target_total = 0.0;
    let mut actual_total = 0.0;
    let mut record_count = 0;
    for r in records
        .iter()
        .filter(|r| r.student_name == student_name && window.contains_raw(&r.date))
    {
        target_total += r.target;
        actual_total += r.actual;
        record_count += 1;
    }
    let pct = percentage(actual_total, target_total);
    ProgressSummary {
        target_total,
        actual_total,
        percentage: pct,
        status: StatusBand::from_percentage(pct).label(),
        record_count,
    }
}

pub fn monthly_progress(
    records: &[MemorizationRecord],
    student_name: &str,
    month0: u32,
    year: i32,
) -> ProgressSummary {
    progress_summary(records, student_name, &Window::Month { year, month0 })
}

pub fn semester_progress(
    records: &[MemorizationRecord],
    student_name: &str,
    semester: Semester,
    year: i32,
) -> ProgressSummary {
    progress_summary(records, student_name, &Window::Semester { year, semester })
}

/// Derived values for a single memorization record.
pub fn record_progress(r: &MemorizationRecord) -> (u8, &'static str) {
    let pct = percentage(r.actual, r.target);
    (pct, StatusBand::from_percentage(pct).label())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    Descending,
    Ascending,
}

/// A summable ranking metric. Page counts are fractional; counts and rupiah
/// amounts stay whole and saturate at the i64 bounds.
pub trait Metric: Copy {
    fn accumulate(self, other: Self) -> Self;
    fn rank_cmp(&self, other: &Self) -> Ordering;
}

impl Metric for f64 {
    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Metric for i64 {
    fn accumulate(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry<T> {
    pub name: String,
    pub total: T,
}

/// Group by key, sum the metric per group, sort in `order` and keep the first
/// `n`. Groups keep first-seen order and the sort is stable, so ties go to the
/// group that appeared first.
pub fn top_n<'a, R, I, K, M, T>(
    records: I,
    key_fn: K,
    metric: M,
    n: usize,
    order: RankOrder,
) -> Vec<RankedEntry<T>>
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    K: Fn(&R) -> String,
    M: Fn(&R) -> T,
    T: Metric,
{
    let mut groups: Vec<RankedEntry<T>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in records {
        let key = key_fn(r);
        let value = metric(r);
        match index.get(&key) {
            Some(&i) => groups[i].total = groups[i].total.accumulate(value),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RankedEntry { name: key, total: value });
            }
        }
    }
    match order {
        RankOrder::Descending => groups.sort_by(|a, b| b.total.rank_cmp(&a.total)),
        RankOrder::Ascending => groups.sort_by(|a, b| a.total.rank_cmp(&b.total)),
    }
    groups.truncate(n);
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Memorization,
    Attendance,
    Activities,
    Finance,
}

impl Board {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "memorization" => Some(Board::Memorization),
            "attendance" => Some(Board::Attendance),
            "activities" => Some(Board::Activities),
            "finance" => Some(Board::Finance),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Board::Memorization => "memorization",
            Board::Attendance => "attendance",
            Board::Activities => "activities",
            Board::Finance => "finance",
        }
    }
}

pub fn memorization_leaderboard(
    records: &[MemorizationRecord],
    window: Option<&Window>,
    n: usize,
) -> Vec<RankedEntry<f64>> {
    top_n(
        records.iter().filter(|r| in_window(window, *r)),
        |r: &MemorizationRecord| r.student_name.clone(),
        |r: &MemorizationRecord| r.actual,
        n,
        RankOrder::Descending,
    )
}

pub fn attendance_leaderboard(
    records: &[AttendanceRecord],
    window: Option<&Window>,
    n: usize,
) -> Vec<RankedEntry<i64>> {
    top_n(
        records.iter().filter(|r| in_window(window, *r)),
        |r: &AttendanceRecord| r.student_name.clone(),
        |r: &AttendanceRecord| {
            if r.status == AttendanceStatus::Present {
                1
            } else {
                0
            }
        },
        n,
        RankOrder::Descending,
    )
}

pub fn activities_leaderboard(
    records: &[ActivityRecord],
    window: Option<&Window>,
    n: usize,
) -> Vec<RankedEntry<i64>> {
    top_n(
        records.iter().filter(|r| in_window(window, *r)),
        |r: &ActivityRecord| r.student_name.clone(),
        |r: &ActivityRecord| r.completed_count() as i64,
        n,
        RankOrder::Descending,
    )
}

/// Lowest spender first.
pub fn finance_leaderboard(
    records: &[ExpenseRecord],
    window: Option<&Window>,
    n: usize,
) -> Vec<RankedEntry<i64>> {
    top_n(
        records.iter().filter(|r| in_window(window, *r)),
        |r: &ExpenseRecord| r.student_name.clone(),
        |r: &ExpenseRecord| r.amount,
        n,
        RankOrder::Ascending,
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present: usize,
    pub excused: usize,
    pub sick: usize,
    pub unexcused: usize,
    pub returned_home: usize,
    pub total: usize,
    pub rate: u8,
}

pub fn attendance_summary(
    records: &[AttendanceRecord],
    student_name: &str,
    window: &Window,
) -> AttendanceSummary {
    let mut out = AttendanceSummary::default();
    for r in records
        .iter()
        .filter(|r| r.student_name == student_name && window.contains_raw(&r.date))
    {
        match r.status {
            AttendanceStatus::Present => out.present += 1,
            AttendanceStatus::Excused => out.excused += 1,
            AttendanceStatus::Sick => out.sick += 1,
            AttendanceStatus::Unexcused => out.unexcused += 1,
            AttendanceStatus::ReturnedHome => out.returned_home += 1,
        }
        out.total += 1;
    }
    out.rate = percentage(out.present as f64, out.total as f64);
    out
}

pub fn expense_total(records: &[ExpenseRecord], student_name: &str, window: &Window) -> i64 {
    records
        .iter()
        .filter(|r| r.student_name == student_name && window.contains_raw(&r.date))
        .fold(0i64, |acc, r| acc.saturating_add(r.amount))
}

pub fn expense_total_for_halaqah(records: &[ExpenseRecord], halaqah_id: &str, window: &Window) -> i64 {
    records
        .iter()
        .filter(|r| r.halaqah_id.as_deref() == Some(halaqah_id) && window.contains_raw(&r.date))
        .fold(0i64, |acc, r| acc.saturating_add(r.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn mem(name: &str, date: &str, target: f64, actual: f64) -> MemorizationRecord {
        MemorizationRecord {
            id: format!("{}-{}", name, date),
            student_id: name.to_lowercase(),
            student_name: name.to_string(),
            date: date.to_string(),
            target,
            actual,
            detail: None,
        }
    }

    fn expense(name: &str, date: &str, amount: i64) -> ExpenseRecord {
        ExpenseRecord {
            id: format!("{}-{}", name, date),
            student_id: name.to_lowercase(),
            student_name: name.to_string(),
            halaqah_id: Some("h1".to_string()),
            date: date.to_string(),
            amount,
            category: "snack".to_string(),
            note: String::new(),
        }
    }

    fn att(name: &str, date: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: name.to_lowercase(),
            student_name: name.to_string(),
            date: date.to_string(),
            status,
        }
    }

    #[test]
    fn monthly_total_of_empty_is_zero() {
        let empty: Vec<MemorizationRecord> = Vec::new();
        for m in 0..12 {
            assert_eq!(monthly_total(&empty, "A", m, 2025, |r| r.actual), 0.0);
        }
    }

    #[test]
    fn july_example_sums_and_bands() {
        let records = vec![mem("A", "2025-07-01", 2.0, 2.0), mem("A", "2025-07-15", 2.0, 1.0)];
        assert_eq!(monthly_total(&records, "A", 6, 2025, |r| r.actual), 3.0);
        assert_eq!(monthly_total(&records, "A", 6, 2025, |r| r.target), 4.0);
        let p = monthly_progress(&records, "A", 6, 2025);
        assert_eq!(p.percentage, 75);
        assert_eq!(p.status, "Good");
        assert_eq!(p.record_count, 2);
    }

    #[test]
    fn monthly_total_ignores_other_students_months_and_bad_dates() {
        let records = vec![
            mem("A", "2025-07-01", 2.0, 2.0),
            mem("B", "2025-07-01", 2.0, 5.0),
            mem("A", "2025-08-01", 2.0, 7.0),
            mem("A", "2024-07-01", 2.0, 11.0),
            mem("A", "not-a-date", 2.0, 13.0),
            mem("A", "07/10/2025", 2.0, 17.0),
        ];
        assert_eq!(monthly_total(&records, "A", 6, 2025, |r| r.actual), 2.0);
        assert_eq!(monthly_total(&records, "Nobody", 6, 2025, |r| r.actual), 0.0);
    }

    #[test]
    fn semester_windows_stay_in_selected_year() {
        let records = vec![
            mem("A", "2025-01-10", 2.0, 1.0),
            mem("A", "2025-06-30", 2.0, 2.0),
            mem("A", "2025-07-01", 2.0, 4.0),
            mem("A", "2025-12-31", 2.0, 8.0),
            mem("A", "2026-01-05", 2.0, 16.0),
            mem("A", "2024-12-01", 2.0, 32.0),
        ];
        assert_eq!(semester_total(&records, "A", Semester::Second, 2025, |r| r.actual), 3.0);
        assert_eq!(semester_total(&records, "A", Semester::First, 2025, |r| r.actual), 12.0);
    }

    #[test]
    fn semester_percentage_is_clamped_and_zero_without_target() {
        let over = vec![mem("A", "2025-08-01", 2.0, 10.0)];
        let p = semester_progress(&over, "A", Semester::First, 2025);
        assert_eq!(p.percentage, 100);
        assert_eq!(p.status, "Excellent");

        let no_target = vec![mem("A", "2025-08-01", 0.0, 3.0)];
        let p = semester_progress(&no_target, "A", Semester::First, 2025);
        assert_eq!(p.percentage, 0);
        assert_eq!(p.status, "Very Poor");

        let empty: Vec<MemorizationRecord> = Vec::new();
        let p = semester_progress(&empty, "A", Semester::Second, 2025);
        assert_eq!(p.target_total, 0.0);
        assert_eq!(p.percentage, 0);
    }

    #[test]
    fn percentage_stays_in_range_for_non_negative_inputs() {
        for target in [0.0, 0.5, 1.0, 3.0, 20.0] {
            for actual in [0.0, 0.25, 1.0, 2.9, 3.0, 40.0] {
                let p = percentage(actual, target);
                assert!(p <= 100, "{} / {} -> {}", actual, target, p);
                if target == 0.0 {
                    assert_eq!(p, 0);
                }
            }
        }
        assert_eq!(percentage(-3.0, 4.0), 0);
        assert_eq!(percentage(1.0, 3.0), 33);
        assert_eq!(percentage(2.0, 3.0), 67);
    }

    #[test]
    fn status_bands_are_monotonic_with_inclusive_lower_bounds() {
        assert_eq!(StatusBand::from_percentage(0), StatusBand::VeryPoor);
        assert_eq!(StatusBand::from_percentage(19), StatusBand::VeryPoor);
        assert_eq!(StatusBand::from_percentage(20), StatusBand::Poor);
        assert_eq!(StatusBand::from_percentage(39), StatusBand::Poor);
        assert_eq!(StatusBand::from_percentage(40), StatusBand::Fair);
        assert_eq!(StatusBand::from_percentage(60), StatusBand::Good);
        assert_eq!(StatusBand::from_percentage(79), StatusBand::Good);
        assert_eq!(StatusBand::from_percentage(80), StatusBand::Excellent);
        assert_eq!(StatusBand::from_percentage(100), StatusBand::Excellent);

        let rank = |b: StatusBand| match b {
            StatusBand::VeryPoor => 0,
            StatusBand::Poor => 1,
            StatusBand::Fair => 2,
            StatusBand::Good => 3,
            StatusBand::Excellent => 4,
        };
        let mut prev = 0;
        for pct in 0..=100u8 {
            let r = rank(StatusBand::from_percentage(pct));
            assert!(r >= prev);
            prev = r;
        }
    }

    #[test]
    fn finance_leaderboard_ranks_lowest_spender_first() {
        let records = vec![
            expense("A", "2025-07-01", 5000),
            expense("B", "2025-07-02", 10000),
            expense("C", "2025-07-03", 3000),
        ];
        let top = finance_leaderboard(&records, None, 3);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        let totals: Vec<i64> = top.iter().map(|e| e.total).collect();
        assert_eq!(totals, vec![3000, 5000, 10000]);
    }

    #[test]
    fn top_n_truncates_and_breaks_ties_by_first_seen() {
        let records = vec![
            mem("B", "2025-07-01", 2.0, 2.0),
            mem("A", "2025-07-01", 2.0, 2.0),
            mem("C", "2025-07-01", 2.0, 1.0),
            mem("D", "2025-07-01", 2.0, 2.0),
            mem("C", "2025-07-02", 2.0, 4.0),
        ];
        let top = memorization_leaderboard(&records, None, 3);
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
        assert_eq!(top[0].total, 5.0);

        assert!(memorization_leaderboard(&records, None, 0).is_empty());
        assert_eq!(memorization_leaderboard(&records, None, 10).len(), 4);
        let empty: Vec<MemorizationRecord> = Vec::new();
        assert!(memorization_leaderboard(&empty, None, 3).is_empty());
    }

    #[test]
    fn leaderboard_window_filters_records() {
        let records = vec![
            mem("A", "2025-07-01", 2.0, 10.0),
            mem("B", "2025-08-01", 2.0, 3.0),
            mem("B", "garbage", 2.0, 30.0),
        ];
        let w = Window::Month { year: 2025, month0: 7 };
        let top = memorization_leaderboard(&records, Some(&w), 3);
        assert_eq!(top, vec![RankedEntry { name: "B".into(), total: 3.0 }]);
    }

    #[test]
    fn attendance_leaderboard_counts_present_only() {
        let records = vec![
            att("A", "2025-07-01", AttendanceStatus::Sick),
            att("B", "2025-07-01", AttendanceStatus::Present),
            att("A", "2025-07-02", AttendanceStatus::Present),
            att("B", "2025-07-02", AttendanceStatus::Present),
            att("C", "2025-07-02", AttendanceStatus::ReturnedHome),
        ];
        let top = attendance_leaderboard(&records, None, 3);
        let got: Vec<(&str, i64)> = top.iter().map(|e| (e.name.as_str(), e.total)).collect();
        assert_eq!(got, vec![("B", 2), ("A", 1), ("C", 0)]);
    }

    #[test]
    fn activities_leaderboard_counts_completed_flags() {
        let rec = |name: &str, flags: &[(&str, bool)]| ActivityRecord {
            id: name.to_string(),
            student_id: name.to_lowercase(),
            student_name: name.to_string(),
            date: "2025-07-01".to_string(),
            activities: flags
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        };
        let records = vec![
            rec("A", &[("tahajud", true), ("dhuha", false)]),
            rec("B", &[("tahajud", true), ("dhuha", true)]),
        ];
        let top = activities_leaderboard(&records, None, 3);
        assert_eq!(top[0].name, "B");
        assert_eq!(top[0].total, 2);
        assert_eq!(top[1].total, 1);
    }

    #[test]
    fn attendance_summary_counts_statuses_and_rate() {
        let records = vec![
            att("A", "2025-07-01", AttendanceStatus::Present),
            att("A", "2025-07-02", AttendanceStatus::Present),
            att("A", "2025-07-03", AttendanceStatus::Sick),
            att("A", "2025-07-04", AttendanceStatus::Unexcused),
            att("A", "2025-08-01", AttendanceStatus::Present),
        ];
        let s = attendance_summary(&records, "A", &Window::Month { year: 2025, month0: 6 });
        assert_eq!(s.present, 2);
        assert_eq!(s.sick, 1);
        assert_eq!(s.unexcused, 1);
        assert_eq!(s.total, 4);
        assert_eq!(s.rate, 50);

        let none = attendance_summary(&records, "Z", &Window::Month { year: 2025, month0: 6 });
        assert_eq!(none, AttendanceSummary::default());
    }

    #[test]
    fn expense_totals_by_student_and_halaqah() {
        let mut other = expense("B", "2025-02-01", 700);
        other.halaqah_id = Some("h2".to_string());
        let records = vec![
            expense("A", "2025-01-01", 1000),
            expense("A", "2025-03-01", -200),
            expense("B", "2025-02-01", 500),
            other,
        ];
        let w = Window::Semester { year: 2025, semester: Semester::Second };
        assert_eq!(expense_total(&records, "A", &w), 800);
        assert_eq!(expense_total_for_halaqah(&records, "h1", &w), 1300);
        assert_eq!(expense_total_for_halaqah(&records, "h2", &w), 700);
    }

    #[test]
    fn expense_sums_saturate_instead_of_overflowing() {
        let records = vec![
            expense("A", "2025-07-01", 9_000_000_000_000_000_000),
            expense("A", "2025-07-02", 9_000_000_000_000_000_000),
            expense("B", "2025-07-03", i64::MIN),
            expense("B", "2025-07-04", -1),
        ];
        let w = Window::Month { year: 2025, month0: 6 };
        assert_eq!(expense_total(&records, "A", &w), i64::MAX);
        assert_eq!(expense_total(&records, "B", &w), i64::MIN);
        assert_eq!(expense_total_for_halaqah(&records[..2], "h1", &w), i64::MAX);

        let top = finance_leaderboard(&records, Some(&w), 3);
        let got: Vec<(&str, i64)> = top.iter().map(|e| (e.name.as_str(), e.total)).collect();
        assert_eq!(got, vec![("B", i64::MIN), ("A", i64::MAX)]);
    }

    #[test]
    fn window_labels() {
        assert_eq!(Window::Month { year: 2025, month0: 0 }.label(), "2025-01");
        assert_eq!(
            Window::Semester { year: 2025, semester: Semester::First }.label(),
            "2025-S1"
        );
    }
}
