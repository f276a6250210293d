use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parse a persisted record date. Accepts `YYYY-MM-DD` and a full timestamp
/// whose first 10 characters are that date (`2025-07-01T08:00:00Z`).
/// Anything else yields `None` and the record falls outside every window.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    let date_part = match t.split_once('T') {
        Some((d, _)) => d,
        None => t,
    };
    if date_part.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Numeric coercion for incoming JSON values. Numbers and numeric strings are
/// accepted; null, NaN, infinities and everything else become 0.
pub fn coerce_number(v: Option<&serde_json::Value>) -> f64 {
    let n = match v {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Excused,
    Sick,
    Unexcused,
    ReturnedHome,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::Present,
        AttendanceStatus::Excused,
        AttendanceStatus::Sick,
        AttendanceStatus::Unexcused,
        AttendanceStatus::ReturnedHome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Excused => "excused",
            AttendanceStatus::Sick => "sick",
            AttendanceStatus::Unexcused => "unexcused",
            AttendanceStatus::ReturnedHome => "returnedHome",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurahRange {
    pub surah_name: String,
    pub ayah_from: u32,
    pub ayah_to: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorizationDetail {
    pub juz: u8,
    pub page_from: u32,
    pub page_to: u32,
    #[serde(default)]
    pub surahs: Vec<SurahRange>,
}

impl MemorizationDetail {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=30).contains(&self.juz) {
            return Err("detail.juz must be in 1..=30".into());
        }
        if self.page_from > self.page_to {
            return Err("detail.pageFrom must be <= detail.pageTo".into());
        }
        for s in &self.surahs {
            if s.surah_name.trim().is_empty() {
                return Err("detail.surahs[].surahName must not be empty".into());
            }
            if s.ayah_from > s.ayah_to {
                return Err("detail.surahs[].ayahFrom must be <= ayahTo".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemorizationRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub target: f64,
    pub actual: f64,
    pub detail: Option<MemorizationDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub halaqah_id: Option<String>,
    pub date: String,
    pub amount: i64,
    pub category: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub activities: BTreeMap<String, bool>,
}

impl ActivityRecord {
    pub fn completed_count(&self) -> usize {
        self.activities.values().filter(|done| **done).count()
    }
}

/// Read access shared by every dated, per-student record.
pub trait StudentDated {
    fn student_name(&self) -> &str;
    fn date(&self) -> &str;
}

macro_rules! impl_student_dated {
    ($($t:ty),*) => {
        $(impl StudentDated for $t {
            fn student_name(&self) -> &str {
                &self.student_name
            }
            fn date(&self) -> &str {
                &self.date
            }
        })*
    };
}

impl_student_dated!(AttendanceRecord, MemorizationRecord, ExpenseRecord, ActivityRecord);
