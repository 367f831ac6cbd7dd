//! # Readings and Classification Module
//!
//! Wire-level heart reading plus the clinical threshold classifier shared by
//! server and client.
//!
//! ## Key Types
//! - `Reading`: One sample as it travels over the wire (timestamp, HR, RR)
//! - `ConditionType` / `Severity`: Closed enumerations for rhythm and escalation
//! - `Condition`: Classification result with a human-readable description
//!
//! ## Thresholds
//! | Check (first match wins) | Warning           | Critical          |
//! |--------------------------|-------------------|-------------------|
//! | heart rate > 100         | tachycardia       | > 120             |
//! | heart rate < 60          | bradycardia       | < 45              |
//! | rr outside [0.6, 1.0] s  | arrhythmia        | > 1.5 or < 0.4    |
//!
//! Heart-rate checks always take precedence over the RR interval check.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseSeverityError;

pub const MIN_NORMAL_HEART_RATE: u32 = 60;
pub const MAX_NORMAL_HEART_RATE: u32 = 100;

pub const MIN_NORMAL_RR_INTERVAL: f64 = 0.6; // 100 BPM
pub const MAX_NORMAL_RR_INTERVAL: f64 = 1.0; // 60 BPM

const CRITICAL_HIGH_HEART_RATE: u32 = 120;
const CRITICAL_LOW_HEART_RATE: u32 = 45;
const CRITICAL_HIGH_RR_INTERVAL: f64 = 1.5;
const CRITICAL_LOW_RR_INTERVAL: f64 = 0.4;

/// A single synthetic heart sample.
///
/// Serialized as `{"timestamp": "<RFC 3339>", "heart_rate": n, "rr_interval": x}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Beats per minute
    pub heart_rate: u32,
    /// Seconds between consecutive beats
    pub rr_interval: f64,
}

impl Reading {
    pub fn new(heart_rate: u32, rr_interval: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            heart_rate,
            rr_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Normal,
    Tachycardia,
    Bradycardia,
    Arrhythmia,
}

impl ConditionType {
    pub fn label(&self) -> &'static str {
        match self {
            ConditionType::Normal => "NORMAL",
            ConditionType::Tachycardia => "TACHYCARDIA",
            ConditionType::Bradycardia => "BRADYCARDIA",
            ConditionType::Arrhythmia => "ARRHYTHMIA",
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, ConditionType::Normal)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Escalation level, ordered `Normal < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Severity::Normal),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Result of classifying a `Reading`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub kind: ConditionType,
    pub severity: Severity,
    pub description: String,
    pub reading: Reading,
}

impl Condition {
    pub fn is_abnormal(&self) -> bool {
        !self.kind.is_normal()
    }
}

/// Classify a reading against the fixed clinical thresholds.
///
/// Deterministic and side-effect free. `severity` is `Normal` exactly when
/// `kind` is `Normal`.
pub fn classify(reading: &Reading) -> Condition {
    let hr = reading.heart_rate;
    let rr = reading.rr_interval;

    if hr > MAX_NORMAL_HEART_RATE {
        let severity = if hr > CRITICAL_HIGH_HEART_RATE {
            Severity::Critical
        } else {
            Severity::Warning
        };
        return Condition {
            kind: ConditionType::Tachycardia,
            severity,
            description: format!("High heart rate: {} BPM", hr),
            reading: reading.clone(),
        };
    }

    if hr < MIN_NORMAL_HEART_RATE {
        let severity = if hr < CRITICAL_LOW_HEART_RATE {
            Severity::Critical
        } else {
            Severity::Warning
        };
        return Condition {
            kind: ConditionType::Bradycardia,
            severity,
            description: format!("Low heart rate: {} BPM", hr),
            reading: reading.clone(),
        };
    }

    if !(MIN_NORMAL_RR_INTERVAL..=MAX_NORMAL_RR_INTERVAL).contains(&rr) {
        let severity = if rr > CRITICAL_HIGH_RR_INTERVAL || rr < CRITICAL_LOW_RR_INTERVAL {
            Severity::Critical
        } else {
            Severity::Warning
        };
        return Condition {
            kind: ConditionType::Arrhythmia,
            severity,
            description: format!("Irregular heartbeat: RR interval {:.2} s", rr),
            reading: reading.clone(),
        };
    }

    Condition {
        kind: ConditionType::Normal,
        severity: Severity::Normal,
        description: "Normal heart activity".to_string(),
        reading: reading.clone(),
    }
}

/// One-line alert text: `ALERT: <TYPE> - <description> at <YYYY-MM-DD HH:MM:SS>`.
///
/// The time is the reading's timestamp in local wall-clock time.
pub fn format_alert(condition: &Condition) -> String {
    format!(
        "ALERT: {} - {} at {}",
        condition.kind,
        condition.description,
        condition.reading.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    )
}
