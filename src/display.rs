//! # Console Display Module
//!
//! Box-drawn live table for the monitoring client plus ANSI color cues per
//! condition. Purely presentational: nothing here affects classification or
//! alert gating.

use chrono::Local;

use crate::reading::{Condition, ConditionType, Severity};

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_RED: &str = "\x1b[31m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_PURPLE: &str = "\x1b[35m";
const COLOR_CYAN: &str = "\x1b[36m";

const TIMESTAMP_WIDTH: usize = 19; // YYYY-MM-DD HH:MM:SS
const HEART_RATE_WIDTH: usize = 10;
const RR_INTERVAL_WIDTH: usize = 11;
const STATUS_WIDTH: usize = 25;

/// Inner width of the table: four columns plus separators and padding.
const TABLE_WIDTH: usize = TIMESTAMP_WIDTH + HEART_RATE_WIDTH + RR_INTERVAL_WIDTH + STATUS_WIDTH + 11;

fn color_for(condition: &Condition) -> &'static str {
    match condition.kind {
        ConditionType::Normal => COLOR_GREEN,
        ConditionType::Tachycardia | ConditionType::Bradycardia => {
            if condition.severity == Severity::Critical {
                COLOR_RED
            } else {
                COLOR_YELLOW
            }
        }
        ConditionType::Arrhythmia => COLOR_PURPLE,
    }
}

/// Wrap `text` in the condition's color, or return it unchanged.
pub fn paint(text: &str, condition: &Condition, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color_for(condition), text, COLOR_RESET)
    } else {
        text.to_string()
    }
}

/// Renders the client's reading table line by line.
#[derive(Debug, Clone, Copy)]
pub struct Table {
    use_color: bool,
}

impl Table {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    pub fn banner(&self) -> String {
        let rule = "═".repeat(75);
        let blank = " ".repeat(75);
        let title = format!("{:^75}", "ECG Monitoring Tool - Client");
        format!(
            "╔{rule}╗\n║{blank}║\n║{title}║\n║{blank}║\n╚{rule}╝",
            rule = rule,
            blank = blank,
            title = title
        )
    }

    pub fn started(&self) -> String {
        if self.use_color {
            format!("{}\nMonitoring started.\n{}", COLOR_CYAN, COLOR_RESET)
        } else {
            "\nMonitoring started.\n".to_string()
        }
    }

    /// Top border, column titles and the separator row.
    pub fn header(&self) -> String {
        let top = format!("╔{}╗", "═".repeat(TABLE_WIDTH));
        let titles = format!(
            "║ {:<tw$} │ {:<hw$} │ {:<rw$} │ {:<sw$} ║",
            "Timestamp",
            "Heart Rate",
            "RR Interval",
            "Status",
            tw = TIMESTAMP_WIDTH,
            hw = HEART_RATE_WIDTH,
            rw = RR_INTERVAL_WIDTH,
            sw = STATUS_WIDTH
        );
        let separator = format!(
            "╟{}┼{}┼{}┼{}╢",
            "─".repeat(TIMESTAMP_WIDTH + 2),
            "─".repeat(HEART_RATE_WIDTH + 2),
            "─".repeat(RR_INTERVAL_WIDTH + 2),
            "─".repeat(STATUS_WIDTH + 2)
        );
        format!("{}\n{}\n{}", top, titles, separator)
    }

    pub fn row(&self, condition: &Condition) -> String {
        let reading = &condition.reading;
        let status = if condition.kind.is_normal() {
            condition.kind.to_string()
        } else {
            format!("{} ({})", condition.kind, condition.severity)
        };
        let line = format!(
            "║ {:<tw$} │ {:>hw$} │ {:>rw$.2} │ {:<sw$} ║",
            reading.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            reading.heart_rate,
            reading.rr_interval,
            status,
            tw = TIMESTAMP_WIDTH,
            hw = HEART_RATE_WIDTH,
            rw = RR_INTERVAL_WIDTH,
            sw = STATUS_WIDTH
        );
        paint(&line, condition, self.use_color)
    }

    pub fn footer(&self) -> String {
        format!("╚{}╝", "═".repeat(TABLE_WIDTH))
    }
}
