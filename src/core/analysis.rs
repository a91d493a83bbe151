//! Outcome classification for propagation tool logs.
//!
//! The tools print free text and their exit codes are not trustworthy, so the
//! outcome is inferred from the log body. This is best-effort pattern matching
//! over third-party output, not an exact interpretation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::exit_code::{self, ToolExitCode};
use crate::core::job::Severity;

const SUMMARY_LINE_LIMIT: usize = 20;
const SERIALIZED_ENTRY_LIMIT: usize = 10;

static RE_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(ERROR|WARN|WARNING|INFO|DEBUG|SEVERE|FATAL)\]").unwrap()
});
static RE_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}|\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2})")
        .unwrap()
});
static RE_PROCESSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:processed|completed|exported|imported)\s+(\d+)\s+(?:item|object|record|row)")
        .unwrap()
});
static RE_FAILED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:failed|error)\s+(\d+)\s+(?:item|object|record|row)").unwrap()
});
static RE_SKIPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:skipped|ignored)\s+(\d+)\s+(?:item|object|record|row)").unwrap()
});
static RE_SUMMARY_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Summary|Statistics|Results):").unwrap());
static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Duration|Elapsed|Time):\s*(\d+[hms\s]+)").unwrap());
static RE_ERROR_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[ERROR\]|\[SEVERE\]|\[FATAL\]").unwrap());

/// Phrase rules evaluated in order against the lower-cased log; first hit wins.
static EXIT_CODE_RULES: Lazy<Vec<(ToolExitCode, Vec<Regex>)>> = Lazy::new(|| {
    let compile = |patterns: &[&str]| -> Vec<Regex> {
        patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
    };
    vec![
        (
            ToolExitCode::ConnectionError,
            compile(&[
                r"connection\s+(?:failed|refused|timeout)",
                r"could\s+not\s+connect",
                r"unable\s+to\s+connect",
                r"network\s+(?:error|timeout)",
            ]),
        ),
        (
            ToolExitCode::AuthenticationError,
            compile(&[
                r"authentication\s+failed",
                r"invalid\s+(?:credentials|username|password)",
                r"access\s+denied",
                r"login\s+failed",
            ]),
        ),
        (
            ToolExitCode::InvalidConfig,
            compile(&[
                r"(?:invalid|malformed)\s+configuration",
                r"config\s+(?:error|parse\s+error)",
                r"invalid\s+xml",
            ]),
        ),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Option<String>,
    pub level: String,
    pub message: String,
    /// 1-based.
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAnalysis {
    pub exit_code: i32,
    pub exit_description: String,
    pub severity: Severity,
    pub total_lines: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub errors: Vec<LogEntry>,
    pub warnings: Vec<LogEntry>,
    pub summary_lines: Vec<String>,
    pub processed_items: u64,
    pub failed_items: u64,
    pub skipped_items: u64,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub exit_code: i32,
    pub exit_description: String,
    pub severity: Severity,
    pub stats: AnalysisStats,
    pub duration: Option<String>,
    pub errors: Vec<EntryPayload>,
    pub warnings: Vec<EntryPayload>,
    pub summary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_lines: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub processed_items: u64,
    pub failed_items: u64,
    pub skipped_items: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPayload {
    pub level: String,
    pub message: String,
    pub line: usize,
}

impl LogAnalysis {
    /// Serializable view; entry lists are capped while counts stay exact.
    pub fn payload(&self) -> AnalysisPayload {
        let entries = |list: &[LogEntry]| -> Vec<EntryPayload> {
            list.iter()
                .take(SERIALIZED_ENTRY_LIMIT)
                .map(|entry| EntryPayload {
                    level: entry.level.clone(),
                    message: entry.message.clone(),
                    line: entry.line_number,
                })
                .collect()
        };
        AnalysisPayload {
            exit_code: self.exit_code,
            exit_description: self.exit_description.clone(),
            severity: self.severity,
            stats: AnalysisStats {
                total_lines: self.total_lines,
                error_count: self.error_count,
                warning_count: self.warning_count,
                info_count: self.info_count,
                processed_items: self.processed_items,
                failed_items: self.failed_items,
                skipped_items: self.skipped_items,
            },
            duration: self.duration.clone(),
            errors: entries(&self.errors),
            warnings: entries(&self.warnings),
            summary: self.summary_lines.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.payload()).unwrap_or(serde_json::Value::Null)
    }
}

pub fn analyze(log_text: &str, reported_exit_code: i32) -> LogAnalysis {
    let lines: Vec<&str> = log_text.split('\n').collect();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut summary_lines: Vec<String> = Vec::new();
    let mut error_count = 0;
    let mut warning_count = 0;
    let mut info_count = 0;
    let mut processed_items = 0;
    let mut failed_items = 0;
    let mut skipped_items = 0;
    let mut duration: Option<String> = None;
    let mut in_summary = false;

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        if RE_SUMMARY_START.is_match(line) {
            in_summary = true;
        }
        if in_summary {
            summary_lines.push(line.trim().to_string());
        }

        if let Some(level) = RE_LEVEL
            .captures(line)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_ascii_uppercase())
        {
            let timestamp = RE_TIMESTAMP
                .captures(line)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str().to_string());
            let entry = LogEntry {
                timestamp,
                level,
                message: line.to_string(),
                line_number: idx + 1,
            };
            match entry.level.as_str() {
                "ERROR" | "SEVERE" | "FATAL" => {
                    error_count += 1;
                    errors.push(entry);
                }
                "WARN" | "WARNING" => {
                    warning_count += 1;
                    warnings.push(entry);
                }
                "INFO" => info_count += 1,
                _ => {}
            }
        }

        if let Some(count) = capture_count(&RE_PROCESSED, line) {
            processed_items = processed_items.max(count);
        }
        if let Some(count) = capture_count(&RE_FAILED, line) {
            failed_items = failed_items.max(count);
        }
        if let Some(count) = capture_count(&RE_SKIPPED, line) {
            skipped_items = skipped_items.max(count);
        }

        if duration.is_none() {
            duration = RE_DURATION
                .captures(line)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str().to_string());
        }
    }

    if summary_lines.len() > SUMMARY_LINE_LIMIT {
        summary_lines.drain(..summary_lines.len() - SUMMARY_LINE_LIMIT);
    }

    let exit_code = classify_exit_code(log_text, reported_exit_code);

    LogAnalysis {
        exit_code,
        exit_description: exit_code::describe(exit_code),
        severity: exit_code::severity(exit_code),
        total_lines: lines.len(),
        error_count,
        warning_count,
        info_count,
        errors,
        warnings,
        summary_lines,
        processed_items,
        failed_items,
        skipped_items,
        duration,
    }
}

/// A non-zero reported code always stands; only a clean exit is second-guessed.
pub fn classify_exit_code(log_text: &str, reported_exit_code: i32) -> i32 {
    if reported_exit_code != 0 {
        return reported_exit_code;
    }

    let lower = log_text.to_lowercase();
    for (code, patterns) in EXIT_CODE_RULES.iter() {
        if patterns.iter().any(|re| re.is_match(&lower)) {
            return code.code();
        }
    }

    if RE_ERROR_TAG.is_match(log_text) {
        return ToolExitCode::GeneralError.code();
    }

    reported_exit_code
}

fn capture_count(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_phrase_overrides_clean_exit() {
        let log = "[INFO] start\n[ERROR] connection failed\nprocessed 10 item\n";
        let analysis = analyze(log, 0);
        assert_eq!(analysis.exit_code, 2);
        assert_eq!(analysis.severity, Severity::Error);
        assert_eq!(analysis.error_count, 1);
        assert_eq!(analysis.info_count, 1);
        assert_eq!(analysis.processed_items, 10);
        assert_eq!(analysis.total_lines, 4);
        assert_eq!(analysis.errors[0].line_number, 2);
        assert_eq!(analysis.errors[0].level, "ERROR");
    }

    #[test]
    fn bare_error_tag_means_general_error() {
        let analysis = analyze("[INFO] ok\n[error] something broke\n", 0);
        assert_eq!(analysis.exit_code, 1);
        assert_eq!(analysis.severity, Severity::Critical);
        assert_eq!(analysis.exit_description, "General error occurred during operation");
    }

    #[test]
    fn specific_phrases_take_priority() {
        let log = "[ERROR] Login failed for admin\n[ERROR] invalid XML in config\n";
        assert_eq!(analyze(log, 0).exit_code, 3);
        assert_eq!(analyze("[FATAL] malformed configuration\n", 0).exit_code, 4);
        assert_eq!(analyze("Network timeout while reading\n", 0).exit_code, 2);
    }

    #[test]
    fn non_zero_code_is_never_overridden() {
        let analysis = analyze("[ERROR] connection refused\n", 9);
        assert_eq!(analysis.exit_code, 9);
        assert_eq!(analysis.severity, Severity::Cancelled);
        assert_eq!(analyze("all good\n", 7).exit_code, 7);
    }

    #[test]
    fn clean_log_stays_successful() {
        let analysis = analyze("[INFO] exported 3 objects\n[DEBUG] done\n", 0);
        assert_eq!(analysis.exit_code, 0);
        assert_eq!(analysis.severity, Severity::Success);
        assert_eq!(analysis.processed_items, 3);
        assert_eq!(analysis.info_count, 1);
    }

    #[test]
    fn counters_keep_the_maximum() {
        let log = "processed 42 items\nprocessed 17 items\nfailed 2 rows\nfailed 1 row\nskipped 5 records\n";
        let analysis = analyze(log, 0);
        assert_eq!(analysis.processed_items, 42);
        assert_eq!(analysis.failed_items, 2);
        assert_eq!(analysis.skipped_items, 5);
    }

    #[test]
    fn first_duration_wins() {
        let analysis = analyze("Elapsed: 45s\nDuration: 9s\n", 0);
        assert_eq!(analysis.duration.as_deref(), Some("45s"));
        assert_eq!(analyze("no timing here\n", 0).duration, None);
    }

    #[test]
    fn levels_and_timestamps() {
        let log = "2026-01-05 09:32:16 [WARN] slow\n01/05/2026 09:32:17 [warning] slower\n[SEVERE] bad\n";
        let analysis = analyze(log, 3);
        assert_eq!(analysis.warning_count, 2);
        assert_eq!(analysis.error_count, 1);
        assert_eq!(analysis.warnings[0].timestamp.as_deref(), Some("2026-01-05 09:32:16"));
        assert_eq!(analysis.warnings[1].timestamp.as_deref(), Some("01/05/2026 09:32:17"));
        assert_eq!(analysis.warnings[1].level, "WARNING");
        assert_eq!(analysis.errors[0].level, "SEVERE");
        assert_eq!(analysis.errors[0].timestamp, None);
    }

    #[test]
    fn summary_section_captures_tail() {
        let mut log = String::from("[INFO] begin\nSummary:\n");
        for i in 0..30 {
            log.push_str(&format!("  line {i}\n\n"));
        }
        let analysis = analyze(&log, 0);
        assert_eq!(analysis.summary_lines.len(), 20);
        assert_eq!(analysis.summary_lines[0], "line 10");
        assert_eq!(analysis.summary_lines[19], "line 29");

        let short = analyze("Results:\n  ok 1\n", 0);
        assert_eq!(short.summary_lines, vec!["Results:".to_string(), "ok 1".to_string()]);
    }

    #[test]
    fn payload_caps_entries_but_keeps_counts() {
        let log: String = (0..15).map(|i| format!("[WARN] w{i}\n")).collect();
        let analysis = analyze(&log, 0);
        let payload = analysis.to_json();
        assert_eq!(payload["warnings"].as_array().map(|a| a.len()), Some(10));
        assert_eq!(payload["stats"]["warningCount"], 15);
        assert_eq!(payload["severity"], "SUCCESS");
        assert_eq!(payload["warnings"][0]["line"], 1);
    }

    #[test]
    fn analysis_is_deterministic() {
        let log = "2026-01-05 09:32:16 [ERROR] access denied\nStatistics:\nexported 4 rows\n";
        assert_eq!(analyze(log, 0), analyze(log, 0));
        assert_eq!(analyze(log, 0).to_json(), analyze(log, 0).to_json());
    }
}
