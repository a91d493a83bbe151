use std::time::Duration;

use crate::core::analysis::{LogAnalysis, LogEntry};

const RULE_WIDTH: usize = 60;
const TOP_ENTRIES: usize = 5;

/// Plain-text operation report. Output is a pure function of the analysis.
pub fn format_report(analysis: &LogAnalysis) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines: Vec<String> = Vec::new();

    lines.push(rule.clone());
    lines.push("ACP OPERATION SUMMARY".to_string());
    lines.push(rule.clone());
    lines.push(format!("Exit Code: {}", analysis.exit_code));
    lines.push(format!("Status: {}", analysis.exit_description));
    lines.push(format!("Severity: {}", analysis.severity));
    lines.push(String::new());

    lines.push("STATISTICS:".to_string());
    lines.push(format!("  Total Log Lines: {}", analysis.total_lines));
    lines.push(format!("  Errors: {}", analysis.error_count));
    lines.push(format!("  Warnings: {}", analysis.warning_count));
    lines.push(format!("  Info Messages: {}", analysis.info_count));
    lines.push(String::new());

    if analysis.processed_items > 0 || analysis.failed_items > 0 {
        lines.push("PROCESSING RESULTS:".to_string());
        if analysis.processed_items > 0 {
            lines.push(format!("  Processed: {}", analysis.processed_items));
        }
        if analysis.failed_items > 0 {
            lines.push(format!("  Failed: {}", analysis.failed_items));
        }
        if analysis.skipped_items > 0 {
            lines.push(format!("  Skipped: {}", analysis.skipped_items));
        }
        lines.push(String::new());
    }

    if let Some(duration) = &analysis.duration {
        lines.push(format!("Duration: {duration}"));
        lines.push(String::new());
    }

    push_entries(&mut lines, "TOP ERRORS:", "errors", &analysis.errors);
    push_entries(&mut lines, "TOP WARNINGS:", "warnings", &analysis.warnings);

    if !analysis.summary_lines.is_empty() {
        lines.push("OPERATION SUMMARY:".to_string());
        for line in &analysis.summary_lines {
            lines.push(format!("  {line}"));
        }
    }

    lines.push(rule);
    lines.join("\n")
}

fn push_entries(lines: &mut Vec<String>, title: &str, noun: &str, entries: &[LogEntry]) {
    if entries.is_empty() {
        return;
    }
    lines.push(title.to_string());
    for (idx, entry) in entries.iter().take(TOP_ENTRIES).enumerate() {
        lines.push(format!(
            "  {}. [Line {}] {}",
            idx + 1,
            entry.line_number,
            entry.message.trim()
        ));
    }
    if entries.len() > TOP_ENTRIES {
        lines.push(format!(
            "  ... and {} more {noun}",
            entries.len() - TOP_ENTRIES
        ));
    }
    lines.push(String::new());
}

/// `H:M:S.mmm` as the tools print elapsed time.
pub fn format_elapsed(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{}:{}.{:03}", hours, minutes, seconds, duration.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::analyze;

    #[test]
    fn report_layout_is_stable() {
        let log = "[INFO] start\n[ERROR] connection failed\nprocessed 10 item\n";
        let report = format_report(&analyze(log, 0));
        let expected = [
            "=".repeat(60).as_str(),
            "ACP OPERATION SUMMARY",
            "=".repeat(60).as_str(),
            "Exit Code: 2",
            "Status: Failed to connect to database or server",
            "Severity: ERROR",
            "",
            "STATISTICS:",
            "  Total Log Lines: 4",
            "  Errors: 1",
            "  Warnings: 0",
            "  Info Messages: 1",
            "",
            "PROCESSING RESULTS:",
            "  Processed: 10",
            "",
            "TOP ERRORS:",
            "  1. [Line 2] [ERROR] connection failed",
            "",
            "=".repeat(60).as_str(),
        ]
        .join("\n");
        assert_eq!(report, expected);
    }

    #[test]
    fn overflow_and_summary_sections() {
        let mut log: String = (0..7).map(|i| format!("[WARN] w{i}\n")).collect();
        log.push_str("Duration: 12s\nSummary:\n  exported 3 objects\n");
        let analysis = analyze(&log, 0);
        let report = format_report(&analysis);
        assert!(report.contains("TOP WARNINGS:\n  1. [Line 1] [WARN] w0\n"));
        assert!(report.contains("  5. [Line 5] [WARN] w4\n  ... and 2 more warnings\n"));
        assert!(report.contains("Duration: 12s\n"));
        assert!(report.contains("OPERATION SUMMARY:\n  Summary:\n  exported 3 objects\n"));
        assert!(!report.contains("TOP ERRORS:"));
        assert_eq!(report, format_report(&analysis));
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::from_millis(16_386)), "0:0:16.386");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1:2:5.000");
    }
}
