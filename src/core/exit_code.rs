use crate::core::job::Severity;

/// Exit codes documented by the propagation tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ToolExitCode {
    Success = 0,
    GeneralError = 1,
    ConnectionError = 2,
    AuthenticationError = 3,
    InvalidConfig = 4,
    MissingFile = 5,
    PermissionError = 6,
    DataError = 7,
    TimeoutError = 8,
    Cancelled = 9,
}

impl ToolExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub fn describe(code: i32) -> String {
    let text = match code {
        0 => "Operation completed successfully",
        1 => "General error occurred during operation",
        2 => "Failed to connect to database or server",
        3 => "Authentication failed - check credentials",
        4 => "Configuration file is invalid or malformed",
        5 => "Required file not found - check file paths",
        6 => "Permission denied - check file and directory permissions",
        7 => "Data validation error - check data integrity",
        8 => "Operation timed out - check network and server status",
        9 => "Operation was cancelled by user",
        other => return format!("Unknown exit code: {other}"),
    };
    text.to_string()
}

/// Code 1 is deliberately absent from the ERROR tier and lands in CRITICAL.
pub fn severity(code: i32) -> Severity {
    match code {
        0 => Severity::Success,
        2..=6 => Severity::Error,
        7 | 8 => Severity::Warning,
        9 => Severity::Cancelled,
        _ => Severity::Critical,
    }
}
