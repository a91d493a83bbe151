use std::path::PathBuf;
use std::time::Duration;

/// Configured command lines for the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommands {
    pub export: String,
    pub import: String,
    pub averify: String,
    pub filecopy: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            export: "./acp export".to_string(),
            import: "./acp import".to_string(),
            averify: "./averify".to_string(),
            filecopy: "./filecopy".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub work_dir: PathBuf,
    pub commands: ToolCommands,
    pub demo_mode: bool,
    pub demo_duration: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./work"),
            commands: ToolCommands::default(),
            demo_mode: false,
            demo_duration: Duration::from_secs(5),
        }
    }
}
