use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::FlowError;

/// Fixed name a staged config takes inside an environment's project directory.
pub const PROJECT_CONFIG_NAME: &str = "config.xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub tag: String,
    #[serde(default, alias = "acpProjectDir")]
    pub project_dir: Option<PathBuf>,
}

impl Environment {
    /// The project directory, if one is configured and present on disk.
    pub fn existing_project_dir(&self) -> Option<&Path> {
        self.project_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty() && dir.is_dir())
    }
}

pub trait EnvironmentStore: Send + Sync {
    fn find_by_tag(&self, tag: &str) -> Option<Environment>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticEnvironments {
    by_tag: HashMap<String, Environment>,
}

impl StaticEnvironments {
    pub fn new(environments: impl IntoIterator<Item = Environment>) -> Self {
        Self {
            by_tag: environments
                .into_iter()
                .map(|env| (env.tag.clone(), env))
                .collect(),
        }
    }

    /// Loads a JSON array of environment records.
    pub fn from_json_file(path: &Path) -> Result<Self, FlowError> {
        let text = fs::read_to_string(path).map_err(|err| FlowError::io(path, err))?;
        let environments: Vec<Environment> = serde_json::from_str(&text).map_err(|err| {
            FlowError::invalid(format!("bad environments file {}: {err}", path.display()))
        })?;
        Ok(Self::new(environments))
    }
}

impl EnvironmentStore for StaticEnvironments {
    fn find_by_tag(&self, tag: &str) -> Option<Environment> {
        self.by_tag.get(tag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_records_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("environments.json");
        fs::write(
            &file,
            r#"[{"tag":"DEV","projectDir":"/srv/acp/dev"},{"tag":"QA","acpProjectDir":""},{"tag":"PROD"}]"#,
        )
        .unwrap();
        let store = StaticEnvironments::from_json_file(&file).unwrap();

        let dev = store.find_by_tag("DEV").unwrap();
        assert_eq!(dev.project_dir, Some(PathBuf::from("/srv/acp/dev")));
        assert_eq!(store.find_by_tag("QA").unwrap().existing_project_dir(), None);
        assert_eq!(store.find_by_tag("PROD").unwrap().project_dir, None);
        assert!(store.find_by_tag("UAT").is_none());
    }

    #[test]
    fn project_dir_must_exist() {
        let dir = tempdir().unwrap();
        let present = Environment {
            tag: "DEV".to_string(),
            project_dir: Some(dir.path().to_path_buf()),
        };
        assert_eq!(present.existing_project_dir(), Some(dir.path()));
        let absent = Environment {
            tag: "DEV".to_string(),
            project_dir: Some(dir.path().join("gone")),
        };
        assert_eq!(absent.existing_project_dir(), None);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("environments.json");
        fs::write(&file, "{not json").unwrap();
        assert!(matches!(
            StaticEnvironments::from_json_file(&file),
            Err(FlowError::InvalidRequest { .. })
        ));
    }
}
