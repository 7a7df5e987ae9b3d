//! The `info.json` dataset header.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

fn default_size() -> String {
    "Unknown".to_string()
}

/// Dataset identity and coarse statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default)]
    pub num_elements: u64,
}

impl DatasetInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> DatasetInfo {
        DatasetInfo {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            size: default_size(),
            num_elements: 0,
        }
    }

    pub fn load(path: &Path) -> Result<DatasetInfo> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        serde_json::from_str(&json).map_err(|e| Error::invalid_format("info.json", e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::invalid_format("info.json", e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_on_load() {
        let info: DatasetInfo =
            serde_json::from_str(r#"{"id": "ds1", "name": "birds"}"#).unwrap();
        assert_eq!(info.size, "Unknown");
        assert_eq!(info.num_elements, 0);
        assert!(info.description.is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.json");
        let mut info = DatasetInfo::new("ds1", "birds");
        info.num_elements = 42;
        info.save(&path).unwrap();
        assert_eq!(DatasetInfo::load(&path).unwrap(), info);
    }
}
