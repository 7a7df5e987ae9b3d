//! The `features_values.json` document: admissible values per field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

/// Enumeration of admissible values for one field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldValues {
    pub name: String,
    /// When true, only the listed values are admissible; otherwise they
    /// are suggestions.
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

/// Per-section field value enumerations. The file is optional; an absent
/// file loads as the empty default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeaturesValues {
    #[serde(default)]
    pub items: Vec<FieldValues>,
    #[serde(default)]
    pub views: Vec<FieldValues>,
    #[serde(default)]
    pub objects: Vec<FieldValues>,
}

impl FeaturesValues {
    pub fn load_or_default(path: &Path) -> Result<FeaturesValues> {
        if !path.is_file() {
            return Ok(FeaturesValues::default());
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::invalid_format("features_values.json", e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::invalid_format("features_values.json", e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded =
            FeaturesValues::load_or_default(&dir.path().join("features_values.json")).unwrap();
        assert_eq!(loaded, FeaturesValues::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features_values.json");
        let values = FeaturesValues {
            items: vec![FieldValues {
                name: "split".to_string(),
                restricted: true,
                values: vec!["train".into(), "val".into()],
            }],
            ..Default::default()
        };
        values.save(&path).unwrap();
        assert_eq!(FeaturesValues::load_or_default(&path).unwrap(), values);
    }
}
