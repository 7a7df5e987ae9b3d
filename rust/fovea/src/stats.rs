//! The `stats.json` document: named histograms over dataset fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fovea_common::{Result, error::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Categorical,
    Numerical,
}

/// One named histogram. Numerical stats may carry a `[min, max]` range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStat {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StatType,
    pub histogram: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

/// Loads the stats array; an absent file loads as empty.
pub fn load_stats(path: &Path) -> Result<Vec<DatasetStat>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let json =
        std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    serde_json::from_str(&json).map_err(|e| Error::invalid_format("stats.json", e.to_string()))
}

/// Saves a stat into the array, replacing any prior entry with the same
/// name, and returns the updated array.
pub fn save_stat(path: &Path, stat: DatasetStat) -> Result<Vec<DatasetStat>> {
    let mut stats = load_stats(path)?;
    match stats.iter_mut().find(|s| s.name == stat.name) {
        Some(existing) => *existing = stat,
        None => stats.push(stat),
    }
    let json = serde_json::to_string_pretty(&stats)
        .map_err(|e| Error::invalid_format("stats.json", e.to_string()))?;
    std::fs::write(path, json).map_err(|e| Error::io(path.display().to_string(), e))?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &str, buckets: usize) -> DatasetStat {
        DatasetStat {
            name: name.to_string(),
            kind: StatType::Categorical,
            histogram: (0..buckets)
                .map(|i| serde_json::json!({"split": format!("s{i}"), "count": i}))
                .collect(),
            range: None,
        }
    }

    #[test]
    fn save_replaces_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        save_stat(&path, stat("splits", 1)).unwrap();
        save_stat(&path, stat("widths", 2)).unwrap();
        let stats = save_stat(&path, stat("splits", 3)).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "splits");
        assert_eq!(stats[0].histogram.len(), 3);
    }

    #[test]
    fn numerical_range_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stat = DatasetStat {
            name: "width".to_string(),
            kind: StatType::Numerical,
            histogram: vec![serde_json::json!({"bin": 0, "count": 10})],
            range: Some([0.0, 1920.0]),
        };
        save_stat(&path, stat.clone()).unwrap();
        assert_eq!(load_stats(&path).unwrap(), vec![stat]);
    }
}
