use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(DatasetId);
id_newtype!(UserId);
id_newtype!(GroupId);

impl DatasetId {
    /// Sentinel for handles declared without an explicit id; the registry
    /// assigns `count() + 1` on registration.
    pub const UNASSIGNED: DatasetId = DatasetId(0);

    pub fn is_unassigned(self) -> bool {
        self == Self::UNASSIGNED
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Uninitialized,
    Overview,
    Timeline,
    SwitchingDataset,
}

/// Lifecycle phase of one dataset's sub-visualization, mirrored onto its
/// registry handle. A failed load lands in `Empty`: the dataset is visibly
/// absent rather than partially rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetPhase {
    NotStarted,
    Loading,
    Ready,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Tabular,
    RemoteJson,
    InlineJson,
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tabular" | "csv" => Ok(Self::Tabular),
            "remote_json" | "json" => Ok(Self::RemoteJson),
            "inline_json" | "json-direct" => Ok(Self::InlineJson),
            other => Err(format!("unknown input format '{other}'")),
        }
    }
}

/// Opaque dataset locator: a file path for tabular sources, a remote
/// visualization id for revision lookups, or a raw JSON document inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Last path component, used to resolve tabular sources against the
    /// configured data directory.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One dataset as declared by configuration, before registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    #[serde(default = "DatasetDescriptor::unassigned_id")]
    pub id: DatasetId,
    pub title: String,
    pub source: SourceRef,
}

impl DatasetDescriptor {
    fn unassigned_id() -> DatasetId {
        DatasetId::UNASSIGNED
    }

    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: DatasetId::UNASSIGNED,
            title: title.into(),
            source: SourceRef::new(source),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(deserialize_with = "de_string_from_any")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub year: String,
    #[serde(default, deserialize_with = "de_f64_from_any")]
    pub readers: f64,
    #[serde(default, deserialize_with = "de_f64_from_any")]
    pub x: f64,
    #[serde(default, deserialize_with = "de_f64_from_any")]
    pub y: f64,
    #[serde(default)]
    pub area: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_in: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Resolved primary payload of one load, before any adaptive merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataset {
    pub papers: Vec<PaperRecord>,
    pub retrieved_at: DateTime<Utc>,
}

impl RawDataset {
    pub fn new(papers: Vec<PaperRecord>) -> Self {
        Self {
            papers,
            retrieved_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn paper_count(&self) -> usize {
        self.papers.len()
    }

    /// Distinct area labels in first-appearance order.
    pub fn area_names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for paper in &self.papers {
            if !seen.contains(&paper.area.as_str()) {
                seen.push(paper.area.as_str());
            }
        }
        seen
    }
}

// Upstream sources are inconsistent about numeric fields: delimited files
// carry strings, some JSON endpoints carry numbers, others quote them.
fn de_string_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(value) => value,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
    })
}

fn de_f64_from_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(value) => Ok(value),
        Raw::Text(value) if value.trim().is_empty() => Ok(0.0),
        Raw::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_record_accepts_quoted_numbers() {
        let record: PaperRecord = serde_json::from_str(
            r#"{"id": 7, "title": "t", "readers": "42", "x": "0.5", "y": 1.25, "area": "A"}"#,
        )
        .expect("record");

        assert_eq!(record.id, "7");
        assert_eq!(record.readers, 42.0);
        assert_eq!(record.x, 0.5);
        assert_eq!(record.y, 1.25);
    }

    #[test]
    fn area_names_preserve_first_appearance_order() {
        let dataset: RawDataset = RawDataset::new(
            serde_json::from_str(
                r#"[
                    {"id": "1", "title": "a", "area": "B"},
                    {"id": "2", "title": "b", "area": "A"},
                    {"id": "3", "title": "c", "area": "B"}
                ]"#,
            )
            .expect("papers"),
        );

        assert_eq!(dataset.area_names(), vec!["B", "A"]);
    }

    #[test]
    fn source_ref_file_name_takes_last_component() {
        assert_eq!(SourceRef::new("./data/ecology.csv").file_name(), "ecology.csv");
        assert_eq!(SourceRef::new("ecology.csv").file_name(), "ecology.csv");
    }
}
