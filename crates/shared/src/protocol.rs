use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{DatasetId, ViewState},
    error::VisError,
};

/// Inbound navigation requests. Code outside the controller never mutates
/// layout or registry state directly; it publishes one of these instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum NavRequest {
    Start,
    ToTimeline,
    ToFile {
        dataset_id: DatasetId,
    },
    Resize,
    ZoomOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset_id: DatasetId,
    pub title: String,
    pub paper_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub vis_size: f64,
    pub correction_factor: f64,
    pub canvas_width: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum VisEvent {
    ViewChanged {
        from: ViewState,
        to: ViewState,
    },
    LayoutRecomputed {
        layout: LayoutSummary,
    },
    DatasetRegistered {
        dataset_id: DatasetId,
        title: String,
    },
    DatasetReady {
        summary: DatasetSummary,
    },
    DatasetLoadFailed {
        dataset_id: DatasetId,
        error: VisError,
    },
    LayoutSettled {
        dataset_id: DatasetId,
    },
    Error(VisError),
}
