use std::sync::Arc;

use anyhow::Result;
use loader::DataSource;
use recommend::{RecommendParams, RecommendationProvider, RecommendationSet};
use shared::domain::{InputFormat, RawDataset, SourceRef};
use tracing::debug;

/// Resolved payload of one load: the raw papers plus the recommendation set
/// when the run is adaptive.
pub struct PreparedDataset {
    pub raw: RawDataset,
    pub adaptive: Option<RecommendationSet>,
}

/// Per-view-entry data acquisition. Format dispatch is a closed enum: a new
/// input format fails to compile until every arm handles it.
pub struct AsyncLoadCoordinator {
    format: InputFormat,
    source: Arc<dyn DataSource>,
    recommendations: Arc<dyn RecommendationProvider>,
    adaptive: Option<RecommendParams>,
}

impl AsyncLoadCoordinator {
    pub fn new(
        format: InputFormat,
        source: Arc<dyn DataSource>,
        recommendations: Arc<dyn RecommendationProvider>,
    ) -> Self {
        Self {
            format,
            source,
            recommendations,
            adaptive: None,
        }
    }

    pub fn with_adaptive(mut self, params: RecommendParams) -> Self {
        self.adaptive = Some(params);
        self
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive.is_some()
    }

    pub async fn load(&self, source_ref: &SourceRef) -> Result<RawDataset> {
        debug!("load: format={:?} source={source_ref}", self.format);
        match self.format {
            InputFormat::Tabular => self.source.fetch_tabular(source_ref).await,
            InputFormat::RemoteJson => self.source.fetch_remote_revision(source_ref).await,
            InputFormat::InlineJson => self.source.parse_inline(source_ref).await,
        }
    }

    /// Primary load, then the recommendation fetch when adaptive mode
    /// applies to the entered view. A failure in either half fails the
    /// whole preparation.
    pub async fn prepare(
        &self,
        source_ref: &SourceRef,
        allow_adaptive: bool,
    ) -> Result<PreparedDataset> {
        let raw = self.load(source_ref).await?;

        let adaptive = match &self.adaptive {
            Some(params) if allow_adaptive => {
                let set = self.recommendations.recommendations(params).await?;
                debug!("load: source={source_ref} recommendations={}", set.len());
                Some(set)
            }
            _ => None,
        };

        Ok(PreparedDataset { raw, adaptive })
    }
}
