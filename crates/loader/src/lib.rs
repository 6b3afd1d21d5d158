use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

use shared::domain::{PaperRecord, RawDataset, SourceRef};

pub mod tabular;

/// Resolves one dataset source into its raw paper payload. One method per
/// input format; the caller decides which to invoke.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Reads a delimited file from the local data directory.
    async fn fetch_tabular(&self, source: &SourceRef) -> Result<RawDataset>;

    /// Fetches the latest stored revision for a remote visualization id.
    async fn fetch_remote_revision(&self, source: &SourceRef) -> Result<RawDataset>;

    /// Treats the source itself as a JSON document of papers.
    async fn parse_inline(&self, source: &SourceRef) -> Result<RawDataset>;
}

#[derive(Clone)]
pub struct FsHttpDataSource {
    http: reqwest::Client,
    data_dir: PathBuf,
    revision_endpoint: String,
}

impl FsHttpDataSource {
    pub fn new(data_dir: impl Into<PathBuf>, revision_endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            data_dir: data_dir.into(),
            revision_endpoint: revision_endpoint.into(),
        }
    }

    fn revision_url(&self, source: &SourceRef) -> Result<Url> {
        let mut url = Url::parse(&self.revision_endpoint).with_context(|| {
            format!(
                "invalid revision endpoint '{}'",
                self.revision_endpoint
            )
        })?;
        url.query_pairs_mut().append_pair("vis_id", &source.0);
        Ok(url)
    }
}

#[async_trait]
impl DataSource for FsHttpDataSource {
    async fn fetch_tabular(&self, source: &SourceRef) -> Result<RawDataset> {
        let file_name = source.file_name();
        if file_name.is_empty() {
            bail!("tabular source '{source}' has no file name");
        }

        let path = self.data_dir.join(file_name);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read tabular file {}", path.display()))?;
        let papers = tabular::parse_records(&text)
            .with_context(|| format!("failed to parse tabular file {}", path.display()))?;
        Ok(RawDataset::new(papers))
    }

    async fn fetch_remote_revision(&self, source: &SourceRef) -> Result<RawDataset> {
        let url = self.revision_url(source)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("revision request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("revision endpoint {url} rejected the request"))?;

        let papers: Vec<PaperRecord> = response
            .json()
            .await
            .with_context(|| format!("revision payload from {url} was not a paper array"))?;
        Ok(RawDataset::new(papers))
    }

    async fn parse_inline(&self, source: &SourceRef) -> Result<RawDataset> {
        let papers: Vec<PaperRecord> =
            serde_json::from_str(&source.0).context("inline source was not a JSON paper array")?;
        Ok(RawDataset::new(papers))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
