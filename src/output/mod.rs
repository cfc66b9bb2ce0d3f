pub mod files;

pub use files::*;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::orchestrator::SessionReport;

/// Trait for persisting a finished session
#[async_trait]
pub trait TranscriptWriter: Send + Sync {
    /// Write the report and its transcript; returns the directory written to
    async fn write_report(&self, report: &SessionReport) -> Result<PathBuf>;
}
