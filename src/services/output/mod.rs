use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{AlignedWordRecord, ResultDocument};

/// Suffix appended to the input stem for the default output file
pub const RESULT_SUFFIX: &str = "_results.json";

/// `<input dir>/<input stem>_results.json`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}{}", stem, RESULT_SUFFIX);

    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Persists aligned records as a pretty-printed JSON document.
///
/// The document is written next to the destination first and renamed into
/// place, so the destination either holds a complete result or is untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultWriter;

impl JsonResultWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn document(&self, records: Vec<AlignedWordRecord>) -> ResultDocument {
        ResultDocument {
            timestamp: Utc::now().to_rfc3339(),
            total_words: records.len(),
            results: records,
        }
    }

    #[instrument(skip(self, records), fields(records = records.len(), path = %path.display()))]
    pub async fn write(&self, records: Vec<AlignedWordRecord>, path: &Path) -> PipelineResult<PathBuf> {
        let document = self.document(records);
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_failed(parent, e))?;
        }

        let tmp_path = temp_sibling(path);
        if let Err(e) = tokio::fs::write(&tmp_path, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(persistence_failed(&tmp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(persistence_failed(path, e));
        }

        info!("Wrote {} words to {}", document.total_words, path.display());
        Ok(path.to_path_buf())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn persistence_failed(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::PersistenceFailed {
        path: path.to_path_buf(),
        source,
    }
}
