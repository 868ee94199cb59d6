//! A self-contained extractor producing one JSON record per file.
//!
//! The record only depends on the file content and the extractor
//! configuration, never on the path, so its artifacts can be shared
//! through the TRAP cache.

use std::fs;
use std::path::Path;

use serde::Serialize;
use srcindexlib::{ExtractError, ExtractOutcome, Extractor, ExtractorConfig, FileType};

#[derive(Debug, Serialize)]
struct Record<'a> {
    #[serde(rename = "type")]
    file_type: FileType,
    size: u64,
    lines: usize,
    digest: String,
    encoding: &'a str,
    externs: bool,
}

/// Writes a [`Record`] for every file.
///
/// Content that is not valid UTF-8, and JSON files that do not parse, are
/// reported as violations; the record is written either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordExtractor;

impl Extractor for RecordExtractor {
    fn extract(
        &self,
        file: &Path,
        file_type: FileType,
        config: &ExtractorConfig,
        out: &Path,
    ) -> Result<ExtractOutcome, ExtractError> {
        let bytes = fs::read(file)?;
        let text = String::from_utf8_lossy(&bytes);

        let violation = match std::str::from_utf8(&bytes) {
            Err(e) => Some(format!("invalid UTF-8 at byte {}", e.valid_up_to())),
            Ok(text) if file_type == FileType::Json => serde_json::from_str::<serde_json::Value>(text)
                .err()
                .map(|e| format!("JSON syntax error: {e}")),
            Ok(_) => None,
        };

        let record = Record {
            file_type,
            size: bytes.len() as u64,
            lines: text.lines().count(),
            digest: blake3::hash(&bytes).to_hex().to_string(),
            encoding: &config.default_encoding,
            externs: config.externs,
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| ExtractError::Failed(e.to_string()))?;
        fs::write(out, json)?;

        Ok(match violation {
            Some(message) => ExtractOutcome::Violation(message),
            None => ExtractOutcome::Extracted,
        })
    }
}
