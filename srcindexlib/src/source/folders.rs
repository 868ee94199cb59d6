//! Repository folder classifications.
//!
//! A repository-folders file is a CSV with a header line followed by
//! `classification,path` rows. Folders classified as `external` or
//! `metadata` are never analyzed and become exclude paths.

use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use url::Url;

use crate::context::RunContext;
use crate::error::IndexError;
use crate::source::resolve::PathSet;
use crate::Result;

const EXCLUDED_CLASSES: [&str; 2] = ["external", "metadata"];

/// Read `csv` and add every external/metadata folder to `excludes`.
///
/// An unreadable file aborts the run; rows naming paths that cannot be
/// resolved are reported and skipped.
pub fn add_classified_excludes(csv: &Path, excludes: &mut PathSet, ctx: &RunContext) -> Result<()> {
    let unreadable =
        |e: csv::Error| IndexError::resource("unable to process repository folder CSV", e.into());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv)
        .map_err(unreadable)?;

    for record in reader.records() {
        let record = record.map_err(unreadable)?;
        if record.len() != 2 {
            continue;
        }
        let (class, folder) = (&record[0], &record[1]);
        if !EXCLUDED_CLASSES.contains(&class) {
            continue;
        }
        match folder_path(folder).and_then(|p| p.canonicalize().ok()) {
            Some(real) => {
                excludes.insert(real);
            }
            None => ctx.warn(
                None,
                format!("Ignoring '{class}' classification for {folder}, which is not a valid path."),
            ),
        }
    }
    Ok(())
}

/// Accept plain paths and `file://` URIs.
fn folder_path(folder: &str) -> Option<PathBuf> {
    if folder.is_empty() {
        return None;
    }
    if folder.starts_with("file://") {
        Url::parse(folder).ok()?.to_file_path().ok()
    } else {
        Some(PathBuf::from(folder))
    }
}
