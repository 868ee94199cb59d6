//! In-process project host.
//!
//! [`ManifestHost`] needs no external compiler: each session extracts its
//! members with an ordinary [`Extractor`]. Project sessions contribute
//! their member list to the shared metadata table; standalone sessions
//! contribute nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use crate::error::IndexError;
use crate::extract::{ExtractOutcome, Extractor};
use crate::options::ExtractorConfig;
use crate::project::{MetadataTable, ProjectDescriptor, ProjectHost, ProjectSession, SessionError};
use crate::source::FileType;
use crate::Result;

/// Project host backed by a plain extractor.
pub struct ManifestHost {
    extractor: Arc<dyn Extractor>,
    config: ExtractorConfig,
    metadata: MetadataTable,
    sessions_opened: usize,
    shut_down: bool,
}

impl ManifestHost {
    pub fn new(extractor: Arc<dyn Extractor>, config: ExtractorConfig) -> Self {
        Self {
            extractor,
            config,
            metadata: MetadataTable::new(),
            sessions_opened: 0,
            shut_down: false,
        }
    }

    /// Number of sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened
    }

    fn session(&mut self, key: Option<String>) -> Result<ManifestSession> {
        if self.shut_down {
            return Err(IndexError::HostUnavailable(
                "manifest host has been shut down".to_string(),
            ));
        }
        self.sessions_opened += 1;
        Ok(ManifestSession {
            key,
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
            members: Vec::new(),
        })
    }
}

/// Session of a [`ManifestHost`].
pub struct ManifestSession {
    /// Metadata key; `None` for standalone sessions
    key: Option<String>,
    extractor: Arc<dyn Extractor>,
    config: ExtractorConfig,
    members: Vec<PathBuf>,
}

impl ProjectSession for ManifestSession {
    fn extract(
        &mut self,
        file: &Path,
        file_type: FileType,
        out: &Path,
    ) -> std::result::Result<ExtractOutcome, SessionError> {
        let outcome = self.extractor.extract(file, file_type, &self.config, out)?;
        self.members.push(file.to_path_buf());
        Ok(outcome)
    }
}

impl ProjectHost for ManifestHost {
    type Session = ManifestSession;

    fn open(&mut self, descriptor: &ProjectDescriptor) -> Result<ManifestSession> {
        self.session(Some(descriptor.path().display().to_string()))
    }

    fn open_standalone(&mut self, _files: &[PathBuf]) -> Result<ManifestSession> {
        self.session(None)
    }

    fn close(&mut self, session: ManifestSession) -> Result<()> {
        let Some(key) = session.key else {
            return Ok(());
        };
        let members: Vec<String> = session
            .members
            .iter()
            .map(|m| m.display().to_string())
            .collect();
        self.metadata.insert(key, json!({ "members": members }));
        Ok(())
    }

    fn merged_metadata(&mut self) -> Result<MetadataTable> {
        Ok(self.metadata.clone())
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
        tracing::debug!("manifest host shut down after {} sessions", self.sessions_opened);
    }
}
