//! The per-file extraction path and the extractor collaborator.
//!
//! The actual parsing of a file into an artifact is done by an
//! [`Extractor`] supplied by the caller. This module wraps it with the TRAP
//! cache, vanished-file checks, strict/tolerant violation handling and
//! timing.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::cache::{TrapCache, TrapCacheKey, ENGINE_VERSION};
use crate::context::RunContext;
use crate::error::IndexError;
use crate::options::ExtractorConfig;
use crate::project::SessionError;
use crate::source::FileType;
use crate::Result;

/// What a successful extractor call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The artifact was written and the file parsed cleanly
    Extracted,
    /// The artifact was written but the file has a parse violation
    Violation(String),
}

/// A failed extractor call. Only the file itself is affected.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Turns one source file into one artifact.
///
/// Implementations must be deterministic in the file content and `config`;
/// that is what makes cached artifacts reusable across paths.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        file: &Path,
        file_type: FileType,
        config: &ExtractorConfig,
        out: &Path,
    ) -> std::result::Result<ExtractOutcome, ExtractError>;
}

/// Status of one file after the extraction phase that handled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileStatus {
    /// Extracted by the extractor (or a session)
    Extracted,
    /// Reused an artifact from the TRAP cache
    CacheHit,
    /// Extracted with a parse violation, artifact kept
    Violation(String),
    /// Extraction failed or was discarded in strict mode
    Failed(String),
    /// The file disappeared after discovery
    Vanished,
}

/// Maps source files to artifact locations under an output root.
///
/// The absolute source path is mirrored below the root, so artifacts of
/// different files never collide.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mirrored(&self, file: &Path, suffix: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in file.components() {
            match component {
                Component::Prefix(prefix) => {
                    let drive = prefix.as_os_str().to_string_lossy().replace([':', '\\', '?'], "");
                    path.push(drive);
                }
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir | Component::ParentDir => {}
            }
        }
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        path.set_file_name(name);
        path
    }

    /// Artifact path for a source file.
    pub fn artifact_path(&self, file: &Path) -> PathBuf {
        self.mirrored(file, ".trap")
    }

    /// Artifact path for the merged metadata of a project run.
    pub fn metadata_path(&self, descriptor: &Path) -> PathBuf {
        self.mirrored(descriptor, ".meta.trap")
    }

    /// Create the parent directory of `artifact`.
    pub fn prepare(&self, artifact: &Path) -> Result<()> {
        if let Some(parent) = artifact.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                IndexError::resource(format!("could not create {}", parent.display()), e)
            })?;
        }
        Ok(())
    }
}

/// Extracts single files through the TRAP cache.
pub struct FileExtractor<'a> {
    extractor: &'a dyn Extractor,
    cache: &'a dyn TrapCache,
    layout: &'a ArtifactLayout,
    config: ExtractorConfig,
}

impl<'a> FileExtractor<'a> {
    pub fn new(
        extractor: &'a dyn Extractor,
        cache: &'a dyn TrapCache,
        layout: &'a ArtifactLayout,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            extractor,
            cache,
            layout,
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        self.layout
    }

    /// Extract `file`, reusing a cached artifact when one exists.
    ///
    /// Per-file problems become diagnostics and a non-success status; only
    /// output and cache I/O failures are returned as errors.
    pub fn extract(&self, file: &Path, file_type: FileType, ctx: &RunContext) -> Result<FileStatus> {
        let attempt = self.extract_with(file, file_type, true, ctx, |out| {
            self.extractor
                .extract(file, file_type, &self.config, out)
                .map_err(SessionError::from)
        })?;
        Ok(match attempt {
            Attempt::Done(status) => status,
            Attempt::Lost(message) => FileStatus::Failed(message),
        })
    }

    /// Extract `file` through `run`, which writes the artifact to the path
    /// it is given.
    ///
    /// The cache is consulted only when `use_cache` is set. A lost backend
    /// is reported to the caller without any diagnostic so that the file
    /// can be retried elsewhere.
    pub(crate) fn extract_with<F>(
        &self,
        file: &Path,
        file_type: FileType,
        use_cache: bool,
        ctx: &RunContext,
        run: F,
    ) -> Result<Attempt>
    where
        F: FnOnce(&Path) -> std::result::Result<ExtractOutcome, SessionError>,
    {
        if !file.exists() {
            ctx.warn(
                Some(file),
                format!("Skipping {}, which does not exist.", file.display()),
            );
            return Ok(Attempt::Done(FileStatus::Vanished));
        }

        let out = self.layout.artifact_path(file);
        self.layout.prepare(&out)?;

        let key = if use_cache && self.cache.is_enabled() {
            match TrapCacheKey::for_file(file, &self.config, file_type, ENGINE_VERSION) {
                Ok(key) => Some(key),
                Err(e) => {
                    ctx.error(file, e.to_string());
                    return Ok(Attempt::Done(FileStatus::Failed(e.to_string())));
                }
            }
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(hit) = self.cache.lookup(key, ctx)? {
                fs::copy(&hit, &out).map_err(|e| {
                    IndexError::resource(format!("could not copy cached artifact {}", hit.display()), e)
                })?;
                tracing::debug!("cache hit for {}", file.display());
                return Ok(Attempt::Done(FileStatus::CacheHit));
            }
            ctx.record_cache_miss();
        }

        let step = ctx.begin(format!("Extracting {}", file.display()));
        let result = run(&out);
        step.end();

        let status = match result {
            Ok(ExtractOutcome::Extracted) => FileStatus::Extracted,
            Ok(ExtractOutcome::Violation(message)) if self.config.tolerate_parse_errors => {
                ctx.warn(Some(file), format!("{}: {}", file.display(), message));
                FileStatus::Violation(message)
            }
            Ok(ExtractOutcome::Violation(message)) => {
                discard(&out);
                ctx.error(file, format!("{}: {}", file.display(), message));
                return Ok(Attempt::Done(FileStatus::Failed(message)));
            }
            Err(SessionError::File(e)) => {
                discard(&out);
                ctx.error(file, format!("failed to extract {}: {}", file.display(), e));
                return Ok(Attempt::Done(FileStatus::Failed(e.to_string())));
            }
            Err(SessionError::Lost(message)) => {
                discard(&out);
                return Ok(Attempt::Lost(message));
            }
        };

        // Only clean artifacts are cached; a hit carries no outcome, so a
        // violation must be re-extracted to be reported again.
        if let (Some(key), FileStatus::Extracted) = (&key, &status) {
            self.cache.store(key, &out)?;
        }
        Ok(Attempt::Done(status))
    }
}

/// Result of [`FileExtractor::extract_with`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Attempt {
    Done(FileStatus),
    /// The backend died before the file could be extracted
    Lost(String),
}

/// Remove a partial or rejected artifact.
pub(crate) fn discard(out: &Path) {
    if let Err(e) = fs::remove_file(out) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("could not remove {}: {}", out.display(), e);
        }
    }
}
