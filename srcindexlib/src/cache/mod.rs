//! Content-addressable TRAP cache.
//!
//! Extraction artifacts are stored under a key derived from the file's
//! content, the extractor configuration, the file type and the engine
//! version. The file's path never takes part, so identical files share one
//! artifact and a version bump invalidates everything at once.
//!
//! Three implementations are provided:
//!
//! - [`DirectoryCache`]: read-write cache in a directory, optionally bounded
//! - [`NullCache`]: no caching at all
//! - [`ReadOnlyCache`]: wraps another cache, never stores, and reports the
//!   first miss of a run

pub mod directory;
pub mod readonly;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::RunContext;
use crate::error::IndexError;
use crate::options::ExtractorConfig;
use crate::source::FileType;
use crate::Result;

pub use directory::DirectoryCache;
pub use readonly::ReadOnlyCache;

/// Engine identity baked into every cache key.
pub const ENGINE_VERSION: &str = concat!("srcindex-", env!("CARGO_PKG_VERSION"));

/// Key identifying a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrapCacheKey(String);

impl TrapCacheKey {
    /// Derive a key from file content and extraction settings.
    pub fn compute(
        content: &[u8],
        config: &ExtractorConfig,
        file_type: FileType,
        engine_version: &str,
    ) -> Self {
        let fingerprint = config.cache_fingerprint();
        let mut hasher = blake3::Hasher::new();
        for part in [
            engine_version.as_bytes(),
            file_type.tag().as_bytes(),
            fingerprint.as_slice(),
            content,
        ] {
            // Length prefixes keep the parts from running into each other.
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        TrapCacheKey(hasher.finalize().to_hex().to_string())
    }

    /// Read `path` and derive its key.
    pub fn for_file(
        path: &Path,
        config: &ExtractorConfig,
        file_type: FileType,
        engine_version: &str,
    ) -> Result<Self> {
        let content = fs::read(path).map_err(|source| IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::compute(&content, config, file_type, engine_version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrapCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A store of extraction artifacts keyed by [`TrapCacheKey`].
///
/// Implementations must tolerate concurrent `store` calls for the same key;
/// artifacts are a pure function of their key, so last write wins.
pub trait TrapCache: Send + Sync {
    /// Path of the cached artifact for `key`, or `None` on a miss.
    fn lookup(&self, key: &TrapCacheKey, ctx: &RunContext) -> Result<Option<PathBuf>>;

    /// Record `artifact` as the result for `key`.
    fn store(&self, key: &TrapCacheKey, artifact: &Path) -> Result<()>;

    /// Whether lookups can ever hit.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cache used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl TrapCache for NullCache {
    fn lookup(&self, _key: &TrapCacheKey, _ctx: &RunContext) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    fn store(&self, _key: &TrapCacheKey, _artifact: &Path) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl<C: TrapCache + ?Sized> TrapCache for Box<C> {
    fn lookup(&self, key: &TrapCacheKey, ctx: &RunContext) -> Result<Option<PathBuf>> {
        (**self).lookup(key, ctx)
    }

    fn store(&self, key: &TrapCacheKey, artifact: &Path) -> Result<()> {
        (**self).store(key, artifact)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}
