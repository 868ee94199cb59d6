//! Read-only view over another cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{TrapCache, TrapCacheKey};
use crate::context::RunContext;
use crate::Result;

/// Wraps a pre-populated cache so that it is never written to.
///
/// Lookups hit only when the artifact already exists. The first miss is
/// reported once; later misses are silent and callers fall back to
/// extracting directly.
#[derive(Debug)]
pub struct ReadOnlyCache<C> {
    inner: C,
    label: String,
    warned: AtomicBool,
}

impl<C: TrapCache> ReadOnlyCache<C> {
    /// `label` names the cache in the miss warning.
    pub fn new(inner: C, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            warned: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: TrapCache> TrapCache for ReadOnlyCache<C> {
    fn lookup(&self, key: &TrapCacheKey, ctx: &RunContext) -> Result<Option<PathBuf>> {
        let hit = self.inner.lookup(key, ctx)?.filter(|path| path.is_file());
        if hit.is_none() && !self.warned.swap(true, Ordering::Relaxed) {
            ctx.warn(None, format!("Trap cache lookup for {} failed.", self.label));
        }
        Ok(hit)
    }

    fn store(&self, _key: &TrapCacheKey, _artifact: &Path) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}
