//! Read-write TRAP cache stored in a directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::cache::{TrapCache, TrapCacheKey};
use crate::context::RunContext;
use crate::error::IndexError;
use crate::Result;

const ARTIFACT_SUFFIX: &str = "trap";

/// Artifacts live at `<root>/<first two hex digits>/<rest>.trap`.
#[derive(Debug)]
pub struct DirectoryCache {
    root: PathBuf,
    size_bound: Option<u64>,
    tmp_counter: AtomicU64,
}

impl DirectoryCache {
    /// Open (creating if needed) a cache rooted at `root`.
    ///
    /// With a size bound, the least recently written artifacts are evicted
    /// until the cache fits.
    pub fn open(root: impl Into<PathBuf>, size_bound: Option<u64>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            IndexError::resource(format!("could not create TRAP cache at {}", root.display()), e)
        })?;
        let cache = Self {
            root,
            size_bound,
            tmp_counter: AtomicU64::new(0),
        };
        if let Some(bound) = size_bound {
            cache.enforce_bound(bound)?;
        }
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn size_bound(&self) -> Option<u64> {
        self.size_bound
    }

    /// Where the artifact for `key` lives, whether or not it exists.
    pub fn entry_path(&self, key: &TrapCacheKey) -> PathBuf {
        let (shard, rest) = key.as_str().split_at(2.min(key.as_str().len()));
        self.root
            .join(shard)
            .join(format!("{rest}.{ARTIFACT_SUFFIX}"))
    }

    /// Total size of all artifacts in bytes.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.artifacts()?.iter().map(|(_, size, _)| size).sum())
    }

    fn artifacts(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>> {
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop in TRAP cache"));
                IndexError::resource("could not scan TRAP cache", io)
            })?;
            let is_artifact = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|e| e == ARTIFACT_SUFFIX);
            if !is_artifact {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| IndexError::resource("could not scan TRAP cache", e.into()))?;
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            artifacts.push((entry.into_path(), meta.len(), modified));
        }
        Ok(artifacts)
    }

    fn enforce_bound(&self, bound: u64) -> Result<()> {
        let mut artifacts = self.artifacts()?;
        let mut total: u64 = artifacts.iter().map(|(_, size, _)| size).sum();
        if total <= bound {
            return Ok(());
        }
        // Oldest first; path breaks ties so eviction is deterministic.
        artifacts.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.0.cmp(&b.0)));
        let mut evicted = 0usize;
        for (path, size, _) in artifacts {
            if total <= bound {
                break;
            }
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(IndexError::resource(
                        format!("could not evict {}", path.display()),
                        e,
                    ))
                }
            }
            total = total.saturating_sub(size);
            evicted += 1;
        }
        tracing::info!(
            "evicted {} TRAP cache entries to fit {} bytes",
            evicted,
            bound
        );
        Ok(())
    }
}

impl TrapCache for DirectoryCache {
    fn lookup(&self, key: &TrapCacheKey, _ctx: &RunContext) -> Result<Option<PathBuf>> {
        let path = self.entry_path(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::resource(
                format!("could not read TRAP cache entry {}", path.display()),
                e,
            )),
        }
    }

    fn store(&self, key: &TrapCacheKey, artifact: &Path) -> Result<()> {
        let target = self.entry_path(key);
        let shard = target.parent().unwrap_or(&self.root);
        fs::create_dir_all(shard).map_err(|e| {
            IndexError::resource(format!("could not create {}", shard.display()), e)
        })?;

        // Copy then rename so readers never observe a partial artifact.
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = shard.join(format!(
            ".{}.{}-{}.tmp",
            key.as_str(),
            std::process::id(),
            n
        ));
        fs::copy(artifact, &tmp).map_err(|e| {
            IndexError::resource(format!("could not write TRAP cache entry {}", tmp.display()), e)
        })?;
        fs::rename(&tmp, &target).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            IndexError::resource(format!("could not write TRAP cache entry {}", target.display()), e)
        })?;
        tracing::debug!("cached {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ExtractorConfig;
    use crate::source::FileType;
    use tempfile::tempdir;

    fn key(content: &[u8]) -> TrapCacheKey {
        TrapCacheKey::compute(content, &ExtractorConfig::new(), FileType::Js, "test")
    }

    #[test]
    fn test_store_then_lookup() {
        let temp = tempdir().unwrap();
        let cache = DirectoryCache::open(temp.path().join("cache"), None).unwrap();
        let ctx = RunContext::new();
        let artifact = temp.path().join("out.trap");
        fs::write(&artifact, "artifact").unwrap();

        let k = key(b"a");
        assert_eq!(cache.lookup(&k, &ctx).unwrap(), None);
        cache.store(&k, &artifact).unwrap();

        let hit = cache.lookup(&k, &ctx).unwrap().unwrap();
        assert_eq!(hit, cache.entry_path(&k));
        assert_eq!(fs::read_to_string(hit).unwrap(), "artifact");
    }

    #[test]
    fn test_store_is_idempotent() {
        let temp = tempdir().unwrap();
        let cache = DirectoryCache::open(temp.path().join("cache"), None).unwrap();
        let artifact = temp.path().join("out.trap");
        fs::write(&artifact, "same").unwrap();

        let k = key(b"a");
        cache.store(&k, &artifact).unwrap();
        cache.store(&k, &artifact).unwrap();

        assert_eq!(cache.total_size().unwrap(), 4);
        let leftovers = fs::read_dir(cache.entry_path(&k).parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_entry_path_is_sharded() {
        let temp = tempdir().unwrap();
        let cache = DirectoryCache::open(temp.path(), None).unwrap();
        let k = key(b"a");
        let path = cache.entry_path(&k);

        let shard = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(shard, &k.as_str()[..2]);
        assert!(path.to_string_lossy().ends_with(".trap"));
    }

    #[test]
    fn test_size_bound_evicts_oldest() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("cache");
        let artifact = temp.path().join("out.trap");
        fs::write(&artifact, vec![b'x'; 100]).unwrap();

        let cache = DirectoryCache::open(&root, None).unwrap();
        let keys: Vec<TrapCacheKey> = (0..3u8).map(|i| key(&[i])).collect();
        for (i, k) in keys.iter().enumerate() {
            cache.store(k, &artifact).unwrap();
            let file = fs::File::options()
                .write(true)
                .open(cache.entry_path(k))
                .unwrap();
            let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000 + i as u64);
            file.set_modified(when).unwrap();
        }
        assert_eq!(cache.total_size().unwrap(), 300);

        let bounded = DirectoryCache::open(&root, Some(250)).unwrap();
        let ctx = RunContext::new();
        assert_eq!(bounded.lookup(&keys[0], &ctx).unwrap(), None);
        assert!(bounded.lookup(&keys[1], &ctx).unwrap().is_some());
        assert!(bounded.lookup(&keys[2], &ctx).unwrap().is_some());
        assert_eq!(bounded.total_size().unwrap(), 200);
    }

    #[test]
    fn test_open_on_file_is_resource_error() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, "").unwrap();

        let result = DirectoryCache::open(file.join("cache"), None);
        assert!(matches!(result, Err(IndexError::Resource { .. })));
    }
}
