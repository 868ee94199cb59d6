//! Traversal of include roots into a candidate file set.
//!
//! Every include root is walked on its own, starting at the root itself and
//! never at an ancestor. That is what gives include and exclude paths their
//! specificity-based precedence:
//!
//! - an include root nested inside an excluded directory is walked from the
//!   include root, so the excluded ancestor is never visited and cannot
//!   prune it;
//! - an exclude path nested inside an include root is visited by that root's
//!   walk and prunes its own subtree.
//!
//! When a file is both an include path and an exclude path, the include wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::context::RunContext;
use crate::error::IndexError;
use crate::options::TypeScriptMode;
use crate::source::filetype::{Classifier, FileType};
use crate::source::filter::FilterRuleSet;
use crate::source::resolve::PathSet;
use crate::Result;

/// File name of a TypeScript project descriptor.
pub const DESCRIPTOR_FILE_NAME: &str = "tsconfig.json";

/// A file that survived the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Include root the file was discovered under
    pub root: PathBuf,
    /// Type assigned by the classifier
    pub file_type: FileType,
}

/// Result of walking all include roots.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Supported files, in walk order
    pub candidates: Vec<CandidateFile>,
    /// Project descriptors, in walk order
    pub descriptors: Vec<PathBuf>,
}

impl Discovery {
    /// Keep only candidates that also pass the glob filter.
    pub fn filter(mut self, rules: &FilterRuleSet) -> Self {
        self.candidates.retain(|c| rules.include_file(&c.path));
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.candidates.iter().map(|c| c.path.as_path())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.candidates.iter().any(|c| c.path == path)
    }
}

/// Walks include roots, honouring exclude paths.
#[derive(Debug, Clone, Copy)]
pub struct Walker {
    classifier: Classifier,
    typescript: TypeScriptMode,
}

impl Walker {
    pub fn new(typescript: TypeScriptMode) -> Self {
        Self {
            classifier: Classifier::new(typescript),
            typescript,
        }
    }

    /// Walk every include root in order and collect candidates and
    /// project descriptors.
    ///
    /// An unreadable include root aborts the run; unreadable entries below
    /// a root are reported and skipped.
    pub fn discover(
        &self,
        includes: &PathSet,
        excludes: &PathSet,
        ctx: &RunContext,
    ) -> Result<Discovery> {
        let mut discovery = Discovery::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut seen_descriptors: HashSet<PathBuf> = HashSet::new();

        for root in includes.iter() {
            let walker = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| keep_entry(e, excludes));

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(err) if err.depth() == 0 => {
                        let io = err.into_io_error().unwrap_or_else(|| {
                            std::io::Error::other("filesystem loop at include root")
                        });
                        return Err(IndexError::resource(
                            format!("could not read include root {}", root.display()),
                            io,
                        ));
                    }
                    Err(err) => {
                        let path = err.path().map(Path::to_path_buf);
                        ctx.warn(path.as_deref(), format!("Skipping unreadable entry: {err}"));
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if excludes.contains(path) && !includes.contains(path) {
                    tracing::debug!("excluded {}", path.display());
                    continue;
                }

                if let Some(file_type) = self.classifier.classify(path) {
                    if seen.insert(path.to_path_buf()) {
                        discovery.candidates.push(CandidateFile {
                            path: path.to_path_buf(),
                            root: root.to_path_buf(),
                            file_type,
                        });
                    }
                }

                if self.typescript == TypeScriptMode::Full
                    && entry.file_name() == DESCRIPTOR_FILE_NAME
                    && seen_descriptors.insert(path.to_path_buf())
                {
                    discovery.descriptors.push(path.to_path_buf());
                }
            }
        }

        Ok(discovery)
    }
}

/// Decide whether to descend into / yield an entry.
///
/// The walk's own root is always kept. Symlinks are never followed or
/// yielded. Hidden and excluded directories are pruned.
fn keep_entry(entry: &DirEntry, excludes: &PathSet) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.path_is_symlink() {
        return false;
    }
    if entry.file_type().is_dir() {
        let hidden = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'));
        if hidden || excludes.contains(entry.path()) {
            tracing::debug!("pruned {}", entry.path().display());
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn set(paths: &[&Path]) -> PathSet {
        paths.iter().map(|p| p.to_path_buf()).collect()
    }

    fn write(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "var x = 1;\n").unwrap();
        path
    }

    fn discover(includes: &[&Path], excludes: &[&Path]) -> Discovery {
        Walker::new(TypeScriptMode::Full)
            .discover(&set(includes), &set(excludes), &RunContext::new())
            .unwrap()
    }

    #[test]
    fn test_exclude_nested_in_include_wins() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let kept = write(&root, "src/app.js");
        let dropped = write(&root, "src/gen/out.js");

        let found = discover(&[&root], &[&root.join("src/gen")]);
        assert!(found.contains(&kept));
        assert!(!found.contains(&dropped));
    }

    #[test]
    fn test_include_nested_in_exclude_wins() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let inner = write(&root, "vendor/lib/keep.js");
        let other = write(&root, "vendor/drop.js");
        let top = write(&root, "main.js");

        let found = discover(&[&root, &root.join("vendor/lib")], &[&root.join("vendor")]);
        assert!(found.contains(&inner));
        assert!(found.contains(&top));
        assert!(!found.contains(&other));
    }

    #[test]
    fn test_file_in_both_sets_is_included() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let both = write(&root, "a.js");

        let found = discover(&[&root, &both], &[&both]);
        assert!(found.contains(&both));
        assert_eq!(found.candidates.len(), 1);
    }

    #[test]
    fn test_excluded_file_is_dropped() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let file = write(&root, "a.js");
        let other = write(&root, "b.js");

        let found = discover(&[&root], &[&file]);
        assert!(!found.contains(&file));
        assert!(found.contains(&other));
    }

    #[test]
    fn test_hidden_directories_are_pruned_below_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let hidden = write(&root, ".cache/a.js");
        let hidden_file = write(&root, ".eslintrc.js");

        let found = discover(&[&root], &[]);
        assert!(!found.contains(&hidden));
        assert!(found.contains(&hidden_file));

        let found = discover(&[&root.join(".cache")], &[]);
        assert!(found.contains(&hidden));
    }

    #[test]
    fn test_excluded_root_is_still_walked() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let file = write(&root, "lib/a.js");

        let found = discover(&[&root.join("lib")], &[&root.join("lib")]);
        assert!(found.contains(&file));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let outside = tempdir().unwrap();
        write(outside.path(), "secret.js");
        std::os::unix::fs::symlink(outside.path(), root.join("linked")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.js"), root.join("alias.js")).unwrap();

        let found = discover(&[&root], &[]);
        assert!(found.candidates.is_empty());
    }

    #[test]
    fn test_unsupported_files_are_skipped_but_descriptors_collected() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        write(&root, "README.md");
        fs::write(root.join("tsconfig.json"), "{}").unwrap();
        write(&root, "src/main.ts");

        let found = discover(&[&root], &[]);
        assert_eq!(found.descriptors, vec![root.join("tsconfig.json")]);
        assert!(found.paths().all(|p| !p.ends_with("README.md")));
        assert!(found.contains(&root.join("src/main.ts")));
        // tsconfig.json is also a supported JSON candidate
        assert!(found.contains(&root.join("tsconfig.json")));
    }

    #[test]
    fn test_descriptors_need_full_mode_and_respect_excludes() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(root.join("tsconfig.json"), "{}").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/tsconfig.json"), "{}").unwrap();

        let basic = Walker::new(TypeScriptMode::Basic)
            .discover(&set(&[&root]), &PathSet::new(), &RunContext::new())
            .unwrap();
        assert!(basic.descriptors.is_empty());

        let found = discover(&[&root], &[&root.join("sub/tsconfig.json")]);
        assert_eq!(found.descriptors, vec![root.join("tsconfig.json")]);
    }

    #[test]
    fn test_order_is_stable_and_follows_root_order() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let b = write(&root, "b/z.js");
        let a = write(&root, "a/y.js");
        let a2 = write(&root, "a/x.js");

        let found = discover(&[&root.join("b"), &root.join("a")], &[]);
        let paths: Vec<&Path> = found.paths().collect();
        assert_eq!(paths, vec![b.as_path(), a2.as_path(), a.as_path()]);
        assert_eq!(found.candidates[0].root, root.join("b"));
    }

    #[test]
    fn test_overlapping_roots_do_not_duplicate() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        write(&root, "src/a.js");

        let found = discover(&[&root, &root.join("src")], &[]);
        assert_eq!(found.candidates.len(), 1);
        assert_eq!(found.candidates[0].root, root);
    }

    #[test]
    fn test_missing_root_is_resource_error() {
        let result = Walker::new(TypeScriptMode::Basic).discover(
            &set(&[Path::new("/nonexistent/srcindex")]),
            &PathSet::new(),
            &RunContext::new(),
        );
        assert!(matches!(result, Err(IndexError::Resource { .. })));
    }

    #[test]
    fn test_discovery_filter_applies_rules() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let plain = write(&root, "app.js");
        let minified = write(&root, "app.min.js");

        let rules = FilterRuleSet::defaults(TypeScriptMode::Basic).unwrap();
        let found = discover(&[&root], &[]).filter(&rules);
        assert!(found.contains(&plain));
        assert!(!found.contains(&minified));
    }
}
