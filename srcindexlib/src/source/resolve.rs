//! Resolution of textual include/exclude patterns into canonical paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::context::RunContext;
use crate::error::IndexError;
use crate::Result;

/// Outcome of resolving a single path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The pattern named an existing path
    Path(PathBuf),
    /// The pattern was present but blank
    Empty,
    /// The pattern named a path that could not be canonicalized
    Missing,
}

impl Resolved {
    /// Whether a non-blank pattern was seen, resolvable or not.
    pub fn was_present(&self) -> bool {
        !matches!(self, Resolved::Empty)
    }
}

/// An insertion-ordered set of canonical paths with exact-membership lookup.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    order: Vec<PathBuf>,
    members: HashSet<PathBuf>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `path`; returns false if it was already present.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.members.insert(path.clone()) {
            self.order.push(path);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.members.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.order.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl FromIterator<PathBuf> for PathSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        let mut set = PathSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

/// Canonicalize the source root. Failure here is fatal for the run.
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize().map_err(|e| {
        IndexError::resource(
            format!("could not compute real path for {}", root.display()),
            e,
        )
    })
}

/// Resolve `pattern` against `base` and canonicalize it.
///
/// Unresolvable patterns produce a warning in `ctx` and [`Resolved::Missing`].
pub fn resolve(base: &Path, pattern: &str, ctx: &RunContext) -> Resolved {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Resolved::Empty;
    }
    let path = base.join(pattern);
    match path.canonicalize() {
        Ok(real) => Resolved::Path(real),
        Err(_) => {
            ctx.warn(
                Some(&path),
                format!("Skipping path {}, which does not exist.", path.display()),
            );
            Resolved::Missing
        }
    }
}

/// Resolve every pattern, returning the resolved set and whether any
/// non-blank pattern was present.
pub fn resolve_all<'a>(
    base: &Path,
    patterns: impl IntoIterator<Item = &'a str>,
    ctx: &RunContext,
) -> (PathSet, bool) {
    let mut set = PathSet::new();
    let mut seen = false;
    for pattern in patterns {
        let resolved = resolve(base, pattern, ctx);
        seen |= resolved.was_present();
        if let Resolved::Path(path) = resolved {
            set.insert(path);
        }
    }
    (set, seen)
}

/// Resolve include patterns; if none was given the root itself is the only
/// include root.
///
/// Patterns that were given but all failed to resolve leave the set empty
/// rather than falling back to the root.
pub fn resolve_includes<'a>(
    root: &Path,
    patterns: impl IntoIterator<Item = &'a str>,
    ctx: &RunContext,
) -> PathSet {
    let (mut includes, seen) = resolve_all(root, patterns, ctx);
    if !seen {
        includes.insert(root.to_path_buf());
    }
    includes
}
