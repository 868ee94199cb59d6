//! Compiler-managed project groups.
//!
//! A [`ProjectDescriptor`] (a `tsconfig.json`) declares which source files
//! share one compiler configuration. Those files are extracted through a
//! [`ProjectSession`] opened by a [`ProjectHost`]: opening is expensive, so a
//! session is reused for every member, and the session is stateful, so
//! members are extracted one at a time through a `&mut` handle.

pub mod manifest;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::extract::{ExtractError, ExtractOutcome};
use crate::source::FileType;
use crate::Result;

pub use manifest::ManifestHost;

/// Directories a project excludes when it does not say otherwise.
const DEFAULT_EXCLUDES: [&str; 3] = ["node_modules", "bower_components", "jspm_packages"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    #[serde(default)]
    allow_js: bool,
}

/// A parsed `tsconfig.json`.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    path: PathBuf,
    dir: PathBuf,
    files: Vec<PathBuf>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    allow_js: bool,
}

impl ProjectDescriptor {
    /// Read and parse the descriptor at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IndexError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse descriptor `text` as if it were located at `path`.
    ///
    /// Comments and trailing commas are accepted, as the compiler does.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let invalid = |message: String| IndexError::Descriptor {
            path: path.to_path_buf(),
            message,
        };
        let raw: RawDescriptor = json5::from_str(text).map_err(|e| invalid(e.to_string()))?;
        let dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();

        let files = raw
            .files
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|f| normalize_lexically(&dir.join(f)))
            .collect();

        let include = match (&raw.include, &raw.files) {
            (Some(include), _) => include.clone(),
            (None, Some(_)) => Vec::new(),
            (None, None) => vec!["**/*".to_string()],
        };
        let exclude = raw
            .exclude
            .clone()
            .unwrap_or_else(|| DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect());

        let compile = |specs: &[String]| -> Result<Vec<Pattern>> {
            specs
                .iter()
                .map(|spec| {
                    let glob = expand_spec(spec);
                    Pattern::new(&glob).map_err(|e| IndexError::InvalidGlob {
                        pattern: spec.clone(),
                        message: e.to_string(),
                    })
                })
                .collect()
        };

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            files,
            include: compile(&include)?,
            exclude: compile(&exclude)?,
            allow_js: raw.compiler_options.allow_js,
        })
    }

    /// Path of the descriptor file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the descriptor's relative specs are resolved against.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn allows_js(&self) -> bool {
        self.allow_js
    }

    /// Whether this project declares `file` as a source member.
    pub fn declares(&self, file: &Path, file_type: FileType) -> bool {
        let eligible = match file_type {
            FileType::TypeScript => true,
            FileType::Js => self.allow_js,
            _ => false,
        };
        if !eligible {
            return false;
        }
        if self.files.iter().any(|f| f == file) {
            return true;
        }
        let Ok(relative) = file.strip_prefix(&self.dir) else {
            return false;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.include
            .iter()
            .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
            && !self
                .exclude
                .iter()
                .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
    }
}

/// A spec naming a directory covers everything below it.
fn expand_spec(spec: &str) -> String {
    let spec = spec.trim().trim_start_matches("./").trim_end_matches('/');
    let last = spec.rsplit('/').next().unwrap_or(spec);
    let has_wildcard = spec.contains(['*', '?', '[']);
    if spec.is_empty() || spec == "." {
        "**/*".to_string()
    } else if has_wildcard || last.contains('.') {
        spec.to_string()
    } else {
        format!("{spec}/**/*")
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Cross-project metadata accumulated by sessions and flushed once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataTable {
    entries: BTreeMap<String, serde_json::Value>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the table as pretty JSON to `out`.
    pub fn write_to(&self, out: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(out, bytes).map_err(|e| {
            IndexError::resource(format!("could not write metadata {}", out.display()), e)
        })
    }
}

/// A live compiler session for one project (or one standalone batch).
pub trait ProjectSession {
    /// Extract one member into `out`.
    ///
    /// [`ExtractError`] fails only this member; [`SessionError::Lost`]
    /// means the session itself died and no further members can be
    /// extracted through it.
    fn extract(
        &mut self,
        file: &Path,
        file_type: FileType,
        out: &Path,
    ) -> std::result::Result<ExtractOutcome, SessionError>;
}

/// Failure of a session-backed extraction.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    File(#[from] ExtractError),

    #[error("session lost: {0}")]
    Lost(String),
}

/// Owner of the compiler process that backs project sessions.
pub trait ProjectHost {
    type Session: ProjectSession;

    /// Check that the compiler is available. Called once, before any
    /// session is opened, and only if project-managed files exist.
    fn verify_installation(&mut self) -> Result<()> {
        Ok(())
    }

    /// Open a session for `descriptor`.
    fn open(&mut self, descriptor: &ProjectDescriptor) -> Result<Self::Session>;

    /// Open a lighter-weight session for files no project claims.
    fn open_standalone(&mut self, files: &[PathBuf]) -> Result<Self::Session>;

    /// Release a session; its metadata contributions join the shared table.
    fn close(&mut self, session: Self::Session) -> Result<()>;

    /// The table merged from every closed session.
    fn merged_metadata(&mut self) -> Result<MetadataTable>;

    /// Terminate the compiler process, if any.
    fn shutdown(&mut self);
}
