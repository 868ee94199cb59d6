//! Input options for discovery and extraction runs.
//!
//! This module contains all configuration types that control which files
//! are selected, how they are extracted, and where results are cached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::IndexError;
use crate::Result;

/// How compiler-managed TypeScript projects are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeScriptMode {
    /// TypeScript files are neither selected nor extracted
    None,
    /// TypeScript files are extracted through standalone sessions
    #[default]
    Basic,
    /// `tsconfig.json` projects are opened and extracted with type information
    Full,
}

impl TypeScriptMode {
    const NAMES: [&'static str; 3] = ["none", "basic", "full"];
}

impl fmt::Display for TypeScriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeScriptMode::None => "none",
            TypeScriptMode::Basic => "basic",
            TypeScriptMode::Full => "full",
        };
        f.write_str(name)
    }
}

impl FromStr for TypeScriptMode {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(TypeScriptMode::None),
            "basic" => Ok(TypeScriptMode::Basic),
            "full" => Ok(TypeScriptMode::Full),
            _ => Err(IndexError::Config(format!(
                "TypeScript mode must be set to one of: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// How JavaScript sources are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Script,
    Module,
    #[default]
    Auto,
}

impl FromStr for SourceType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "script" => Ok(SourceType::Script),
            "module" => Ok(SourceType::Module),
            "auto" => Ok(SourceType::Auto),
            _ => Err(IndexError::Config(format!(
                "{} is not a valid source type",
                s.trim()
            ))),
        }
    }
}

/// Settings handed to the extractor for every file.
///
/// The serialized form of this struct is part of the TRAP cache key, so it
/// must not carry anything path-specific.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Is this code extracted as externs definitions?
    pub externs: bool,
    /// How scripts are parsed
    pub source_type: SourceType,
    /// TypeScript handling
    pub typescript: TypeScriptMode,
    /// Encoding used when a file does not declare one
    pub default_encoding: String,
    /// Report parse errors as violations instead of aborting the file
    pub tolerate_parse_errors: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            externs: false,
            source_type: SourceType::Auto,
            typescript: TypeScriptMode::None,
            default_encoding: "UTF-8".to_string(),
            tolerate_parse_errors: true,
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_externs(mut self, externs: bool) -> Self {
        self.externs = externs;
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_typescript(mut self, mode: TypeScriptMode) -> Self {
        self.typescript = mode;
        self
    }

    pub fn with_default_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.default_encoding = encoding.into();
        self
    }

    pub fn with_tolerate_parse_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_parse_errors = tolerate;
        self
    }

    /// Stable byte representation used when composing cache keys.
    pub fn cache_fingerprint(&self) -> Vec<u8> {
        // Field order is fixed by the struct definition, so this is stable.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Options for a full discovery and extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Source root; relative include/exclude patterns and filter overrides
    /// are resolved against it
    pub source_root: PathBuf,
    /// Include path patterns (empty = the source root itself)
    pub include: Vec<String>,
    /// Exclude path patterns
    pub exclude: Vec<String>,
    /// `include:`/`exclude:` glob overrides, appended after the defaults
    pub filters: Vec<String>,
    /// TypeScript handling
    pub typescript: TypeScriptMode,
    /// How scripts are parsed
    pub source_type: SourceType,
    /// Encoding used when a file does not declare one
    pub default_encoding: Option<String>,
    /// Location of the read-write TRAP cache
    pub trap_cache: Option<PathBuf>,
    /// Size bound of the TRAP cache in bytes
    pub trap_cache_bound: Option<u64>,
    /// Discard artifacts of files with parse errors instead of keeping them
    pub strict: bool,
    /// Worker threads for the per-file phase (1 = sequential)
    pub jobs: usize,
    /// Directory of auxiliary `*.js` definitions extracted before sources
    pub externs_dir: Option<PathBuf>,
    /// Pre-populated cache used read-only for externs
    pub externs_cache: Option<PathBuf>,
    /// CSV classifying repository folders; `external` and `metadata`
    /// folders become exclude paths
    pub repository_folders: Option<PathBuf>,
}

impl IndexOptions {
    /// Create default options rooted at `source_root`.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            filters: Vec::new(),
            typescript: TypeScriptMode::default(),
            source_type: SourceType::default(),
            default_encoding: None,
            trap_cache: None,
            trap_cache_bound: None,
            strict: false,
            jobs: 1,
            externs_dir: None,
            externs_cache: None,
            repository_folders: None,
        }
    }

    /// Add an include path pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Add an exclude path pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Add a filter override line such as `include: **/vendor.min.js`.
    pub fn filter(mut self, line: impl Into<String>) -> Self {
        self.filters.push(line.into());
        self
    }

    /// Add every line of a newline-separated pattern list.
    pub fn include_lines(mut self, text: &str) -> Self {
        self.include.extend(text.lines().map(str::to_string));
        self
    }

    /// Add every line of a newline-separated pattern list.
    pub fn exclude_lines(mut self, text: &str) -> Self {
        self.exclude.extend(text.lines().map(str::to_string));
        self
    }

    /// Add every line of a newline-separated filter list.
    pub fn filter_lines(mut self, text: &str) -> Self {
        self.filters.extend(text.lines().map(str::to_string));
        self
    }

    pub fn typescript(mut self, mode: TypeScriptMode) -> Self {
        self.typescript = mode;
        self
    }

    pub fn source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn default_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.default_encoding = Some(encoding.into());
        self
    }

    pub fn trap_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trap_cache = Some(dir.into());
        self
    }

    /// Set the cache size bound from text like `512m` or `2g`.
    pub fn trap_cache_bound(mut self, bound: &str) -> Result<Self> {
        self.trap_cache_bound = Some(parse_size_bound(bound)?);
        Ok(self)
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn externs(mut self, dir: impl Into<PathBuf>, cache: Option<PathBuf>) -> Self {
        self.externs_dir = Some(dir.into());
        self.externs_cache = cache;
        self
    }

    pub fn repository_folders(mut self, csv: impl Into<PathBuf>) -> Self {
        self.repository_folders = Some(csv.into());
        self
    }

    /// Check for contradictory settings before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(IndexError::Config("jobs must be at least 1".to_string()));
        }
        if let Some(encoding) = &self.default_encoding {
            if encoding.trim().is_empty() {
                return Err(IndexError::Config(
                    "default encoding must not be empty".to_string(),
                ));
            }
        }
        if self.trap_cache_bound.is_some() && self.trap_cache.is_none() {
            return Err(IndexError::Config(
                "a TRAP cache size bound requires a TRAP cache location".to_string(),
            ));
        }
        Ok(())
    }

    /// The extractor configuration for source files.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let mut config = ExtractorConfig::new()
            .with_source_type(self.source_type)
            .with_typescript(self.typescript)
            .with_tolerate_parse_errors(!self.strict);
        if let Some(encoding) = &self.default_encoding {
            config = config.with_default_encoding(encoding.trim());
        }
        config
    }

    /// The extractor configuration for externs.
    pub fn externs_config(&self) -> ExtractorConfig {
        ExtractorConfig::new().with_externs(true)
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}

/// Parse a cache size bound: a byte count with an optional `k`, `m` or `g`
/// suffix (binary multiples).
pub fn parse_size_bound(text: &str) -> Result<u64> {
    let invalid = || IndexError::Config(format!("invalid TRAP cache size bound: {text}"));
    let trimmed = text.trim();
    let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&trimmed[..trimmed.len() - 1], 1u64 << 10),
        Some('m') => (&trimmed[..trimmed.len() - 1], 1u64 << 20),
        Some('g') => (&trimmed[..trimmed.len() - 1], 1u64 << 30),
        Some(_) => (trimmed, 1),
        None => return Err(invalid()),
    };
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}
