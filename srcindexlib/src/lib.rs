//! # srcindexlib
//!
//! Source discovery and extraction orchestration for a static-analysis
//! extractor.
//!
//! ## Overview
//!
//! Given a source tree, this library decides which files should be
//! analyzed, in what order and grouping, and avoids analyzing the same
//! content twice. The analysis itself is done by an [`Extractor`] supplied
//! by the caller; files that share a compiler configuration go through a
//! [`ProjectHost`] session instead.
//!
//! A run proceeds in stages:
//!
//! - **Path resolution**: include and exclude patterns become canonical
//!   paths. Unresolvable patterns are reported and skipped.
//! - **Walking**: every include root is walked on its own, so the more
//!   specific of an include and an exclude path wins.
//! - **Filtering**: a list of `include`/`exclude` globs where the last
//!   match decides.
//! - **Orchestration**: project members are extracted through one session
//!   per project, the merged project metadata is written once, leftover
//!   project-managed files go through a standalone session and everything
//!   else is extracted file by file.
//! - **Caching**: per-file results are stored in a TRAP cache keyed by
//!   file content, never by path.
//!
//! ## Example
//!
//! ```rust
//! use srcindexlib::{
//!     ArtifactLayout, ExtractError, ExtractOutcome, Extractor, ExtractorConfig, FileType,
//!     IndexOptions, Indexer, ManifestHost, Phase, RunContext,
//! };
//! use std::fs;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tempfile::tempdir;
//!
//! struct CopyExtractor;
//!
//! impl Extractor for CopyExtractor {
//!     fn extract(
//!         &self,
//!         file: &Path,
//!         _file_type: FileType,
//!         _config: &ExtractorConfig,
//!         out: &Path,
//!     ) -> Result<ExtractOutcome, ExtractError> {
//!         fs::copy(file, out)?;
//!         Ok(ExtractOutcome::Extracted)
//!     }
//! }
//!
//! let dir = tempdir().unwrap();
//! let src = dir.path().join("src");
//! fs::create_dir_all(src.join("vendor")).unwrap();
//! fs::write(src.join("app.js"), "main();\n").unwrap();
//! fs::write(src.join("vendor/lib.min.js"), "x()").unwrap();
//!
//! // Plan a run: minified files are filtered out by default
//! let indexer = Indexer::new(IndexOptions::new(&src)).unwrap();
//! let plan = indexer.plan(&RunContext::new()).unwrap();
//! assert_eq!(plan.candidates.len(), 1);
//!
//! // Run it, caching artifacts
//! let options = IndexOptions::new(&src).trap_cache(dir.path().join("cache"));
//! let indexer = Indexer::new(options).unwrap();
//! let layout = ArtifactLayout::new(dir.path().join("out"));
//! let mut host = ManifestHost::new(Arc::new(CopyExtractor), ExtractorConfig::new());
//! let report = indexer
//!     .run(&CopyExtractor, &mut host, &layout, &RunContext::new())
//!     .unwrap();
//! assert_eq!(report.count(Phase::File), 1);
//! ```

pub mod cache;
pub mod context;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod options;
pub mod orchestrate;
pub mod pipeline;
pub mod project;
pub mod report;
pub mod source;

pub use cache::{DirectoryCache, NullCache, ReadOnlyCache, TrapCache, TrapCacheKey, ENGINE_VERSION};
pub use context::{Diagnostic, RunContext, Severity};
pub use error::IndexError;
pub use extract::{ArtifactLayout, ExtractError, ExtractOutcome, Extractor, FileExtractor, FileStatus};
pub use ledger::ExtractionLedger;
pub use options::{parse_size_bound, ExtractorConfig, IndexOptions, SourceType, TypeScriptMode};
pub use orchestrate::{group, Grouping, Orchestration, Orchestrator, ProjectGroup};
pub use pipeline::Indexer;
pub use project::{
    ManifestHost, MetadataTable, ProjectDescriptor, ProjectHost, ProjectSession, SessionError,
};
pub use report::{FileRecord, Phase, Plan, PlannedProject, ProjectRun, ProjectState, RunReport};
pub use source::{CandidateFile, Classifier, Discovery, FileType, FilterRuleSet, PathSet, Walker};

/// Result type for srcindexlib operations
pub type Result<T> = std::result::Result<T, IndexError>;
