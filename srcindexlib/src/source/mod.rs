//! Source discovery: find files to extract.
//!
//! This module handles the first stage of the pipeline - deciding which
//! files are candidates. It provides:
//!
//! - **Path resolution**: Turn include/exclude patterns into canonical paths
//! - **Walking**: Traverse include roots with specificity-based precedence
//! - **Classification**: Map files to extractor file types
//! - **Filtering**: A second, glob-based include/exclude gate
//!
//! ## Example
//!
//! ```rust,ignore
//! use srcindexlib::source::{resolve_includes, FilterRuleSet, PathSet, Walker};
//!
//! let includes = resolve_includes(&root, ["src", "lib"], &ctx);
//! let discovery = Walker::new(TypeScriptMode::Basic)
//!     .discover(&includes, &PathSet::new(), &ctx)?
//!     .filter(&FilterRuleSet::defaults(TypeScriptMode::Basic)?);
//! ```

pub mod filetype;
pub mod filter;
pub mod folders;
pub mod resolve;
pub mod walker;

pub use filetype::{Classifier, FileType};
pub use filter::{FilterRule, FilterRuleSet, Polarity};
pub use folders::add_classified_excludes;
pub use resolve::{canonical_root, resolve, resolve_all, resolve_includes, PathSet, Resolved};
pub use walker::{CandidateFile, Discovery, Walker, DESCRIPTOR_FILE_NAME};
