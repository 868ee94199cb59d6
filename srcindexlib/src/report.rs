//! Structured results of planning and running an index.
//!
//! Both types are pure data: the CLI renders them as text or serializes
//! them to JSON.

use std::path::PathBuf;

use serde::Serialize;

use crate::context::{Diagnostic, Severity};
use crate::extract::FileStatus;
use crate::source::{CandidateFile, FileType};

/// Stage of the run that handled a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Auxiliary definitions extracted before any source
    Externs,
    /// Extracted through a project session
    Project,
    /// Extracted through the standalone session
    Standalone,
    /// Extracted on its own through the cached per-file path
    File,
}

/// Outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub file_type: FileType,
    pub phase: Phase,
    pub status: FileStatus,
}

/// Lifecycle state of a project session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    Unopened,
    Open,
    Closed,
}

/// Outcome for one project descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRun {
    pub descriptor: PathBuf,
    /// Final state; `Unopened` means the session could not be opened
    pub state: ProjectState,
    /// Members assigned to the project when grouping
    pub members: usize,
    /// Members handled by the session
    pub extracted: usize,
    /// Why the project stopped early, if it did
    pub error: Option<String>,
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileRecord>,
    pub projects: Vec<ProjectRun>,
    /// Where the merged project metadata was written
    pub metadata: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// TRAP cache lookups that found nothing
    pub cache_misses: usize,
    pub elapsed_ms: u128,
}

impl RunReport {
    /// Files handled in `phase`.
    pub fn count(&self, phase: Phase) -> usize {
        self.files.iter().filter(|f| f.phase == phase).count()
    }

    fn count_status(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }

    pub fn extracted(&self) -> usize {
        self.count_status(|s| matches!(s, FileStatus::Extracted))
    }

    pub fn cache_hits(&self) -> usize {
        self.count_status(|s| matches!(s, FileStatus::CacheHit))
    }

    pub fn violations(&self) -> usize {
        self.count_status(|s| matches!(s, FileStatus::Violation(_)))
    }

    pub fn failures(&self) -> usize {
        self.count_status(|s| matches!(s, FileStatus::Failed(_)))
    }

    pub fn vanished(&self) -> usize {
        self.count_status(|s| matches!(s, FileStatus::Vanished))
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Find the record for `path`.
    pub fn file(&self, path: &std::path::Path) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// A project and the members it would extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedProject {
    pub descriptor: PathBuf,
    pub members: Vec<PathBuf>,
}

/// The schedule of a run, computed without extracting anything.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    /// Every file that passed the walk and the filter, in walk order
    pub candidates: Vec<CandidateFile>,
    pub projects: Vec<PlannedProject>,
    /// Project-managed files no project claims
    pub standalone: Vec<PathBuf>,
    /// Files extracted one by one
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}
