//! Multi-phase extraction of a candidate set.
//!
//! The phases run in a fixed order:
//!
//! 1. **Projects**: each project descriptor gets one session; its members
//!    are extracted through it one at a time, then the session is closed.
//! 2. **Metadata**: if any project was opened, the metadata merged from
//!    all sessions is written once.
//! 3. **Standalone**: project-managed files that no project handled are
//!    extracted through a single standalone session. The host is then shut
//!    down.
//! 4. **Files**: everything still unextracted goes through the cached
//!    per-file path, optionally on a thread pool.
//!
//! Every file passes through the [`ExtractionLedger`] first, so a file is
//! extracted at most once however the phases overlap.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::context::RunContext;
use crate::error::IndexError;
use crate::extract::{Attempt, FileExtractor, FileStatus};
use crate::ledger::ExtractionLedger;
use crate::project::{ProjectDescriptor, ProjectHost, ProjectSession};
use crate::report::{FileRecord, Phase, PlannedProject, ProjectRun, ProjectState};
use crate::source::{CandidateFile, FileType};
use crate::Result;

/// A project and the candidates it claims.
#[derive(Debug, Clone)]
pub struct ProjectGroup {
    pub descriptor: ProjectDescriptor,
    pub members: Vec<CandidateFile>,
}

/// Candidates split by the phase expected to handle them.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Projects with at least one member, in descriptor order
    pub projects: Vec<ProjectGroup>,
    /// Project-managed candidates no project claims
    pub standalone: Vec<CandidateFile>,
    /// Everything else
    pub files: Vec<CandidateFile>,
    /// Descriptors that were found, loadable or not
    pub descriptors_found: usize,
}

impl Grouping {
    /// Whether any work needs a project host.
    pub fn needs_host(&self) -> bool {
        self.descriptors_found > 0 || !self.projects.is_empty() || !self.standalone.is_empty()
    }

    pub fn planned_projects(&self) -> Vec<PlannedProject> {
        self.projects
            .iter()
            .map(|p| PlannedProject {
                descriptor: p.descriptor.path().to_path_buf(),
                members: p.members.iter().map(|m| m.path.clone()).collect(),
            })
            .collect()
    }
}

/// Assign candidates to projects.
///
/// A candidate belongs to the first descriptor that declares it.
/// Descriptors that cannot be loaded are reported and ignored.
pub fn group(candidates: &[CandidateFile], descriptors: &[PathBuf], ctx: &RunContext) -> Grouping {
    let loaded: Vec<ProjectDescriptor> = descriptors
        .iter()
        .filter_map(|path| match ProjectDescriptor::load(path) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                ctx.warn(Some(path), format!("Ignoring project {}: {}", path.display(), e));
                None
            }
        })
        .collect();

    let mut members: Vec<Vec<CandidateFile>> = vec![Vec::new(); loaded.len()];
    let mut grouping = Grouping {
        descriptors_found: descriptors.len(),
        ..Default::default()
    };

    for candidate in candidates {
        let owner = loaded
            .iter()
            .position(|d| d.declares(&candidate.path, candidate.file_type));
        match owner {
            Some(index) => members[index].push(candidate.clone()),
            None if candidate.file_type.is_project_managed() => {
                grouping.standalone.push(candidate.clone())
            }
            None => grouping.files.push(candidate.clone()),
        }
    }

    for (descriptor, members) in loaded.into_iter().zip(members) {
        if members.is_empty() {
            tracing::debug!("project {} has no members", descriptor.path().display());
            continue;
        }
        grouping.projects.push(ProjectGroup { descriptor, members });
    }
    grouping
}

/// What the orchestrator did.
#[derive(Debug, Default)]
pub struct Orchestration {
    pub files: Vec<FileRecord>,
    pub projects: Vec<ProjectRun>,
    /// Where the merged metadata was written, if any project was opened
    pub metadata: Option<PathBuf>,
}

/// Drives a [`Grouping`] through the extraction phases.
pub struct Orchestrator<'a, 'f, H: ProjectHost> {
    host: &'a mut H,
    files: &'a FileExtractor<'f>,
    cache_sessions: bool,
    jobs: usize,
}

impl<'a, 'f, H: ProjectHost> Orchestrator<'a, 'f, H> {
    pub fn new(host: &'a mut H, files: &'a FileExtractor<'f>) -> Self {
        Self {
            host,
            files,
            cache_sessions: false,
            jobs: 1,
        }
    }

    /// Whether session output may be served from the TRAP cache.
    ///
    /// Only safe when a session's output for a file does not depend on the
    /// other files of the session.
    pub fn cache_sessions(mut self, cache_sessions: bool) -> Self {
        self.cache_sessions = cache_sessions;
        self
    }

    /// Worker threads for the per-file phase.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Run every phase over `grouping`.
    pub fn run(
        mut self,
        grouping: Grouping,
        ledger: &mut ExtractionLedger,
        ctx: &RunContext,
    ) -> Result<Orchestration> {
        let mut done = Orchestration::default();
        let needs_host = grouping.needs_host();
        let Grouping {
            projects,
            standalone,
            files,
            ..
        } = grouping;

        if needs_host {
            self.host.verify_installation()?;
        }

        // The host is shut down even when a session phase fails.
        let hosted = self.run_hosted(&projects, standalone, ledger, ctx, &mut done);
        if needs_host {
            self.host.shutdown();
        }
        let (batch, rest) = hosted?;

        let remaining: Vec<CandidateFile> = batch
            .into_iter()
            .chain(rest)
            .chain(files)
            .filter(|c| ledger.insert(&c.path))
            .collect();
        done.files.extend(self.run_files(&remaining, ctx)?);
        Ok(done)
    }

    /// Project, metadata and standalone phases. Returns the project-managed
    /// files left for the standalone batch and the other leftovers, both
    /// still unclaimed in the ledger.
    fn run_hosted(
        &mut self,
        projects: &[ProjectGroup],
        standalone: Vec<CandidateFile>,
        ledger: &mut ExtractionLedger,
        ctx: &RunContext,
        done: &mut Orchestration,
    ) -> Result<(Vec<CandidateFile>, Vec<CandidateFile>)> {
        let mut first_opened: Option<PathBuf> = None;
        let mut fallen_through: Vec<CandidateFile> = Vec::new();
        for project in projects {
            let run = self.run_project(project, ledger, ctx, &mut done.files)?;
            if run.state != ProjectState::Unopened && first_opened.is_none() {
                first_opened = Some(project.descriptor.path().to_path_buf());
            }
            fallen_through.extend(
                project
                    .members
                    .iter()
                    .filter(|m| !ledger.contains(&m.path))
                    .cloned(),
            );
            done.projects.push(run);
        }

        if let Some(descriptor) = first_opened {
            done.metadata = Some(self.flush_metadata(&descriptor)?);
        }

        // Members of failed projects join the standalone batch if the
        // standalone session can take them, the per-file phase otherwise.
        let mut rest: Vec<CandidateFile> = Vec::new();
        let mut batch: Vec<CandidateFile> = Vec::new();
        for candidate in fallen_through.into_iter().chain(standalone) {
            if candidate.file_type.is_project_managed() {
                batch.push(candidate);
            } else {
                rest.push(candidate);
            }
        }
        if !batch.is_empty() {
            self.run_standalone(&batch, ledger, ctx, &mut done.files)?;
        }
        Ok((batch, rest))
    }

    /// Open one project, extract its members through the session and close
    /// it again.
    fn run_project(
        &mut self,
        project: &ProjectGroup,
        ledger: &mut ExtractionLedger,
        ctx: &RunContext,
        records: &mut Vec<FileRecord>,
    ) -> Result<ProjectRun> {
        let path = project.descriptor.path();
        let mut run = ProjectRun {
            descriptor: path.to_path_buf(),
            state: ProjectState::Unopened,
            members: project.members.len(),
            extracted: 0,
            error: None,
        };

        let step = ctx.begin(format!("Opening project {}", path.display()));
        let mut session = match self.host.open(&project.descriptor) {
            Ok(session) => session,
            Err(e) => {
                ctx.warn(Some(path), format!("Could not open project {}: {}", path.display(), e));
                run.error = Some(e.to_string());
                return Ok(run);
            }
        };
        step.end();
        run.state = ProjectState::Open;

        let mut fatal = None;
        for member in &project.members {
            if ledger.contains(&member.path) {
                continue;
            }
            match self.session_extract(&mut session, member, ctx) {
                Ok(Attempt::Done(status)) => {
                    ledger.insert(&member.path);
                    run.extracted += 1;
                    records.push(record(member, Phase::Project, status));
                }
                Ok(Attempt::Lost(message)) => {
                    ctx.warn(
                        Some(path),
                        format!("Lost session for project {}: {}", path.display(), message),
                    );
                    run.error = Some(message);
                    break;
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.host.close(session) {
            ctx.warn(Some(path), format!("Could not close project {}: {}", path.display(), e));
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        run.state = ProjectState::Closed;
        tracing::info!(
            "closed project {} ({} of {} members)",
            path.display(),
            run.extracted,
            run.members
        );
        Ok(run)
    }

    fn flush_metadata(&mut self, descriptor: &Path) -> Result<PathBuf> {
        let table = self.host.merged_metadata()?;
        let layout = self.files.layout();
        let out = layout.metadata_path(descriptor);
        layout.prepare(&out)?;
        table.write_to(&out)?;
        tracing::info!("wrote metadata for {} entries to {}", table.len(), out.display());
        Ok(out)
    }

    fn run_standalone(
        &mut self,
        batch: &[CandidateFile],
        ledger: &mut ExtractionLedger,
        ctx: &RunContext,
        records: &mut Vec<FileRecord>,
    ) -> Result<()> {
        let paths: Vec<PathBuf> = batch.iter().map(|c| c.path.clone()).collect();
        let mut session = match self.host.open_standalone(&paths) {
            Ok(session) => session,
            Err(e) => {
                ctx.warn(None, format!("Could not open standalone session: {e}"));
                return Ok(());
            }
        };

        let mut fatal = None;
        for candidate in batch {
            if ledger.contains(&candidate.path) {
                continue;
            }
            match self.session_extract(&mut session, candidate, ctx) {
                Ok(Attempt::Done(status)) => {
                    ledger.insert(&candidate.path);
                    records.push(record(candidate, Phase::Standalone, status));
                }
                Ok(Attempt::Lost(message)) => {
                    ctx.warn(None, format!("Lost standalone session: {message}"));
                    break;
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.host.close(session) {
            ctx.warn(None, format!("Could not close standalone session: {e}"));
        }
        fatal.map_or(Ok(()), Err)
    }

    fn session_extract(
        &self,
        session: &mut H::Session,
        candidate: &CandidateFile,
        ctx: &RunContext,
    ) -> Result<Attempt> {
        let file = candidate.path.as_path();
        let file_type: FileType = candidate.file_type;
        self.files
            .extract_with(file, file_type, self.cache_sessions, ctx, |out| {
                session.extract(file, file_type, out)
            })
    }

    /// Extract already-claimed files one by one, in parallel when more
    /// than one job is configured. Records keep the input order.
    fn run_files(&self, files: &[CandidateFile], ctx: &RunContext) -> Result<Vec<FileRecord>> {
        let extractor = self.files;
        let extract = |c: &CandidateFile| -> Result<FileRecord> {
            let status = extractor.extract(&c.path, c.file_type, ctx)?;
            Ok(record(c, Phase::File, status))
        };

        if self.jobs <= 1 || files.len() <= 1 {
            return files.iter().map(extract).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| IndexError::Config(format!("could not start {} workers: {e}", self.jobs)))?;
        pool.install(|| files.par_iter().map(extract).collect())
    }
}

fn record(candidate: &CandidateFile, phase: Phase, status: FileStatus) -> FileRecord {
    FileRecord {
        path: candidate.path.clone(),
        file_type: candidate.file_type,
        phase,
        status,
    }
}
