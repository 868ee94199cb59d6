//! Entry point tying discovery, caching and orchestration together.
//!
//! An [`Indexer`] is built from validated [`IndexOptions`] and can either
//! [`plan`](Indexer::plan) a run (discover, filter and group without
//! extracting anything) or [`run`](Indexer::run) it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::cache::{DirectoryCache, NullCache, ReadOnlyCache, TrapCache};
use crate::context::RunContext;
use crate::error::IndexError;
use crate::extract::{ArtifactLayout, Extractor, FileExtractor};
use crate::ledger::ExtractionLedger;
use crate::options::{IndexOptions, TypeScriptMode};
use crate::orchestrate::{group, Orchestrator};
use crate::project::ProjectHost;
use crate::report::{FileRecord, Phase, Plan, RunReport};
use crate::source::{
    add_classified_excludes, canonical_root, resolve_all, resolve_includes, Discovery,
    FileType, FilterRuleSet, Walker,
};
use crate::Result;

/// Runs discovery and extraction for one set of options.
#[derive(Debug, Clone)]
pub struct Indexer {
    options: IndexOptions,
}

impl Indexer {
    /// Validate `options`; contradictions are reported before any work.
    pub fn new(options: IndexOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Resolve paths, walk the include roots and apply the glob filter.
    pub fn discover(&self, ctx: &RunContext) -> Result<Discovery> {
        let options = &self.options;
        if !options.source_root.exists() {
            return Err(IndexError::PathNotFound(options.source_root.clone()));
        }
        let root = canonical_root(&options.source_root)?;

        let includes = resolve_includes(&root, options.include.iter().map(String::as_str), ctx);
        let (mut excludes, _) = resolve_all(&root, options.exclude.iter().map(String::as_str), ctx);
        if let Some(csv) = &options.repository_folders {
            add_classified_excludes(csv, &mut excludes, ctx)?;
        }

        let rules = FilterRuleSet::defaults(options.typescript)?
            .with_overrides(&root, options.filters.iter().map(String::as_str))?;

        let step = ctx.begin(format!("Discovering files under {}", root.display()));
        let discovery = Walker::new(options.typescript)
            .discover(&includes, &excludes, ctx)?
            .filter(&rules);
        step.end();
        tracing::info!(
            "found {} files and {} project descriptors",
            discovery.candidates.len(),
            discovery.descriptors.len()
        );
        Ok(discovery)
    }

    /// Compute the schedule of a run without extracting anything.
    pub fn plan(&self, ctx: &RunContext) -> Result<Plan> {
        let discovery = self.discover(ctx)?;
        let grouping = group(&discovery.candidates, &discovery.descriptors, ctx);
        let paths = |files: &[crate::source::CandidateFile]| -> Vec<PathBuf> {
            files.iter().map(|c| c.path.clone()).collect()
        };
        Ok(Plan {
            projects: grouping.planned_projects(),
            standalone: paths(&grouping.standalone),
            files: paths(&grouping.files),
            candidates: discovery.candidates,
            diagnostics: ctx.diagnostics(),
        })
    }

    /// Discover and extract everything, writing artifacts below `layout`.
    pub fn run<H: ProjectHost>(
        &self,
        extractor: &dyn Extractor,
        host: &mut H,
        layout: &ArtifactLayout,
        ctx: &RunContext,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let options = &self.options;
        let discovery = self.discover(ctx)?;

        let directory;
        let cache: &dyn TrapCache = match &options.trap_cache {
            Some(dir) => {
                directory = DirectoryCache::open(dir, options.trap_cache_bound)?;
                &directory
            }
            None => &NullCache,
        };

        let mut ledger = ExtractionLedger::new();
        let mut report = RunReport {
            files: self.run_externs(extractor, cache, layout, &mut ledger, ctx)?,
            ..Default::default()
        };

        let grouping = group(&discovery.candidates, &discovery.descriptors, ctx);
        let files = FileExtractor::new(extractor, cache, layout, options.extractor_config());
        let done = Orchestrator::new(host, &files)
            .cache_sessions(options.typescript != TypeScriptMode::Full)
            .jobs(options.jobs)
            .run(grouping, &mut ledger, ctx)?;

        report.files.extend(done.files);
        report.projects = done.projects;
        report.metadata = done.metadata;
        report.diagnostics = ctx.diagnostics();
        report.cache_misses = ctx.cache_misses();
        report.elapsed_ms = started.elapsed().as_millis();
        tracing::info!(
            "extracted {} files ({} from cache) in {} ms",
            report.files.len(),
            report.cache_hits(),
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Extract every `*.js` file under the externs directory.
    ///
    /// The primary cache is used if one is configured; otherwise a
    /// pre-populated externs cache is consulted read-only.
    fn run_externs(
        &self,
        extractor: &dyn Extractor,
        primary: &dyn TrapCache,
        layout: &ArtifactLayout,
        ledger: &mut ExtractionLedger,
        ctx: &RunContext,
    ) -> Result<Vec<FileRecord>> {
        let Some(dir) = &self.options.externs_dir else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            ctx.warn(
                Some(dir),
                format!("Skipping externs directory {}, which does not exist.", dir.display()),
            );
            return Ok(Vec::new());
        }

        let readonly;
        let cache: &dyn TrapCache = if primary.is_enabled() {
            primary
        } else {
            match self.options.externs_cache.as_deref().filter(|d| d.is_dir()) {
                Some(cache_dir) => {
                    readonly = ReadOnlyCache::new(DirectoryCache::open(cache_dir, None)?, "externs");
                    &readonly
                }
                None => {
                    ctx.warn(None, "No externs trap cache found");
                    &NullCache
                }
            }
        };

        let files = FileExtractor::new(extractor, cache, layout, self.options.externs_config());
        let step = ctx.begin(format!("Extracting externs from {}", dir.display()));
        let mut records = Vec::new();
        for path in extern_files(dir, ctx) {
            if !ledger.insert(&path) {
                continue;
            }
            let status = files.extract(&path, FileType::Js, ctx)?;
            records.push(FileRecord {
                path,
                file_type: FileType::Js,
                phase: Phase::Externs,
                status,
            });
        }
        step.end();
        Ok(records)
    }
}

fn extern_files(dir: &Path, ctx: &RunContext) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                ctx.warn(err.path(), format!("Skipping unreadable entry: {err}"));
                None
            }
        })
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "js"))
        .map(|e| e.into_path())
        .collect()
}
