//! # srcindex
//!
//! A CLI that selects, schedules and caches the source files of a tree for
//! a static-analysis extractor.
//!
//! ## Overview
//!
//! srcindex is built on top of srcindexlib. It ships a small built-in
//! extractor that writes one JSON record per file (type, size, line count,
//! content digest), which is enough to exercise discovery, filtering,
//! project grouping and the TRAP cache end to end.
//!
//! ## Usage
//!
//! ```bash
//! # Show which files would be extracted, and how
//! srcindex plan .
//!
//! # Only some directories, minus generated code
//! srcindex plan . --include src --include lib --exclude src/generated
//!
//! # Let a minified file back in
//! srcindex plan . --filter "include: **/vendor.min.js"
//!
//! # Extract into out/, reusing artifacts from a bounded cache
//! srcindex run . --out out --cache ~/.cache/srcindex --cache-bound 512m
//!
//! # Group TypeScript files by tsconfig.json, four workers, JSON report
//! srcindex run . --out out --typescript full --jobs 4 --output json
//! ```

mod record;
mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use outstanding::cli::{App, CommandContext, HandlerResult, Output, RunResult};
use srcindexlib::{
    ArtifactLayout, IndexOptions, Indexer, ManifestHost, RunContext, SourceType, TypeScriptMode,
};

use crate::record::RecordExtractor;
use crate::render::{create_theme, PLAN_TEMPLATE, REPORT_TEMPLATE};

/// Arguments shared by `plan` and `run`
fn source_args() -> Vec<Arg> {
    vec![
        Arg::new("path")
            .help("Source root (defaults to current directory)")
            .default_value("."),
        Arg::new("include")
            .short('i')
            .long("include")
            .action(ArgAction::Append)
            .help("Include path, relative to the source root (can be specified multiple times)"),
        Arg::new("exclude")
            .short('e')
            .long("exclude")
            .action(ArgAction::Append)
            .help("Exclude path, relative to the source root (can be specified multiple times)"),
        Arg::new("filter")
            .long("filter")
            .action(ArgAction::Append)
            .help("Glob override such as 'include: **/vendor.min.js' (last match wins)"),
        Arg::new("typescript")
            .long("typescript")
            .value_parser(["none", "basic", "full"])
            .default_value("basic")
            .help("TypeScript handling; 'full' groups files by tsconfig.json"),
        Arg::new("source-type")
            .long("source-type")
            .value_parser(["script", "module", "auto"])
            .default_value("auto")
            .help("How scripts are parsed"),
        Arg::new("encoding")
            .long("encoding")
            .help("Encoding assumed for files that do not declare one"),
        Arg::new("repository-folders")
            .long("repository-folders")
            .help("CSV of classified folders; external and metadata folders are excluded"),
    ]
}

/// Build the clap Command structure
fn build_command() -> Command {
    Command::new("srcindex")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Arthur Debert")
        .about("Select, schedule and cache source files for a static-analysis extractor")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More log output (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("No log output"),
        )
        .subcommand(
            Command::new("plan")
                .about("Discover, filter and group files without extracting them")
                .args(source_args()),
        )
        .subcommand(
            Command::new("run")
                .about("Extract every scheduled file")
                .args(source_args())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .required(true)
                        .help("Directory artifacts are written to"),
                )
                .arg(
                    Arg::new("cache")
                        .long("cache")
                        .help("TRAP cache directory"),
                )
                .arg(
                    Arg::new("cache-bound")
                        .long("cache-bound")
                        .requires("cache")
                        .help("TRAP cache size bound, e.g. 512m or 2g"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Discard artifacts of files with parse errors and fail the run"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1")
                        .help("Worker threads for per-file extraction"),
                )
                .arg(
                    Arg::new("externs")
                        .long("externs")
                        .help("Directory of *.js definitions extracted before the sources"),
                )
                .arg(
                    Arg::new("externs-cache")
                        .long("externs-cache")
                        .requires("externs")
                        .help("Pre-populated cache used read-only for externs"),
                ),
        )
}

/// Install the tracing subscriber; `RUST_LOG` wins over the flags.
fn setup_logging(matches: &ArgMatches) {
    let verbose = matches.get_count("verbose");
    if matches.get_flag("quiet") {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn get_many(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

/// Build index options from matches
fn build_options(matches: &ArgMatches) -> anyhow::Result<IndexOptions> {
    let path = matches
        .get_one::<String>("path")
        .map(|s| s.as_str())
        .unwrap_or(".");
    let mut options = IndexOptions::new(path);

    for pattern in get_many(matches, "include") {
        options = options.include(pattern);
    }
    for pattern in get_many(matches, "exclude") {
        options = options.exclude(pattern);
    }
    for line in get_many(matches, "filter") {
        options = options.filter(line);
    }

    if let Some(mode) = matches.get_one::<String>("typescript") {
        options = options.typescript(mode.parse::<TypeScriptMode>()?);
    }
    if let Some(source_type) = matches.get_one::<String>("source-type") {
        options = options.source_type(source_type.parse::<SourceType>()?);
    }
    if let Some(encoding) = matches.get_one::<String>("encoding") {
        options = options.default_encoding(encoding);
    }
    if let Some(csv) = matches.get_one::<String>("repository-folders") {
        options = options.repository_folders(csv);
    }

    // Only `run` defines the extraction flags.
    if matches.try_contains_id("out").is_ok() {
        if let Some(cache) = matches.get_one::<String>("cache") {
            options = options.trap_cache(cache);
        }
        if let Some(bound) = matches.get_one::<String>("cache-bound") {
            options = options.trap_cache_bound(bound)?;
        }
        options = options.strict(matches.get_flag("strict"));
        if let Some(jobs) = matches.get_one::<usize>("jobs") {
            options = options.jobs(*jobs);
        }
        if let Some(externs) = matches.get_one::<String>("externs") {
            let cache = matches.get_one::<String>("externs-cache").map(PathBuf::from);
            options = options.externs(externs, cache);
        }
    }

    Ok(options)
}

/// Base directory used to shorten paths in text output
fn display_base(options: &IndexOptions) -> PathBuf {
    std::fs::canonicalize(options.source_root()).unwrap_or_else(|_| options.source_root().to_path_buf())
}

/// Handler for plan command
fn plan_handler(matches: &ArgMatches, ctx: &CommandContext) -> HandlerResult<serde_json::Value> {
    setup_logging(matches);
    let options = build_options(matches)?;
    let base = display_base(&options);
    let indexer = Indexer::new(options)?;
    let run_ctx = RunContext::new();
    let plan = indexer.plan(&run_ctx)?;

    // For JSON mode, return raw data
    if ctx.output_mode.is_structured() {
        return Ok(Output::Render(serde_json::to_value(&plan)?));
    }

    let context = render::plan_context(&plan, &base);
    Ok(Output::Render(serde_json::to_value(&context)?))
}

/// Handler for run command
fn run_handler(matches: &ArgMatches, ctx: &CommandContext) -> HandlerResult<serde_json::Value> {
    setup_logging(matches);
    let options = build_options(matches)?;
    let base = display_base(&options);
    let out = matches
        .get_one::<String>("out")
        .map(Path::new)
        .context("--out is required")?;
    std::fs::create_dir_all(out).with_context(|| format!("could not create {}", out.display()))?;
    let layout = ArtifactLayout::new(std::fs::canonicalize(out)?);

    let strict = options.strict;
    let indexer = Indexer::new(options)?;
    let extractor = Arc::new(RecordExtractor);
    let mut host = ManifestHost::new(extractor.clone(), indexer.options().extractor_config());
    let run_ctx = RunContext::new();
    let report = indexer.run(extractor.as_ref(), &mut host, &layout, &run_ctx)?;

    if strict && report.failures() > 0 {
        anyhow::bail!(
            "{} of {} files failed to extract in strict mode",
            report.failures(),
            report.files.len()
        );
    }

    // For JSON mode, return raw data
    if ctx.output_mode.is_structured() {
        return Ok(Output::Render(serde_json::to_value(&report)?));
    }

    let context = render::report_context(&report, &base);
    Ok(Output::Render(serde_json::to_value(&context)?))
}

fn main() -> ExitCode {
    let cmd = build_command();
    let theme = create_theme();

    let result = App::builder()
        .theme(theme)
        .command("plan", plan_handler, PLAN_TEMPLATE)
        .command("run", run_handler, REPORT_TEMPLATE)
        .run_to_string(cmd, std::env::args());

    match result {
        RunResult::Handled(output) => {
            if output.starts_with("Error:") {
                eprintln!("{}", output.trim_end());
                return ExitCode::FAILURE;
            }
            print!("{}", output);
            ExitCode::SUCCESS
        }
        // No handler produces binary output.
        RunResult::Binary(_, _) => ExitCode::SUCCESS,
        RunResult::NoMatch(_) => {
            eprintln!("Error: unknown command");
            ExitCode::FAILURE
        }
    }
}
