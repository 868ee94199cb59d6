//! Template contexts for CLI output using outstanding

use std::path::Path;

use console::Style;
use outstanding::Theme;
use serde::Serialize;
use srcindexlib::{FileStatus, Phase, Plan, ProjectState, RunReport, Severity};

/// Include templates at compile time
pub const PLAN_TEMPLATE: &str = include_str!("../templates/plan.jinja");
pub const REPORT_TEMPLATE: &str = include_str!("../templates/report.jinja");

const NAME_WIDTH: usize = 60;
const CELL_WIDTH: usize = 12;

/// A titled list of paths in the plan
#[derive(Debug, Serialize)]
struct PlanSection {
    title: String,
    /// Pre-indented entries
    entries: Vec<String>,
}

/// Warning and error counts, only present when one is non-zero
#[derive(Debug, Serialize)]
struct DiagnosticCounts {
    warnings: String,
    errors: String,
}

/// Data context for the plan template
#[derive(Debug, Serialize)]
pub struct PlanContext {
    sections: Vec<PlanSection>,
    separator: String,
    total: String,
    diagnostics: Option<DiagnosticCounts>,
}

/// Row data for the report template (pre-formatted)
#[derive(Debug, Serialize)]
struct ReportRow {
    /// Pre-padded name (left-aligned, padded to NAME_WIDTH)
    name: String,
    /// Pre-padded phase (right-aligned, padded to CELL_WIDTH)
    phase: String,
    status: String,
    /// Theme entry the status is styled with
    status_style: &'static str,
}

/// Data context for the report template
#[derive(Debug, Serialize)]
pub struct ReportContext {
    header: String,
    separator: String,
    rows: Vec<ReportRow>,
    projects: Vec<String>,
    metadata: Option<String>,
    total: String,
    diagnostics: Option<DiagnosticCounts>,
}

/// Truncate a name to fit within max_len, adding ".." prefix if needed
fn truncate_name(name: &str, max_len: usize) -> String {
    let count = name.chars().count();
    if count > max_len {
        let tail: String = name.chars().skip(count - max_len + 2).collect();
        format!("..{tail}")
    } else {
        name.to_string()
    }
}

/// Convert a path to a relative path from the base directory
fn make_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Externs => "externs",
        Phase::Project => "project",
        Phase::Standalone => "standalone",
        Phase::File => "file",
    }
}

/// Status word, which doubles as its theme entry
fn status_name(status: &FileStatus) -> &'static str {
    match status {
        FileStatus::Extracted => "extracted",
        FileStatus::CacheHit => "cached",
        FileStatus::Violation(_) => "violation",
        FileStatus::Failed(_) => "failed",
        FileStatus::Vanished => "vanished",
    }
}

fn diagnostic_counts(warnings: usize, errors: usize) -> Option<DiagnosticCounts> {
    (warnings > 0 || errors > 0).then(|| DiagnosticCounts {
        warnings: warnings.to_string(),
        errors: errors.to_string(),
    })
}

fn section(title: String, entries: Vec<String>) -> PlanSection {
    PlanSection { title, entries }
}

/// Build the template context for the schedule of a run.
pub fn plan_context(plan: &Plan, base: &Path) -> PlanContext {
    let mut sections = Vec::new();

    if !plan.projects.is_empty() {
        let mut entries = Vec::new();
        for project in &plan.projects {
            entries.push(format!(
                "  {} ({} members)",
                make_relative(&project.descriptor, base),
                project.members.len()
            ));
            entries.extend(
                project
                    .members
                    .iter()
                    .map(|m| format!("    {}", make_relative(m, base))),
            );
        }
        sections.push(section("Projects".to_string(), entries));
    }

    let listed = |paths: &[std::path::PathBuf]| -> Vec<String> {
        paths
            .iter()
            .map(|p| format!("  {}", make_relative(p, base)))
            .collect()
    };
    if !plan.standalone.is_empty() {
        sections.push(section(
            format!("Standalone ({} files)", plan.standalone.len()),
            listed(&plan.standalone),
        ));
    }
    if !plan.files.is_empty() {
        sections.push(section(
            format!("Files ({} files)", plan.files.len()),
            listed(&plan.files),
        ));
    }

    let warnings = plan
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count();

    PlanContext {
        sections,
        separator: "-".repeat(NAME_WIDTH),
        total: format!("Total ({} files)", plan.candidates.len()),
        diagnostics: diagnostic_counts(warnings, 0),
    }
}

/// Build the template context for a finished run: a table of files
/// followed by projects and totals.
pub fn report_context(report: &RunReport, base: &Path) -> ReportContext {
    let rows = report
        .files
        .iter()
        .map(|file| {
            let name = truncate_name(&make_relative(&file.path, base), NAME_WIDTH - 2);
            let status = status_name(&file.status);
            ReportRow {
                name: format!("{:<width$}", name, width = NAME_WIDTH),
                phase: format!("{:>width$}", phase_name(file.phase), width = CELL_WIDTH),
                status: format!("{:>width$}", status, width = CELL_WIDTH),
                status_style: status,
            }
        })
        .collect();

    let projects = report
        .projects
        .iter()
        .map(|project| {
            let state = match project.state {
                ProjectState::Unopened => "not opened",
                ProjectState::Open => "open",
                ProjectState::Closed => "closed",
            };
            format!(
                "Project {}: {} of {} members, {}",
                make_relative(&project.descriptor, base),
                project.extracted,
                project.members,
                state
            )
        })
        .collect();

    let mut total = format!(
        "Total ({} files): {} extracted, {} cached, {} violations, {} failed in {} ms",
        report.files.len(),
        report.extracted(),
        report.cache_hits(),
        report.violations(),
        report.failures(),
        report.elapsed_ms
    );
    if report.cache_misses > 0 {
        total.push_str(&format!(" ({} cache misses)", report.cache_misses));
    }

    ReportContext {
        header: format!(
            "{:<name$} {:>cell$} {:>cell$}",
            "File",
            "Phase",
            "Status",
            name = NAME_WIDTH,
            cell = CELL_WIDTH
        ),
        separator: "-".repeat(NAME_WIDTH + (CELL_WIDTH + 1) * 2),
        rows,
        projects,
        metadata: report.metadata.as_ref().map(|m| m.display().to_string()),
        total,
        diagnostics: diagnostic_counts(report.warnings(), report.errors()),
    }
}

/// Create the theme with styles
pub fn create_theme() -> Theme {
    Theme::new()
        .add("category", Style::new().bold())
        .add("extracted", Style::new())
        .add("cached", Style::new().dim())
        .add("violation", Style::new().yellow())
        .add("failed", Style::new().red())
        .add("vanished", Style::new().dim())
        .add("warnings", Style::new().yellow())
        .add("errors", Style::new().red())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outstanding::{render_with_output, OutputMode};
    use srcindexlib::{Diagnostic, FileRecord, FileType, PlannedProject, ProjectRun};
    use std::path::PathBuf;

    fn render<T: Serialize>(template: &str, context: &T) -> String {
        render_with_output(template, context, &create_theme(), OutputMode::Text).unwrap()
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short", 10), "short");
        assert_eq!(truncate_name("a/very/long/path.js", 10), "../path.js");
    }

    #[test]
    fn test_render_plan_lists_phases() {
        let plan = Plan {
            projects: vec![PlannedProject {
                descriptor: PathBuf::from("/repo/tsconfig.json"),
                members: vec![PathBuf::from("/repo/a.ts")],
            }],
            standalone: vec![PathBuf::from("/repo/c.ts")],
            files: vec![PathBuf::from("/repo/x.js")],
            ..Default::default()
        };
        let text = render(PLAN_TEMPLATE, &plan_context(&plan, Path::new("/repo")));
        assert!(text.contains("Projects"));
        assert!(text.contains("tsconfig.json (1 members)"));
        assert!(text.contains("    a.ts"));
        assert!(text.contains("Standalone (1 files)"));
        assert!(text.contains("  x.js"));
        assert!(!text.contains("warnings"));
    }

    #[test]
    fn test_plan_context_counts_warnings_only() {
        let plan = Plan {
            diagnostics: vec![Diagnostic {
                severity: Severity::Warning,
                path: None,
                message: "unreadable folder CSV".to_string(),
            }],
            ..Default::default()
        };
        let context = plan_context(&plan, Path::new("/repo"));
        let counts = context.diagnostics.as_ref().unwrap();
        assert_eq!(counts.warnings, "1");
        assert_eq!(counts.errors, "0");
        assert!(render(PLAN_TEMPLATE, &context).contains("1 warnings, 0 errors"));
    }

    #[test]
    fn test_render_report_totals() {
        let report = RunReport {
            files: vec![FileRecord {
                path: PathBuf::from("/repo/x.js"),
                file_type: FileType::Js,
                phase: Phase::File,
                status: FileStatus::CacheHit,
            }],
            ..Default::default()
        };
        let text = render(REPORT_TEMPLATE, &report_context(&report, Path::new("/repo")));
        assert!(text.contains("Status"));
        assert!(text.contains("x.js"));
        assert!(text.contains("cached"));
        assert!(text.contains("Total (1 files): 0 extracted, 1 cached"));
        assert!(!text.contains("cache misses"));
    }

    #[test]
    fn test_report_context_rows_are_padded() {
        let report = RunReport {
            files: vec![FileRecord {
                path: PathBuf::from("/repo/src/a.ts"),
                file_type: FileType::TypeScript,
                phase: Phase::Project,
                status: FileStatus::Failed("boom".to_string()),
            }],
            projects: vec![ProjectRun {
                descriptor: PathBuf::from("/repo/tsconfig.json"),
                state: ProjectState::Closed,
                members: 1,
                extracted: 0,
                error: Some("boom".to_string()),
            }],
            cache_misses: 1,
            ..Default::default()
        };
        let context = report_context(&report, Path::new("/repo"));
        let row = &context.rows[0];
        assert_eq!(row.name.len(), NAME_WIDTH);
        assert_eq!(row.phase, format!("{:>12}", "project"));
        assert_eq!(row.status_style, "failed");

        let text = render(REPORT_TEMPLATE, &context);
        assert!(text.contains("Project tsconfig.json: 0 of 1 members, closed"));
        assert!(text.contains("(1 cache misses)"));
    }
}
