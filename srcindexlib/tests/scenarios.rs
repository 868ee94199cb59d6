//! End-to-end scenarios through the public API.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use srcindexlib::{
    ArtifactLayout, ExtractError, ExtractOutcome, Extractor, ExtractorConfig, FileStatus,
    FileType, IndexOptions, Indexer, ManifestHost, Phase, RunContext, TypeScriptMode,
};
use tempfile::{tempdir, TempDir};

/// Copies sources into artifacts and remembers every file it saw.
#[derive(Default)]
struct RecordingExtractor {
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl Extractor for RecordingExtractor {
    fn extract(
        &self,
        file: &Path,
        _file_type: FileType,
        _config: &ExtractorConfig,
        out: &Path,
    ) -> Result<ExtractOutcome, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(file.to_path_buf());
        fs::copy(file, out)?;
        Ok(ExtractOutcome::Extracted)
    }
}

struct Repo {
    _dir: TempDir,
    root: PathBuf,
    out: PathBuf,
    cache: PathBuf,
}

impl Repo {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().join("repo");
        fs::create_dir_all(&root).unwrap();
        let root = root.canonicalize().unwrap();
        let out = dir.path().join("out");
        let cache = dir.path().join("cache");
        Self {
            _dir: dir,
            root,
            out,
            cache,
        }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn plan(&self, options: IndexOptions) -> HashSet<PathBuf> {
        let plan = Indexer::new(options).unwrap().plan(&RunContext::new()).unwrap();
        plan.candidates.into_iter().map(|c| c.path).collect()
    }
}

#[test]
fn test_include_nested_in_exclude_is_walked() {
    let repo = Repo::new();
    let kept = repo.write("vendor/lib/keep.js", "keep();");
    let dropped = repo.write("vendor/drop.js", "drop();");

    let candidates = repo.plan(
        IndexOptions::new(&repo.root)
            .include(".")
            .include("vendor/lib")
            .exclude("vendor"),
    );

    assert!(candidates.contains(&kept));
    assert!(!candidates.contains(&dropped));
}

#[test]
fn test_exclude_nested_in_include_is_pruned() {
    let repo = Repo::new();
    let kept = repo.write("src/app.js", "app();");
    let dropped = repo.write("src/generated/gen.js", "gen();");

    let candidates = repo.plan(IndexOptions::new(&repo.root).include("src").exclude("src/generated"));

    assert!(candidates.contains(&kept));
    assert!(!candidates.contains(&dropped));
}

#[test]
fn test_file_both_included_and_excluded_is_kept() {
    let repo = Repo::new();
    let both = repo.write("src/both.js", "both();");

    let candidates = repo.plan(
        IndexOptions::new(&repo.root)
            .include("src/both.js")
            .exclude("src/both.js"),
    );

    assert!(candidates.contains(&both));
}

#[test]
fn test_hidden_directories_pruned_below_root_only() {
    let repo = Repo::new();
    let hidden = repo.write(".cache/x.js", "x();");
    let visible = repo.write("src/y.js", "y();");
    let hidden_root_file = repo.write(".config/z.js", "z();");

    let candidates = repo.plan(IndexOptions::new(&repo.root));
    assert!(candidates.contains(&visible));
    assert!(!candidates.contains(&hidden));

    let candidates = repo.plan(IndexOptions::new(&repo.root).include(".config"));
    assert!(candidates.contains(&hidden_root_file));
}

#[test]
fn test_filter_override_precedence() {
    let repo = Repo::new();
    let vendor = repo.write("lib/vendor.min.js", "v()");
    let other = repo.write("lib/other.min.js", "o()");

    let candidates = repo.plan(IndexOptions::new(&repo.root).filter("include: **/vendor.min.js"));

    assert!(candidates.contains(&vendor));
    assert!(!candidates.contains(&other));
}

#[test]
fn test_repo_with_vendor_exclude_and_keep_override() {
    let repo = Repo::new();
    let keep = repo.write("vendor/keep.js", "keep();");
    repo.write("vendor/lodash.js", "_();");
    repo.write("vendor/sub/dep.js", "dep();");
    let app = repo.write("app.js", "app();");

    let candidates = repo.plan(
        IndexOptions::new(&repo.root)
            .include(repo.root.to_str().unwrap())
            .include(keep.to_str().unwrap())
            .exclude(repo.root.join("vendor").to_str().unwrap()),
    );

    let vendored: Vec<&PathBuf> = candidates
        .iter()
        .filter(|p| p.starts_with(repo.root.join("vendor")))
        .collect();
    assert_eq!(vendored, vec![&keep]);
    assert!(candidates.contains(&app));
}

#[test]
fn test_identical_content_reuses_cached_artifact() {
    let repo = Repo::new();
    let first = repo.write("a/one.js", "var same = 1;");
    let second = repo.write("b/two.mjs", "var same = 1;");

    let extractor = Arc::new(RecordingExtractor::default());
    let mut host = ManifestHost::new(extractor.clone(), ExtractorConfig::new());
    let layout = ArtifactLayout::new(&repo.out);
    let options = IndexOptions::new(&repo.root).trap_cache(&repo.cache);

    let report = Indexer::new(options)
        .unwrap()
        .run(extractor.as_ref(), &mut host, &layout, &RunContext::new())
        .unwrap();

    assert_eq!(report.file(&first).unwrap().status, FileStatus::Extracted);
    assert_eq!(report.file(&second).unwrap().status, FileStatus::CacheHit);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        fs::read(layout.artifact_path(&second)).unwrap(),
        b"var same = 1;"
    );
}

#[test]
fn test_project_member_extracted_exactly_once() {
    let repo = Repo::new();
    repo.write("tsconfig.json", r#"{"files": ["a.ts", "b.ts"]}"#);
    let a = repo.write("a.ts", "let a = 1;");
    let b = repo.write("b.ts", "let b = 2;");
    let c = repo.write("c.ts", "let c = 3;");
    let d = repo.write("d.js", "var d = 4;");

    let extractor = Arc::new(RecordingExtractor::default());
    let mut host = ManifestHost::new(extractor.clone(), ExtractorConfig::new());
    let layout = ArtifactLayout::new(&repo.out);
    let options = IndexOptions::new(&repo.root)
        .typescript(TypeScriptMode::Full)
        .jobs(2);

    let report = Indexer::new(options)
        .unwrap()
        .run(extractor.as_ref(), &mut host, &layout, &RunContext::new())
        .unwrap();

    let seen = extractor.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    let unique: HashSet<&PathBuf> = seen.iter().collect();
    assert_eq!(unique.len(), 4);

    assert_eq!(report.file(&a).unwrap().phase, Phase::Project);
    assert_eq!(report.file(&b).unwrap().phase, Phase::Project);
    assert_eq!(report.file(&c).unwrap().phase, Phase::Standalone);
    assert_eq!(report.file(&d).unwrap().phase, Phase::File);
    assert_eq!(report.files.len(), 4);

    assert_eq!(report.projects.len(), 1);
    assert_eq!(report.projects[0].extracted, 2);
    let metadata = report.metadata.clone().unwrap();
    let table: serde_json::Value = serde_json::from_slice(&fs::read(metadata).unwrap()).unwrap();
    assert_eq!(table["entries"].as_object().unwrap().len(), 1);
}

#[test]
fn test_vanished_file_does_not_stop_the_run() {
    let repo = Repo::new();
    let keep = repo.write("keep.js", "keep();");
    let gone = repo.write("gone.js", "gone();");

    let indexer = Indexer::new(IndexOptions::new(&repo.root)).unwrap();
    let ctx = RunContext::new();
    let plan = indexer.plan(&ctx).unwrap();
    assert_eq!(plan.candidates.len(), 2);

    // The file disappears after discovery.
    fs::remove_file(&gone).unwrap();
    let extractor = RecordingExtractor::default();
    let layout = ArtifactLayout::new(&repo.out);
    let files = srcindexlib::FileExtractor::new(
        &extractor,
        &srcindexlib::NullCache,
        &layout,
        ExtractorConfig::new(),
    );
    for candidate in &plan.candidates {
        let status = files.extract(&candidate.path, candidate.file_type, &ctx).unwrap();
        if candidate.path == gone {
            assert_eq!(status, FileStatus::Vanished);
        } else {
            assert_eq!(candidate.path, keep);
            assert_eq!(status, FileStatus::Extracted);
        }
    }
    assert_eq!(ctx.warning_count(), 1);
}
