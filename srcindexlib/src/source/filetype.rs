//! File-type classification.
//!
//! Each [`FileType`] owns a fixed extension list; a few types add a content
//! sniff. Classification never depends on anything but the path and the
//! first bytes of the file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::options::TypeScriptMode;

/// Closed set of file types the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Html,
    Js,
    Json,
    TypeScript,
    Yaml,
}

/// Extension table, in classification priority order.
const EXTENSIONS: &[(FileType, &[&str])] = &[
    (FileType::Html, &["htm", "html", "xhtm", "xhtml", "vue"]),
    (FileType::Js, &["js", "jsx", "mjs", "es6", "es"]),
    (FileType::Json, &["json"]),
    (FileType::TypeScript, &["ts", "tsx"]),
    (FileType::Yaml, &["raml", "yaml", "yml"]),
];

/// Bytes read when sniffing a file header.
const SNIFF_LEN: usize = 256;

impl FileType {
    pub const ALL: [FileType; 5] = [
        FileType::Html,
        FileType::Js,
        FileType::Json,
        FileType::TypeScript,
        FileType::Yaml,
    ];

    /// Extensions (without the dot) that select this type.
    pub fn extensions(self) -> &'static [&'static str] {
        EXTENSIONS
            .iter()
            .find(|(ty, _)| *ty == self)
            .map(|(_, exts)| *exts)
            .unwrap_or(&[])
    }

    /// Stable tag used in cache keys and reports.
    pub fn tag(self) -> &'static str {
        match self {
            FileType::Html => "html",
            FileType::Js => "javascript",
            FileType::Json => "json",
            FileType::TypeScript => "typescript",
            FileType::Yaml => "yaml",
        }
    }

    /// Types extracted through compiler sessions rather than file by file.
    pub fn is_project_managed(self) -> bool {
        self == FileType::TypeScript
    }

    /// Type implied by the extension alone, without any I/O.
    pub fn for_extension(path: &Path) -> Option<FileType> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(ty, _)| *ty)
    }
}

/// Maps files to [`FileType`]s for a given TypeScript mode.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    typescript: TypeScriptMode,
}

impl Classifier {
    pub fn new(typescript: TypeScriptMode) -> Self {
        Self { typescript }
    }

    /// Classify `path`, or `None` if it is unsupported.
    pub fn classify(&self, path: &Path) -> Option<FileType> {
        match FileType::for_extension(path) {
            Some(FileType::TypeScript) => {
                if self.typescript == TypeScriptMode::None || !looks_like_typescript(path) {
                    None
                } else {
                    Some(FileType::TypeScript)
                }
            }
            Some(ty) => Some(ty),
            None if path.extension().is_none() => sniff_extensionless(path),
            None => None,
        }
    }
}

fn read_header(path: &Path) -> Option<Vec<u8>> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .ok()?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)
        .ok()?;
    Some(buf)
}

/// Extensionless scripts are JavaScript if their shebang names `node`.
fn sniff_extensionless(path: &Path) -> Option<FileType> {
    let header = read_header(path)?;
    let first_line = header.split(|&b| b == b'\n').next()?;
    let line = String::from_utf8_lossy(first_line);
    if line.starts_with("#!") && line.contains("node") {
        Some(FileType::Js)
    } else {
        None
    }
}

/// `.ts` is also used by Qt Linguist translation files, which are XML.
fn looks_like_typescript(path: &Path) -> bool {
    match read_header(path) {
        Some(header) => {
            let header = header.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&header);
            header
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_none_or(|&b| b != b'<')
        }
        // Unreadable files are left to the extractor to report.
        None => true,
    }
}
