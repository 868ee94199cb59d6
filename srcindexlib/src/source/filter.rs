//! Glob-based include/exclude filtering.
//!
//! A [`FilterRuleSet`] is an ordered list of rules. The last rule whose
//! pattern matches a path decides whether the path is included; a path no
//! rule matches is excluded. Built-in defaults come first so that caller
//! overrides, appended afterwards, win over them.

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::error::IndexError;
use crate::options::TypeScriptMode;
use crate::source::filetype::FileType;
use crate::Result;

/// Whether a matching rule includes or excludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

/// A single polarity + glob pair.
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub polarity: Polarity,
    pub pattern: Pattern,
}

impl FilterRule {
    pub fn new(polarity: Polarity, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern).map_err(|e| IndexError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { polarity, pattern })
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.pattern.matches_with(normalized, MATCH_OPTIONS)
    }
}

/// `*` never crosses a `/`; only `**` spans directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Ordered include/exclude glob rules.
#[derive(Debug, Clone, Default)]
pub struct FilterRuleSet {
    rules: Vec<FilterRule>,
}

impl FilterRuleSet {
    /// Create an empty rule set (excludes everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules for the given TypeScript mode.
    ///
    /// Everything is included, then all files with an extension are
    /// excluded, then HTML, JavaScript and (unless disabled) TypeScript
    /// files are re-included together with `.eslintrc*` and `package.json`,
    /// and finally names that look minified are excluded again.
    pub fn defaults(typescript: TypeScriptMode) -> Result<Self> {
        let mut set = Self::new().include("/**")?.exclude("/**/*.*")?;

        let mut types = vec![FileType::Html, FileType::Js];
        if typescript != TypeScriptMode::None {
            types.push(FileType::TypeScript);
        }
        for ty in types {
            for ext in ty.extensions() {
                set = set.include(&format!("/**/*.{ext}"))?;
            }
        }

        set.include_many(&["/**/.eslintrc*", "/**/package.json"])?
            .exclude_many(&["/**/*.min.js", "/**/*-min.js"])
    }

    /// Append an include rule.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(FilterRule::new(Polarity::Include, pattern)?);
        Ok(self)
    }

    /// Append an exclude rule.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.rules.push(FilterRule::new(Polarity::Exclude, pattern)?);
        Ok(self)
    }

    /// Append multiple include rules.
    pub fn include_many(mut self, patterns: &[&str]) -> Result<Self> {
        for pattern in patterns {
            self = self.include(pattern)?;
        }
        Ok(self)
    }

    /// Append multiple exclude rules.
    pub fn exclude_many(mut self, patterns: &[&str]) -> Result<Self> {
        for pattern in patterns {
            self = self.exclude(pattern)?;
        }
        Ok(self)
    }

    /// Append caller overrides of the form `include: <glob>` or
    /// `exclude: <glob>`, rooted at `base`.
    ///
    /// Blank lines are ignored; any other line without a recognised
    /// polarity is a configuration error.
    pub fn with_overrides<'a>(
        mut self,
        base: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let base = Pattern::escape(normalize(base).trim_end_matches('/'));
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (polarity, pattern) = parse_override(line)?;
            let rooted = format!("{}/{}", base, pattern.trim_start_matches('/'));
            self.rules.push(FilterRule::new(polarity, &rooted)?);
        }
        Ok(self)
    }

    /// Evaluate `path`: the last matching rule decides, no match excludes.
    pub fn include_file(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(&normalized))
            .is_some_and(|rule| rule.polarity == Polarity::Include)
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_override(line: &str) -> Result<(Polarity, &str)> {
    let malformed = || {
        IndexError::Config(format!(
            "filter '{line}' must have the form 'include: <pattern>' or 'exclude: <pattern>'"
        ))
    };
    let (kind, pattern) = line.split_once(':').ok_or_else(malformed)?;
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(malformed());
    }
    match kind.trim() {
        "include" => Ok((Polarity::Include, pattern)),
        "exclude" => Ok((Polarity::Exclude, pattern)),
        _ => Err(malformed()),
    }
}

/// Canonical matching form: `/` separators and a leading `/`.
pub fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        text
    } else {
        format!("/{text}")
    }
}
