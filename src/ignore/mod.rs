//! The gitignore-compatible ignore engine (§4.3, §6).
//!
//! A [`Matcher`] is compiled once from an ordered pattern list and then
//! answers `(path, is_directory) -> ignored` for every scanned path. Two
//! dialects are supported: [`Dialect::Default`] behaves like `.gitignore`
//! (a later rule overrides an earlier one; a match on an ignored
//! directory prunes the whole subtree). [`Dialect::Docker`] additionally
//! tracks, per directory match, whether that directory is a *candidate*
//! for reification into a [`crate::entry::Entry::PhantomDirectory`]
//! rather than an outright prune — the scanner keeps recursing into such
//! directories so that a later unignored descendant can be discovered,
//! and [`crate::phantom`] resolves the ambiguity after the scan.

mod cache;
mod pattern;

pub use cache::IgnoreCache;

use pattern::CompiledPattern;

/// Which ignore-matching dialect to compile patterns under (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Standard gitignore semantics: an ignored directory prunes its
    /// subtree outright.
    Default,
    /// Docker-style semantics: an ignored directory is a phantom
    /// candidate; its subtree is still walked so a negated descendant
    /// pattern can be honored.
    Docker,
}

/// A pattern failed to compile (§4.3: "unterminated bracket group, an
/// empty pattern, a lone `/`").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidPatternError {
    pub pattern: String,
    pub reason: &'static str,
}

impl std::fmt::Display for InvalidPatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid ignore pattern {:?}: {}", self.pattern, self.reason)
    }
}

impl std::error::Error for InvalidPatternError {}

/// A compiled, ordered ignore pattern list (§4.3).
#[derive(Clone, Debug)]
pub struct Matcher {
    dialect: Dialect,
    patterns: Vec<CompiledPattern>,
}

/// Outcome of matching one path under [`Dialect::Docker`]: whether the
/// path is currently ignored, and whether a directory match should be
/// treated as a phantom candidate (walked further) rather than a
/// definitive prune.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DockerMatch {
    pub ignored: bool,
    pub phantom: bool,
}

impl Matcher {
    /// Compiles `patterns`, in order, under `dialect`. Fails on the first
    /// malformed pattern.
    pub fn compile(patterns: &[String], dialect: Dialect) -> Result<Self, InvalidPatternError> {
        let compiled = patterns
            .iter()
            .map(|raw| pattern::compile(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dialect, patterns: compiled })
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Answers `(path, is_directory) -> ignored` (§4.3). Later patterns
    /// override earlier ones; a `!`-negated pattern un-ignores a path
    /// re-matched by it. The synchronization root (`""`) is never
    /// ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &str, is_directory: bool) -> bool {
        self.last_match(path, is_directory).map(|(_, negated)| !negated).unwrap_or(false)
    }

    /// Docker-dialect match (§4.3, §4.8). Only meaningful when
    /// [`Self::dialect`] is [`Dialect::Docker`]; under [`Dialect::Default`]
    /// `phantom` is always `false`.
    #[must_use]
    pub fn is_ignored_docker(&self, path: &str, is_directory: bool) -> DockerMatch {
        let ignored = self.is_ignored(path, is_directory);
        let phantom = matches!(self.dialect, Dialect::Docker) && ignored && is_directory;
        DockerMatch { ignored, phantom }
    }

    /// Index of the pattern that decided the current verdict for `path`,
    /// for diagnostics (SPEC_FULL §4.3 supplement). `None` means no
    /// pattern matched (the path is not ignored by default).
    #[must_use]
    pub fn last_match_index(&self, path: &str, is_directory: bool) -> Option<usize> {
        self.last_match(path, is_directory).map(|(idx, _)| idx)
    }

    fn last_match(&self, path: &str, is_directory: bool) -> Option<(usize, bool)> {
        if path.is_empty() {
            return None;
        }
        let mut verdict = None;
        for (idx, p) in self.patterns.iter().enumerate() {
            if p.directory_only && !is_directory {
                continue;
            }
            if p.glob.is_match(path) {
                verdict = Some((idx, p.negated));
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str], dialect: Dialect) -> Matcher {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        Matcher::compile(&patterns, dialect).unwrap()
    }

    #[test]
    fn simple_name_matches_anywhere() {
        let m = matcher(&["*.log"], Dialect::Default);
        assert!(m.is_ignored("a.log", false));
        assert!(m.is_ignored("dir/a.log", false));
        assert!(!m.is_ignored("a.txt", false));
    }

    #[test]
    fn anchored_pattern_matches_root_only() {
        let m = matcher(&["/build"], Dialect::Default);
        assert!(m.is_ignored("build", true));
        assert!(!m.is_ignored("sub/build", true));
    }

    #[test]
    fn directory_only_pattern_ignores_files_with_the_name() {
        let m = matcher(&["logs/"], Dialect::Default);
        assert!(m.is_ignored("logs", true));
        assert!(!m.is_ignored("logs", false));
    }

    #[test]
    fn later_negation_overrides_earlier_ignore() {
        let m = matcher(&["*.log", "!keep.log"], Dialect::Default);
        assert!(m.is_ignored("a.log", false));
        assert!(!m.is_ignored("keep.log", false));
    }

    #[test]
    fn later_rule_overrides_earlier_negation() {
        let m = matcher(&["!a.log", "*.log"], Dialect::Default);
        assert!(m.is_ignored("a.log", false));
    }

    #[test]
    fn double_star_crosses_directories() {
        let m = matcher(&["**/target"], Dialect::Default);
        assert!(m.is_ignored("target", true));
        assert!(m.is_ignored("a/b/target", true));
    }

    #[test]
    fn docker_dialect_flags_directory_matches_as_phantom_candidates() {
        let m = matcher(&["node_modules"], Dialect::Docker);
        let dir_match = m.is_ignored_docker("node_modules", true);
        assert!(dir_match.ignored);
        assert!(dir_match.phantom);
        let file_match = m.is_ignored_docker("node_modules", false);
        assert!(file_match.ignored);
        assert!(!file_match.phantom);
    }

    #[test]
    fn default_dialect_never_reports_phantom() {
        let m = matcher(&["node_modules"], Dialect::Default);
        assert!(!m.is_ignored_docker("node_modules", true).phantom);
    }

    #[test]
    fn root_is_never_ignored() {
        let m = matcher(&["*"], Dialect::Default);
        assert!(!m.is_ignored("", true));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(Matcher::compile(&["".to_string()], Dialect::Default).is_err());
        assert!(Matcher::compile(&["/".to_string()], Dialect::Default).is_err());
        assert!(Matcher::compile(&["[a-".to_string()], Dialect::Default).is_err());
        assert!(Matcher::compile(&["!".to_string()], Dialect::Default).is_err());
    }
}
