use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const DEFAULT_PATTERN: &str = "*.*";

/// Minimal recursive glob.
/// Supported:
/// - `*` any run of characters inside one segment
/// - `?` exactly one character
/// - `[abc]`, `[a-z]`, `[!a-z]` one character from (or not from) a set
/// - `**` any number of whole segments
///
/// The pattern may match at any depth below the search root, so `*.txt`
/// behaves like `**/*.txt`. A `[` with no closing `]` is a literal.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    AnyDepth,
    Name(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Star,
    One,
    Literal(char),
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Star | Token::One => true,
            Token::Literal(l) => *l == c,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negated
            }
        }
    }
}

// Parses `[...]` starting just after the `[`. Returns the class and the index
// after its `]`, or None when the bracket is never closed.
fn parse_class(chars: &[char], start: usize) -> Option<(Token, usize)> {
    let mut i = start;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated { i += 1; }
    let mut ranges = Vec::new();
    let first = i;
    while i < chars.len() {
        let c = chars[i];
        // A `]` first in the set is a member, not the end.
        if c == ']' && i > first {
            return Some((Token::Class { negated, ranges }, i + 1));
        }
        if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|&hi| hi != ']') {
            ranges.push((c, chars[i + 2]));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    None
}

fn tokenize(segment: &str) -> Vec<Token> {
    let chars: Vec<char> = segment.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Runs of `*` behave like one.
                if tokens.last() != Some(&Token::Star) { tokens.push(Token::Star); }
                i += 1;
            }
            '?' => { tokens.push(Token::One); i += 1; }
            '[' => match parse_class(&chars, i + 1) {
                Some((class, next)) => { tokens.push(class); i = next; }
                None => { tokens.push(Token::Literal('[')); i += 1; }
            },
            c => { tokens.push(Token::Literal(c)); i += 1; }
        }
    }
    tokens
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let p = pattern.trim().replace('\\', "/");
        if p.is_empty() {
            return Err(Error::InvalidArgument("empty file pattern".into()));
        }
        if p.starts_with('/') {
            return Err(Error::InvalidArgument(format!("file pattern must be relative: {}", pattern)));
        }
        let mut segments = vec![Segment::AnyDepth];
        for seg in p.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if seg == "**" {
                if !matches!(segments.last(), Some(Segment::AnyDepth)) { segments.push(Segment::AnyDepth); }
            } else {
                segments.push(Segment::Name(tokenize(seg)));
            }
        }
        Ok(GlobPattern { segments })
    }

    /// Match a path relative to the search root.
    pub fn matches(&self, rel: &Path) -> bool {
        let parts: Vec<Vec<char>> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(os) => Some(os.to_string_lossy().chars().collect()),
                _ => None,
            })
            .collect();
        wildcard_match(
            &self.segments,
            &parts,
            |seg| matches!(seg, Segment::AnyDepth),
            |seg, part| match seg {
                Segment::AnyDepth => true,
                Segment::Name(tokens) => segment_matches(tokens, part),
            },
        )
    }
}

fn segment_matches(tokens: &[Token], name: &[char]) -> bool {
    wildcard_match(tokens, name, |t| *t == Token::Star, |t, c| t.accepts(*c))
}

/// Wildcard matching that backtracks only to the most recent star, so the
/// cost stays within len(pattern) * len(subject). Used both for characters in
/// a name and for `**` over path segments.
fn wildcard_match<P, S>(
    pattern: &[P],
    subject: &[S],
    is_star: impl Fn(&P) -> bool,
    accepts: impl Fn(&P, &S) -> bool,
) -> bool {
    let (mut pi, mut si) = (0usize, 0usize);
    let mut last_star: Option<(usize, usize)> = None;
    while si < subject.len() {
        if let Some(p) = pattern.get(pi) {
            if is_star(p) {
                last_star = Some((pi, si));
                pi += 1;
                continue;
            }
            if accepts(p, &subject[si]) {
                pi += 1;
                si += 1;
                continue;
            }
        }
        match last_star {
            Some((star_pi, star_si)) => {
                last_star = Some((star_pi, star_si + 1));
                pi = star_pi + 1;
                si = star_si + 1;
            }
            None => return false,
        }
    }
    pattern[pi..].iter().all(|p| is_star(p))
}

/// Files below `directory` matching `pattern` (default `*.*`), sorted.
///
/// The search runs directly against `directory`; the process working
/// directory is neither read nor changed.
pub fn try_list_files(directory: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let glob = GlobPattern::new(pattern.unwrap_or(DEFAULT_PATTERN))?;
    let root = directory.canonicalize().map_err(|e| {
        Error::InvalidArgument(format!("cannot access source directory {}: {}", directory.display(), e))
    })?;
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!("source directory must be a valid dir, got {}", directory.display())));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() { continue; }
        let Ok(rel) = path.strip_prefix(&root) else { continue };
        if glob.matches(rel) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    debug!(root = %root.display(), count = files.len(), "listed files");
    Ok(files)
}

/// Like [`try_list_files`], but failures are logged and give an empty list so
/// a batch over many roots can carry on.
pub fn list_files(directory: &Path, pattern: Option<&str>) -> Vec<PathBuf> {
    match try_list_files(directory, pattern) {
        Ok(files) => files,
        Err(e) => {
            error!("could not list files in {}: {}", directory.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "x").unwrap();
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        let root = root.canonicalize().unwrap();
        files
            .iter()
            .map(|f| f.strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn default_pattern_finds_dotted_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt");
        touch(dir.path(), "Makefile");
        touch(dir.path(), "sub/deeper/b.zip");
        let files = list_files(dir.path(), None);
        assert_eq!(names(dir.path(), &files), vec!["a.txt", "sub/deeper/b.zip"]);
    }

    #[test]
    fn wildcard_inside_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x/google-takeout-001.zip");
        touch(dir.path(), "takeout.tar");
        touch(dir.path(), "other.zip");
        let files = list_files(dir.path(), Some("*takeout*.zip"));
        assert_eq!(names(dir.path(), &files), vec!["x/google-takeout-001.zip"]);
    }

    #[test]
    fn pattern_with_directory_segment() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "logs/a.log");
        touch(dir.path(), "old/logs/b.log");
        touch(dir.path(), "c.log");
        let files = list_files(dir.path(), Some("logs/*.log"));
        assert_eq!(names(dir.path(), &files), vec!["logs/a.log", "old/logs/b.log"]);
    }

    #[test]
    fn directories_are_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder.d")).unwrap();
        assert!(list_files(dir.path(), None).is_empty());
    }

    #[test]
    fn missing_directory_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(&dir.path().join("nope"), None).is_empty());
        assert!(matches!(try_list_files(&dir.path().join("nope"), None), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn file_as_directory_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "plain.txt");
        assert!(list_files(&dir.path().join("plain.txt"), None).is_empty());
    }

    #[test]
    fn does_not_touch_working_directory() {
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt");
        list_files(dir.path(), None);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn glob_segment_rules() {
        let g = GlobPattern::new("?b*.t?t").unwrap();
        assert!(g.matches(Path::new("abc.txt")));
        assert!(g.matches(Path::new("deep/ab.tnt")));
        assert!(!g.matches(Path::new("b.txt")));
        assert!(!g.matches(Path::new("abc.text")));

        let g = GlobPattern::new("src/**/*.rs").unwrap();
        assert!(g.matches(Path::new("src/lib.rs")));
        assert!(g.matches(Path::new("crate/src/a/b/c.rs")));
        assert!(!g.matches(Path::new("lib.rs")));
    }

    #[test]
    fn many_stars_against_long_name_finish_quickly() {
        let g = GlobPattern::new("*a*a*a*a*a*a*a*b").unwrap();
        let name = "a".repeat(60);
        let started = std::time::Instant::now();
        assert!(!g.matches(Path::new(&name)));
        assert!(g.matches(Path::new(&format!("{name}b"))));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let g = GlobPattern::new("**/**/a/**/a/**/b").unwrap();
        let deep = vec!["a"; 40].join("/");
        assert!(!g.matches(Path::new(&deep)));
    }

    #[test]
    fn character_classes() {
        let g = GlobPattern::new("[ab].txt").unwrap();
        assert!(g.matches(Path::new("a.txt")));
        assert!(g.matches(Path::new("sub/b.txt")));
        assert!(!g.matches(Path::new("c.txt")));

        let g = GlobPattern::new("[!ab].txt").unwrap();
        assert!(g.matches(Path::new("c.txt")));
        assert!(!g.matches(Path::new("a.txt")));

        let g = GlobPattern::new("log[0-9][0-9].txt").unwrap();
        assert!(g.matches(Path::new("log07.txt")));
        assert!(!g.matches(Path::new("log7x.txt")));

        let g = GlobPattern::new("[]x]").unwrap();
        assert!(g.matches(Path::new("]")));
        assert!(g.matches(Path::new("x")));

        let g = GlobPattern::new("[a-].md").unwrap();
        assert!(g.matches(Path::new("-.md")));
        assert!(!g.matches(Path::new("b.md")));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        let g = GlobPattern::new("[ab.txt").unwrap();
        assert!(g.matches(Path::new("[ab.txt")));
        assert!(!g.matches(Path::new("a.txt")));
    }

    #[test]
    fn class_pattern_lists_only_members() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt");
        touch(dir.path(), "c.txt");
        let files = list_files(dir.path(), Some("[ab].txt"));
        assert_eq!(names(dir.path(), &files), vec!["a.txt"]);
    }

    #[test]
    fn rejects_unsupported_patterns() {
        assert!(GlobPattern::new("").is_err());
        assert!(GlobPattern::new("/abs/*.txt").is_err());
    }
}
