//! Structural projections of a document set.
//!
//! A path is `"r"` for the set itself, or a string of steps applied left to
//! right: `c` descends into `chunks`, `m` into `matches`. `"cm"` selects the
//! matches of every chunk of every top-level document.

use crate::document::Document;
use crate::error::{IndexError, Result};
use std::fmt;
use std::str::FromStr;

pub const ROOT_PATH: &str = "r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Chunks,
    Matches,
}

impl Step {
    fn children<'a>(&self, doc: &'a Document) -> &'a [Document] {
        match self {
            Step::Chunks => &doc.chunks,
            Step::Matches => &doc.matches,
        }
    }

    fn children_mut<'a>(&self, doc: &'a mut Document) -> &'a mut [Document] {
        match self {
            Step::Chunks => &mut doc.chunks,
            Step::Matches => &mut doc.matches,
        }
    }
}

/// Parsed traversal path. No steps means the root set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalPath {
    steps: Vec<Step>,
}

impl TraversalPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Documents selected by this path, in depth-first order.
    pub fn collect<'a>(&self, docs: &'a [Document]) -> Vec<&'a Document> {
        let mut out = Vec::new();
        walk(docs, &self.steps, &mut out);
        out
    }

    /// Call `f` on every selected document, in the same order as [`Self::collect`].
    pub fn visit_mut(&self, docs: &mut [Document], f: &mut dyn FnMut(&mut Document)) {
        walk_mut(docs, &self.steps, f);
    }
}

fn walk<'a>(docs: &'a [Document], steps: &[Step], out: &mut Vec<&'a Document>) {
    match steps.split_first() {
        None => out.extend(docs.iter()),
        Some((step, rest)) => {
            for doc in docs {
                walk(step.children(doc), rest, out);
            }
        }
    }
}

fn walk_mut(docs: &mut [Document], steps: &[Step], f: &mut dyn FnMut(&mut Document)) {
    match steps.split_first() {
        None => docs.iter_mut().for_each(|doc| f(doc)),
        Some((step, rest)) => {
            for doc in docs.iter_mut() {
                walk_mut(step.children_mut(doc), rest, f);
            }
        }
    }
}

impl FromStr for TraversalPath {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        if s == ROOT_PATH {
            return Ok(Self::root());
        }
        if s.is_empty() {
            return Err(IndexError::InvalidTraversal("empty path".into()));
        }
        let steps = s
            .chars()
            .map(|c| match c {
                'c' => Ok(Step::Chunks),
                'm' => Ok(Step::Matches),
                other => Err(IndexError::InvalidTraversal(format!(
                    "unknown step '{}' in path '{}'",
                    other, s
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }
}

impl fmt::Display for TraversalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str(ROOT_PATH);
        }
        for step in &self.steps {
            f.write_str(match step {
                Step::Chunks => "c",
                Step::Matches => "m",
            })?;
        }
        Ok(())
    }
}

/// Parse a list of path strings. An empty list means the root set.
pub fn parse_paths<S: AsRef<str>>(paths: &[S]) -> Result<Vec<TraversalPath>> {
    if paths.is_empty() {
        return Ok(vec![TraversalPath::root()]);
    }
    paths.iter().map(|p| p.as_ref().parse()).collect()
}

/// Concatenation of every path's selection, in path order.
pub fn collect_all<'a>(docs: &'a [Document], paths: &[TraversalPath]) -> Vec<&'a Document> {
    match paths {
        [only] if only.is_root() => docs.iter().collect(),
        _ => paths.iter().flat_map(|p| p.collect(docs)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<Document> {
        let mut a = Document::with_id("a")
            .chunk(Document::with_id("a.0").chunk(Document::with_id("a.0.0")))
            .chunk(Document::with_id("a.1"));
        a.chunks[1].matches.push(Document::with_id("a.1.m"));
        let b = Document::with_id("b").chunk(Document::with_id("b.0"));
        vec![a, b]
    }

    fn ids(docs: Vec<&Document>) -> Vec<&str> {
        docs.into_iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_root_path_is_identity() {
        let docs = tree();
        let path: TraversalPath = "r".parse().unwrap();
        assert!(path.is_root());
        assert_eq!(ids(path.collect(&docs)), vec!["a", "b"]);
    }

    #[test]
    fn test_chunk_and_match_steps() {
        let docs = tree();
        let c: TraversalPath = "c".parse().unwrap();
        assert_eq!(ids(c.collect(&docs)), vec!["a.0", "a.1", "b.0"]);
        let cc: TraversalPath = "cc".parse().unwrap();
        assert_eq!(ids(cc.collect(&docs)), vec!["a.0.0"]);
        let cm: TraversalPath = "cm".parse().unwrap();
        assert_eq!(ids(cm.collect(&docs)), vec!["a.1.m"]);
        assert_eq!(cm.to_string(), "cm");
    }

    #[test]
    fn test_collect_all_concatenates() {
        let docs = tree();
        let paths = parse_paths(&["r", "c"]).unwrap();
        assert_eq!(
            ids(collect_all(&docs, &paths)),
            vec!["a", "b", "a.0", "a.1", "b.0"]
        );
        assert_eq!(parse_paths::<&str>(&[]).unwrap(), vec![TraversalPath::root()]);
    }

    #[test]
    fn test_visit_mut_follows_collect_order() {
        let mut docs = tree();
        let path: TraversalPath = "c".parse().unwrap();
        let mut seen = Vec::new();
        path.visit_mut(&mut docs, &mut |doc| {
            seen.push(doc.id.clone());
            doc.id.push('!');
        });
        assert_eq!(seen, vec!["a.0", "a.1", "b.0"]);
        assert_eq!(docs[1].chunks[0].id, "b.0!");
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["", "x", "rc", "c1"] {
            let err = bad.parse::<TraversalPath>().unwrap_err();
            assert!(matches!(err, IndexError::InvalidTraversal(_)), "{bad}");
        }
    }
}
