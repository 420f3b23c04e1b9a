use std::collections::HashSet;
use std::fmt;

/// One step of a [`Patch`](crate::Patch) path: an object key or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn as_dotted(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// Depth cap used to coarsen a patch path down to an entity identifier.
///
/// A patch at `[tasks, task_3, title]` contributes the affected path
/// `tasks.task_3`; a patch at `[tasks]` alone contributes `tasks`.
const AFFECTED_PATH_DEPTH: usize = 2;

/// Collapses a full patch path into its depth-capped, dot-joined entity path.
pub fn entity_path(path: &[PathSegment]) -> String {
    let depth = path.len().min(AFFECTED_PATH_DEPTH);
    path[..depth]
        .iter()
        .map(PathSegment::as_dotted)
        .collect::<Vec<_>>()
        .join(".")
}

/// Extracts the set of coarse entity paths touched by a batch of patches.
pub fn extract_affected_paths<'a>(
    paths: impl IntoIterator<Item = &'a [PathSegment]>,
) -> HashSet<String> {
    paths
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(entity_path)
        .collect()
}

/// True iff `candidate` is `base` itself or is nested under it, where nesting
/// is judged on `.`-separated segment boundaries (`tasks.t1` is under `tasks`,
/// but `tasks2` is not).
fn is_path_under(base: &str, candidate: &str) -> bool {
    candidate == base || candidate.starts_with(&format!("{base}."))
}

/// Two affected-path sets conflict iff any path in one is equal to, a prefix
/// of, or prefixed by any path in the other.
pub fn has_path_conflict(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    a.iter()
        .any(|pa| b.iter().any(|pb| is_path_under(pa, pb) || is_path_under(pb, pa)))
}
