//! Reference rewriting for text formats.
//!
//! Every local path with a known remote name is a candidate. For an
//! artifact at `dir/file`, a candidate `path` is matched in three forms:
//!
//! - `/path` (root-absolute)
//! - `./rel` and bare `rel`, where `rel` is `path` relative to `dir` (only
//!   for candidates under the artifact's directory)
//!
//! Each form is replaced with `/<remote name>`. Matching is literal and
//! single-pass: at every position the longest matching form wins, so a
//! path that prefixes a longer one (`img/a.png` vs `img/a.png.bak`) never
//! corrupts it, and replaced text is never matched again.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use hoist_common::split_parent;

/// Local path to remote name table used for rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteTable {
    names: BTreeMap<String, String>,
}

impl RewriteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the remote name of a local path.
    pub fn insert(&mut self, local_path: impl Into<String>, remote_name: impl Into<String>) {
        self.names.insert(local_path.into(), remote_name.into());
    }

    /// Merge names from another table, replacing existing ones.
    pub fn extend(&mut self, names: impl IntoIterator<Item = (String, String)>) {
        self.names.extend(names);
    }

    /// Remote name of a local path.
    pub fn get(&self, local_path: &str) -> Option<&str> {
        self.names.get(local_path).map(String::as_str)
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check whether no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rewrite references in the text of the artifact at `artifact_path`.
    ///
    /// # Arguments
    /// * `artifact_path` - Relative path of the artifact being rewritten
    /// * `bytes` - Artifact text
    ///
    /// # Returns
    /// The rewritten bytes (unchanged if nothing matched).
    pub fn rewrite(&self, artifact_path: &str, bytes: &[u8]) -> Vec<u8> {
        if self.names.is_empty() {
            return bytes.to_vec();
        }
        let matcher: Matcher = Matcher::build(
            artifact_path,
            self.names.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        matcher.replace(bytes)
    }
}

/// Local paths referenced by an artifact's text.
///
/// Uses the same forms and precedence as [`RewriteTable::rewrite`], so a
/// path reported here is exactly one that rewriting would replace. The
/// artifact's own path is never reported.
///
/// # Arguments
/// * `artifact_path` - Relative path of the artifact
/// * `bytes` - Artifact text
/// * `candidates` - Local paths to look for
pub fn find_references<'a>(
    artifact_path: &str,
    bytes: &[u8],
    candidates: impl IntoIterator<Item = &'a str>,
) -> BTreeSet<String> {
    let matcher: Matcher = Matcher::build(
        artifact_path,
        candidates
            .into_iter()
            .filter(|c| *c != artifact_path)
            .map(|c: &'a str| -> (&'a str, &'a str) { (c, "") }),
    );
    matcher.find(bytes)
}

/// One literal form of one candidate.
struct Pattern {
    needle: Vec<u8>,
    target: usize,
}

/// Candidate forms bucketed by first byte, longest first.
struct Matcher {
    targets: Vec<(String, Vec<u8>)>,
    by_first_byte: HashMap<u8, Vec<Pattern>>,
}

impl Matcher {
    fn build<'a>(
        artifact_path: &str,
        candidates: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let (dir, _) = split_parent(artifact_path);
        let mut targets: Vec<(String, Vec<u8>)> = Vec::new();
        let mut by_first_byte: HashMap<u8, Vec<Pattern>> = HashMap::new();

        for (local_path, remote_name) in candidates {
            if local_path.is_empty() {
                continue;
            }
            let target: usize = targets.len();
            targets.push((local_path.to_string(), format!("/{}", remote_name).into_bytes()));

            let mut forms: Vec<String> = vec![format!("/{}", local_path)];
            if let Some(relative) = local_path.strip_prefix(dir).filter(|r| !r.is_empty()) {
                forms.push(format!("./{}", relative));
                forms.push(relative.to_string());
            }

            for form in forms {
                let needle: Vec<u8> = form.into_bytes();
                by_first_byte
                    .entry(needle[0])
                    .or_default()
                    .push(Pattern { needle, target });
            }
        }

        for patterns in by_first_byte.values_mut() {
            patterns.sort_by(|a, b| {
                b.needle
                    .len()
                    .cmp(&a.needle.len())
                    .then_with(|| a.needle.cmp(&b.needle))
            });
        }

        Self {
            targets,
            by_first_byte,
        }
    }

    /// Longest pattern matching at the start of `text`.
    fn match_at(&self, text: &[u8]) -> Option<&Pattern> {
        self.by_first_byte
            .get(text.first()?)?
            .iter()
            .find(|p| text.starts_with(&p.needle))
    }

    fn replace(&self, bytes: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut pos: usize = 0;
        while pos < bytes.len() {
            match self.match_at(&bytes[pos..]) {
                Some(pattern) => {
                    out.extend_from_slice(&self.targets[pattern.target].1);
                    pos += pattern.needle.len();
                }
                None => {
                    out.push(bytes[pos]);
                    pos += 1;
                }
            }
        }
        out
    }

    fn find(&self, bytes: &[u8]) -> BTreeSet<String> {
        let mut found: BTreeSet<String> = BTreeSet::new();
        let mut pos: usize = 0;
        while pos < bytes.len() {
            match self.match_at(&bytes[pos..]) {
                Some(pattern) => {
                    found.insert(self.targets[pattern.target].0.clone());
                    pos += pattern.needle.len();
                }
                None => pos += 1,
            }
        }
        found
    }
}
