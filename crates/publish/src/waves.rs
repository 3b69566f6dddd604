//! Ordering of logical files into publish waves.
//!
//! A content-addressed name is only known once its final bytes are, and a
//! rewriting file's final bytes depend on the names it references. Files
//! are therefore published in waves:
//!
//! - wave 0: files that never rewrite references
//! - wave n: rewriting files whose content-addressed rewriting dependencies
//!   all settled in earlier waves
//!
//! Literal names depend only on paths and are known up front, so markup
//! linking to markup never forms a dependency. Files caught in a cycle are
//! published together in a final wave with those references left as-is.

use std::collections::{BTreeSet, HashSet};

use hoist_filesystem::LogicalFile;

use crate::naming::NamingPolicy;
use crate::rewrite::{find_references, RewriteTable};
use crate::transform::TransformRegistry;

/// Files grouped into waves, plus names known before any wave runs.
#[derive(Debug, Default)]
pub struct WavePlan {
    /// Waves in publish order. Never contains an empty wave.
    pub waves: Vec<Vec<LogicalFile>>,
    /// Literal remote names of every file, keyed by local path.
    pub literal_names: RewriteTable,
    /// Paths published in the final wave because of a dependency cycle.
    pub cyclic: Vec<String>,
}

impl WavePlan {
    /// Total number of logical files across waves.
    pub fn file_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }
}

/// Group files into waves.
///
/// # Arguments
/// * `files` - Logical files of the run, in scan order
/// * `registry` - Format table deciding which files rewrite references
/// * `policy` - Naming policy deciding which names are literal
pub fn plan_waves(
    files: Vec<LogicalFile>,
    registry: &TransformRegistry,
    policy: &NamingPolicy,
) -> WavePlan {
    let mut literal_names: RewriteTable = RewriteTable::new();
    let mut hashed_rewriting: Vec<String> = Vec::new();

    for file in &files {
        let content_type: &str = registry.content_type_for(&file.path);
        match policy.literal_name(&file.path, content_type) {
            Some(name) => literal_names.insert(file.path.clone(), name),
            None if registry.rewrites_references(&file.path) => {
                hashed_rewriting.push(file.path.clone())
            }
            None => {}
        }
    }

    let (rewriting, plain): (Vec<LogicalFile>, Vec<LogicalFile>) = files
        .into_iter()
        .partition(|f| registry.rewrites_references(&f.path));

    let mut waves: Vec<Vec<LogicalFile>> = Vec::new();
    if !plain.is_empty() {
        waves.push(plain);
    }

    let mut remaining: Vec<(LogicalFile, BTreeSet<String>)> = rewriting
        .into_iter()
        .map(|file| {
            let deps: BTreeSet<String> = find_references(
                &file.path,
                &file.bytes,
                hashed_rewriting.iter().map(String::as_str),
            );
            (file, deps)
        })
        .collect();

    let mut settled: HashSet<String> = HashSet::new();
    let mut cyclic: Vec<String> = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|(_, deps)| deps.iter().all(|d| settled.contains(d)));

        if ready.is_empty() {
            cyclic = blocked.iter().map(|(f, _)| f.path.clone()).collect();
            log::warn!(
                "Reference cycle between {} files, publishing them together: {}",
                cyclic.len(),
                cyclic.join(", ")
            );
            waves.push(blocked.into_iter().map(|(f, _)| f).collect());
            break;
        }

        settled.extend(ready.iter().map(|(f, _)| f.path.clone()));
        waves.push(ready.into_iter().map(|(f, _)| f).collect());
        remaining = blocked;
    }

    WavePlan {
        waves,
        literal_names,
        cyclic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::PublishOptions;
    use hoist_filesystem::PreserveSet;

    fn file(path: &str, text: &str) -> LogicalFile {
        LogicalFile::new(path, text.as_bytes())
    }

    fn paths(wave: &[LogicalFile]) -> Vec<&str> {
        wave.iter().map(|f| f.path.as_str()).collect()
    }

    fn plan(files: Vec<LogicalFile>) -> WavePlan {
        let policy: NamingPolicy =
            NamingPolicy::new(&PublishOptions::default(), PreserveSet::default());
        plan_waves(files, &TransformRegistry::default(), &policy)
    }

    #[test]
    fn test_plain_files_first_then_dependents() {
        let plan: WavePlan = plan(vec![
            file("about.html", r#"<link href="/css/site.css"><a href="/index.html">"#),
            file("css/base.css", "body{}"),
            file("css/site.css", "@import url(./base.css); url(/img/a.png)"),
            file("img/a.png", "png"),
            file("index.html", r#"<a href="/about.html">"#),
        ]);

        assert_eq!(plan.waves.len(), 4);
        assert_eq!(paths(&plan.waves[0]), vec!["img/a.png"]);
        assert_eq!(paths(&plan.waves[1]), vec!["css/base.css", "index.html"]);
        assert_eq!(paths(&plan.waves[2]), vec!["css/site.css"]);
        assert_eq!(paths(&plan.waves[3]), vec!["about.html"]);
        assert_eq!(plan.file_count(), 5);
        assert!(plan.cyclic.is_empty());
    }

    #[test]
    fn test_literal_names_known_up_front() {
        let plan: WavePlan = plan(vec![
            file("about.html", ""),
            file("index.html", ""),
            file("css/site.css", ""),
        ]);

        assert_eq!(plan.literal_names.get("about.html"), Some("about"));
        assert_eq!(plan.literal_names.get("index.html"), Some("index.html"));
        assert_eq!(plan.literal_names.get("css/site.css"), None);
    }

    #[test]
    fn test_markup_links_do_not_form_cycles() {
        let plan: WavePlan = plan(vec![
            file("a.html", r#"<a href="/b.html">"#),
            file("b.html", r#"<a href="/a.html">"#),
        ]);

        assert_eq!(plan.waves.len(), 1);
        assert!(plan.cyclic.is_empty());
    }

    #[test]
    fn test_cycle_is_published_together() {
        let plan: WavePlan = plan(vec![
            file("a.css", "@import '/b.css';"),
            file("b.css", "@import '/a.css';"),
            file("c.css", "body{}"),
        ]);

        assert_eq!(plan.waves.len(), 2);
        assert_eq!(paths(&plan.waves[0]), vec!["c.css"]);
        assert_eq!(paths(&plan.waves[1]), vec!["a.css", "b.css"]);
        assert_eq!(plan.cyclic, vec!["a.css".to_string(), "b.css".to_string()]);
    }

    #[test]
    fn test_empty_input() {
        let plan: WavePlan = plan(Vec::new());
        assert!(plan.waves.is_empty());
    }
}
