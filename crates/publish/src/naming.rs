//! Remote naming policy.
//!
//! Decides, per artifact, whether its remote name is content-addressed
//! (`<dir>/<hash>`, extension dropped) or literal, and which cache policy it
//! is served with.
//!
//! Literal names are kept for well-known names and prefixes, the preserve
//! list and never-cache content types. Markup is always served under its
//! literal path with the extension stripped (`blog/post.html` becomes
//! `blog/post`), except when the file is well-known or preserved, and is
//! always revalidated.

use std::collections::HashSet;

use hoist_common::{
    cache_entry, file_name, hash_bytes, split_parent, strip_extension, CACHE_CONTROL_IMMUTABLE,
    CACHE_CONTROL_NO_CACHE, CONTENT_TYPE_HTML,
};
use hoist_filesystem::PreserveSet;
use hoist_storage::ObjectHeaders;

use crate::options::PublishOptions;
use crate::transform::TransformOutput;

/// One publishable unit of bytes bound to exactly one remote name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Relative name the artifact was produced under.
    pub source: String,
    /// Object key in the destination bucket.
    pub remote_name: String,
    /// Final bytes.
    pub bytes: Vec<u8>,
    /// Headers written with the object.
    pub headers: ObjectHeaders,
    /// Whether the remote name is literal rather than content-addressed.
    pub literal: bool,
}

impl Artifact {
    /// Identity of this exact object at this exact location.
    pub fn cache_entry(&self) -> String {
        cache_entry(&self.remote_name, &self.bytes)
    }
}

/// Naming and cache policy for one run.
#[derive(Debug, Clone, Default)]
pub struct NamingPolicy {
    well_known_names: HashSet<String>,
    well_known_prefixes: Vec<String>,
    never_cache: HashSet<String>,
    preserve: PreserveSet,
}

impl NamingPolicy {
    /// Build the policy from run options and the resolved preserve list.
    pub fn new(options: &PublishOptions, preserve: PreserveSet) -> Self {
        Self {
            well_known_names: options.well_known_names.iter().cloned().collect(),
            well_known_prefixes: options.well_known_prefixes.clone(),
            never_cache: options
                .never_cache
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            preserve,
        }
    }

    /// Whether a path must keep exactly its local name.
    ///
    /// Well-known names and prefixes and the preserve list. Takes precedence
    /// over every other naming rule.
    pub fn is_pinned(&self, path: &str) -> bool {
        self.well_known_names.contains(file_name(path))
            || self
                .well_known_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
            || self.preserve.contains(path)
    }

    /// Whether a path of the given content type gets a literal name.
    pub fn is_literal(&self, path: &str, content_type: &str) -> bool {
        is_markup(content_type)
            || self.is_pinned(path)
            || self.never_cache.contains(&content_type.to_ascii_lowercase())
    }

    /// Remote name of a literal artifact, or `None` if it is
    /// content-addressed.
    ///
    /// Depends only on the path, so it is known before any bytes are
    /// transformed.
    pub fn literal_name(&self, path: &str, content_type: &str) -> Option<String> {
        if self.is_pinned(path) {
            return Some(path.to_string());
        }
        if is_markup(content_type) {
            return Some(strip_extension(path).to_string());
        }
        if self.is_literal(path, content_type) {
            return Some(path.to_string());
        }
        None
    }

    /// Remote name for final bytes produced under `path`.
    pub fn remote_name(&self, path: &str, content_type: &str, bytes: &[u8]) -> String {
        match self.literal_name(path, content_type) {
            Some(name) => name,
            None => content_addressed_name(path, bytes),
        }
    }

    /// Cache policy for an artifact.
    fn cache_control(&self, output: &TransformOutput, literal: bool) -> String {
        if is_markup(&output.content_type) {
            return CACHE_CONTROL_NO_CACHE.to_string();
        }
        match (&output.cache_control, literal) {
            (Some(policy), _) => policy.clone(),
            (None, true) => CACHE_CONTROL_NO_CACHE.to_string(),
            (None, false) => CACHE_CONTROL_IMMUTABLE.to_string(),
        }
    }

    /// Bind a transform output to its remote name and headers.
    pub fn name_artifact(&self, output: TransformOutput) -> Artifact {
        let literal: bool = self.is_literal(&output.relative_name, &output.content_type);
        let remote_name: String =
            self.remote_name(&output.relative_name, &output.content_type, &output.bytes);
        let cache_control: String = self.cache_control(&output, literal);

        let mut headers: ObjectHeaders = ObjectHeaders::new(output.content_type, cache_control)
            .with_original_size(output.original_size);
        if let Some(encoding) = output.content_encoding {
            headers = headers.with_content_encoding(encoding);
        }

        Artifact {
            source: output.relative_name,
            remote_name,
            bytes: output.bytes,
            headers,
            literal,
        }
    }
}

/// `<dir>/<hash>` for bytes produced under `path`.
pub fn content_addressed_name(path: &str, bytes: &[u8]) -> String {
    let (parent, _) = split_parent(path);
    format!("{}{}", parent, hash_bytes(bytes))
}

fn is_markup(content_type: &str) -> bool {
    content_type.eq_ignore_ascii_case(CONTENT_TYPE_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(preserve: &[&str], tree: &[&str]) -> NamingPolicy {
        let patterns: Vec<String> = preserve.iter().map(|p| p.to_string()).collect();
        let preserve: PreserveSet =
            PreserveSet::resolve(&patterns, tree.iter().copied()).unwrap();
        NamingPolicy::new(
            &PublishOptions::default().with_never_cache(vec!["application/manifest+json".into()]),
            preserve,
        )
    }

    fn output(path: &str, content_type: &str, bytes: &[u8]) -> TransformOutput {
        TransformOutput::new(path, bytes.to_vec(), content_type)
    }

    #[test]
    fn test_content_addressed_keeps_directory() {
        let policy: NamingPolicy = policy(&[], &[]);
        let artifact: Artifact = policy.name_artifact(output("img/a.png", "image/png", b"png"));

        assert_eq!(artifact.remote_name, format!("img/{}", hash_bytes(b"png")));
        assert!(!artifact.literal);
        assert_eq!(artifact.headers.cache_control, CACHE_CONTROL_IMMUTABLE);
    }

    #[test]
    fn test_markup_is_bare_and_revalidated() {
        let policy: NamingPolicy = policy(&[], &[]);
        let artifact: Artifact =
            policy.name_artifact(output("blog/post.html", "text/html", b"<p>"));

        assert_eq!(artifact.remote_name, "blog/post");
        assert!(artifact.literal);
        assert_eq!(artifact.headers.cache_control, CACHE_CONTROL_NO_CACHE);
    }

    #[test]
    fn test_markup_ignores_cache_override() {
        let policy: NamingPolicy = policy(&[], &[]);
        let mut out: TransformOutput = output("about.html", "text/html", b"<p>");
        out.cache_control = Some(CACHE_CONTROL_IMMUTABLE.to_string());

        let artifact: Artifact = policy.name_artifact(out);
        assert_eq!(artifact.headers.cache_control, CACHE_CONTROL_NO_CACHE);
    }

    #[test]
    fn test_well_known_names_stay_literal() {
        let policy: NamingPolicy = policy(&[], &[]);

        assert_eq!(policy.remote_name("index.html", "text/html", b"x"), "index.html");
        assert_eq!(policy.remote_name("docs/index.html", "text/html", b"x"), "docs/index.html");
        assert_eq!(policy.remote_name("404.html", "text/html", b"x"), "404.html");
        assert_eq!(policy.remote_name("robots.txt", "text/plain", b"x"), "robots.txt");

        let favicon: Artifact =
            policy.name_artifact(output("favicon.ico", "image/x-icon", b"ico"));
        assert_eq!(favicon.remote_name, "favicon.ico");
        assert_eq!(favicon.headers.cache_control, CACHE_CONTROL_NO_CACHE);
    }

    #[test]
    fn test_well_known_prefix() {
        let policy: NamingPolicy = policy(&[], &[]);
        assert_eq!(
            policy.remote_name(".well-known/security.txt", "text/plain", b"x"),
            ".well-known/security.txt"
        );
    }

    #[test]
    fn test_preserve_wins_over_hashing_and_bare_markup() {
        let policy: NamingPolicy = policy(
            &["downloads/*.pdf", "legacy/*.html"],
            &["downloads/cv.pdf", "legacy/old.html", "img/a.png"],
        );

        assert_eq!(
            policy.remote_name("downloads/cv.pdf", "application/pdf", b"v1"),
            "downloads/cv.pdf"
        );
        assert_eq!(
            policy.remote_name("legacy/old.html", "text/html", b"x"),
            "legacy/old.html"
        );
        assert_ne!(policy.remote_name("img/a.png", "image/png", b"x"), "img/a.png");
    }

    #[test]
    fn test_never_cache_content_type() {
        let policy: NamingPolicy = policy(&[], &[]);
        assert_eq!(
            policy.remote_name("site.webmanifest", "application/manifest+json", b"{}"),
            "site.webmanifest"
        );
    }

    #[test]
    fn test_literal_name_is_path_only() {
        let policy: NamingPolicy = policy(&[], &[]);
        assert_eq!(policy.literal_name("a.css", "text/css"), None);
        assert_eq!(policy.literal_name("a.html", "text/html"), Some("a".to_string()));
    }

    #[test]
    fn test_headers_carry_encoding_and_size() {
        let policy: NamingPolicy = policy(&[], &[]);
        let mut out: TransformOutput = output("a.css", "text/css", b"zz");
        out.content_encoding = Some("gzip".into());
        out.original_size = 100;

        let artifact: Artifact = policy.name_artifact(out);
        assert_eq!(artifact.headers.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(artifact.headers.original_size, Some(100));
        assert_eq!(artifact.cache_entry(), cache_entry(&artifact.remote_name, b"zz"));
    }
}
