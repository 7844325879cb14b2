//! Reference scanning for stylesheet and script text.
//!
//! Scanning and rewriting are split so callers can resolve (and, in the
//! asset store, fetch) every reference before the text is rebuilt.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::Url;

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^'"()\s][^)\s]*))\s*\)"#)
        .expect("static pattern")
});

static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("static pattern")
});

const SCRIPT_ASSET_EXTENSIONS: &str = "png|jpe?g|gif|svg|webp|woff2?|ttf|eot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `url(...)` in CSS
    Url,
    /// `@import "..."` in CSS
    Import,
    /// Quoted asset URL inside a script; the range covers the URL only.
    ScriptLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReference {
    pub range: Range<usize>,
    pub raw: String,
    pub kind: ReferenceKind,
}

impl PayloadReference {
    fn replacement(&self, target: &str) -> String {
        match self.kind {
            ReferenceKind::Url => format!("url({target})"),
            ReferenceKind::Import => format!("@import \"{target}\""),
            ReferenceKind::ScriptLiteral => target.to_string(),
        }
    }
}

/// Finds `url()` and `@import` references. Empty, `data:` and fragment-only
/// references are skipped.
pub fn scan_stylesheet(css: &str) -> Vec<PayloadReference> {
    let mut found = Vec::new();

    for (pattern, kind) in [(&*CSS_URL, ReferenceKind::Url), (&*CSS_IMPORT, ReferenceKind::Import)] {
        for caps in pattern.captures_iter(css) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(value) = (1..=3).find_map(|i| caps.get(i)) else {
                continue;
            };
            let raw = value.as_str().trim();
            if is_inert(raw) {
                continue;
            }
            found.push(PayloadReference {
                range: whole.range(),
                raw: raw.to_string(),
                kind,
            });
        }
    }

    found.sort_by_key(|r| r.range.start);
    let mut last_end = 0;
    found.retain(|r| {
        let keep = r.range.start >= last_end;
        if keep {
            last_end = r.range.end;
        }
        keep
    });
    found
}

fn is_inert(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    raw.is_empty()
        || raw.starts_with('#')
        || lower.starts_with("data:")
        || lower.starts_with("about:")
        || lower.starts_with("blob:")
}

/// Finds quoted string literals in script text that point at an image or
/// font on the site's own host.
#[derive(Debug, Clone)]
pub struct ScriptScanner {
    /// `None` when no pattern could be built for the host; nothing matches.
    pattern: Option<Regex>,
}

impl ScriptScanner {
    pub fn new(site: &Url) -> Self {
        let host = regex::escape(site.host_str().unwrap_or_default());
        let pattern = Regex::new(&format!(
            r#"(?i)(["'`])((?:https?:)?//{host}(?::\d+)?/[^"'`\s]*\.(?:{SCRIPT_ASSET_EXTENSIONS}))(["'`])"#
        ))
        .map_err(|e| warn!(host = %host, error = %e, "script scanner disabled"))
        .ok();
        Self { pattern }
    }

    pub fn scan(&self, js: &str) -> Vec<PayloadReference> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(js)
            .filter_map(|caps| {
                let open = caps.get(1)?;
                let close = caps.get(3)?;
                if open.as_str() != close.as_str() {
                    return None;
                }
                let url = caps.get(2)?;
                Some(PayloadReference {
                    range: url.range(),
                    raw: url.as_str().to_string(),
                    kind: ReferenceKind::ScriptLiteral,
                })
            })
            .collect()
    }
}

/// Rebuilds `text`, replacing each reference for which `target` returns a
/// new location. References must be sorted and non-overlapping, as returned
/// by the scanners.
pub fn rewrite_references<F>(text: &str, refs: &[PayloadReference], mut target: F) -> String
where
    F: FnMut(&PayloadReference) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for reference in refs {
        if reference.range.start < cursor || reference.range.end > text.len() {
            continue;
        }
        if let Some(location) = target(reference) {
            out.push_str(&text[cursor..reference.range.start]);
            out.push_str(&reference.replacement(&location));
            cursor = reference.range.end;
        }
    }

    out.push_str(&text[cursor..]);
    out
}
