//! URL-to-path algebra shared by the page rewriter and the asset store.
//!
//! Every function here is pure. [`derive_filename`] is the only place where
//! strings taken from page, stylesheet or script content become filesystem
//! names, so every branch of it ends in either a validated name or
//! [`hash_filename`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use sanitize_filename::Options as SanitizeOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use xxhash_rust::xxh3::xxh3_128;

use crate::file_manager::ASSETS_DIR;

/// Extensions that may be stored under their own name. Audio and video are
/// left out to bound disk usage, archives to avoid nested packaging.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "css", "js", "jpg", "jpeg", "png", "gif", "svg", "webp", "avif", "ico", "bmp", "woff",
    "woff2", "ttf", "otf", "eot", "pdf",
];

/// Extension given to hash-named fallback files.
pub const HASH_EXTENSION: &str = "dat";

const DANGEROUS_EXTENSIONS: &[&str] = &[
    "php", "phtml", "php3", "php4", "php5", "phps", "pht", "phar", "sh", "bash", "cgi", "pl",
    "py", "exe", "bat", "com",
];

const MAX_VERSION_LEN: usize = 20;
const MAX_FILENAME_LEN: usize = 255;

/// Coarse classification of a localized resource, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Stylesheet,
    Script,
    Image,
    Font,
    Document,
    Other,
}

impl ResourceType {
    pub fn of_filename(name: &str) -> Self {
        match extension_of(name).as_deref() {
            Some("css") => ResourceType::Stylesheet,
            Some("js") => ResourceType::Script,
            Some("jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp") => {
                ResourceType::Image
            }
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => ResourceType::Font,
            Some("pdf") => ResourceType::Document,
            _ => ResourceType::Other,
        }
    }
}

/// Resolves `url` against `base`.
///
/// Handles protocol-relative (`//host/x`), root-relative (`/x`) and
/// document-relative (`x`, `../x`) references; absolute http(s) URLs are
/// parsed as they are. Anything that does not end up as an http(s) URL
/// (`data:`, `mailto:`, garbage) yields `None`.
pub fn absolute(url: &str, base: &Url) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let resolved = if has_http_scheme(url) {
        Url::parse(url).ok()?
    } else if url.starts_with("//") {
        Url::parse(&format!("{}:{}", base.scheme(), url)).ok()?
    } else {
        base.join(url).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Hostname comparison, case-insensitive. Ports and schemes are ignored.
pub fn is_same_origin(url: &Url, base: &Url) -> bool {
    match (url.host_str(), base.host_str()) {
        (Some(host), Some(site)) => host.eq_ignore_ascii_case(site),
        _ => false,
    }
}

/// Canonical string under which an asset URL is queued, fetched and named:
/// dot segments collapsed, fragment dropped.
pub fn asset_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    normalize_path(url.as_str())
}

/// Collapses `.` and `..` path segments with a stack; query and fragment are kept.
///
/// `..` above the root is dropped. Empty segments disappear, so the result
/// never carries a trailing slash other than the root itself.
pub fn normalize_path(url: &str) -> String {
    let (prefix, rest) = match url.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            let authority_end = url[authority_start..]
                .find(['/', '?', '#'])
                .map(|i| authority_start + i)
                .unwrap_or(url.len());
            url.split_at(authority_end)
        }
        None => ("", url),
    };

    let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, suffix) = rest.split_at(path_end);

    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    format!("{}/{}{}", prefix, stack.join("/"), suffix)
}

/// Filesystem-safe directory segments of a request path.
///
/// Query and fragment are ignored, `.`/`..` segments are dropped and every
/// remaining segment keeps only `[A-Za-z0-9._-]`.
pub fn page_segments(request_path: &str) -> Vec<String> {
    let path_end = request_path.find(['?', '#']).unwrap_or(request_path.len());
    request_path[..path_end]
        .split('/')
        .map(|segment| {
            segment
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect::<String>()
        })
        .filter(|segment| !segment.is_empty() && !segment.chars().all(|c| c == '.'))
        .collect()
}

/// Number of directory levels between the static root and the page captured for `request_path`.
pub fn depth_of(request_path: &str) -> usize {
    page_segments(request_path).len()
}

/// `"../"` repeated `depth` times.
pub fn depth_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Location of the captured page relative to the static root:
/// `index.html` for the root, `<segments>/index.html` otherwise.
pub fn page_file_path(request_path: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for segment in page_segments(request_path) {
        path.push(segment);
    }
    path.push("index.html");
    path
}

/// Whether a page captured for `request_path` would land inside the flat
/// asset directory. Compared case-insensitively for case-folding filesystems.
pub fn is_reserved_path(request_path: &str) -> bool {
    page_segments(request_path)
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case(ASSETS_DIR))
}

/// Lowercased extension of a file name, if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_allowed_extension(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext)
}

/// Deterministic local filename for an asset URL.
///
/// The path basename is kept when its extension is allow-listed; a `ver=`
/// query value is spliced in front of the extension (`style.css?ver=5` →
/// `style.5.css`). Anything suspicious yields [`hash_filename`].
pub fn derive_filename(url: &str) -> String {
    validated_filename(url).unwrap_or_else(|| hash_filename(url))
}

/// Hash-named fallback, stable for a given URL.
pub fn hash_filename(url: &str) -> String {
    format!("{:032x}.{}", xxh3_128(url.as_bytes()), HASH_EXTENSION)
}

/// Registry of local asset names and the URL owning each one.
///
/// [`derive_filename`] is deterministic but not injective (`/a/logo.png` and
/// `/b/logo.png` both derive `logo.png`). The first URL to claim a name keeps
/// it; later URLs deriving the same name get their [`hash_filename`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetNames {
    owners: BTreeMap<String, String>,
}

impl AssetNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local filename for `url`, claiming it if unowned.
    pub fn local_name(&mut self, url: &str) -> String {
        let derived = derive_filename(url);
        match self.owners.get(&derived) {
            Some(owner) if owner == url => derived,
            Some(owner) => {
                debug!(url, owner = %owner, name = %derived, "derived name taken, using hash name");
                let fallback = hash_filename(url);
                self.owners
                    .entry(fallback.clone())
                    .or_insert_with(|| url.to_string());
                fallback
            }
            None => {
                self.owners.insert(derived.clone(), url.to_string());
                derived
            }
        }
    }

    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.owners.get(name).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.owners.len()
    }
}

fn validated_filename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let decoded = urlencoding::decode(parsed.path()).ok()?;
    let path = decoded.replace('\0', "").replace('\\', "/");

    let base = path.rsplit('/').next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }

    let ext = extension_of(base)?;
    if !is_allowed_extension(&ext) {
        debug!(url, ext = %ext, "extension not allow-listed, using hash name");
        return None;
    }

    let mut name = sanitize_component(base);
    if let Some(version) = version_token(&parsed) {
        name = splice_version(&name, &version);
    }
    let name = sanitize_component(&name);

    if has_dangerous_pattern(&name) {
        warn!(url, name = %name, "dangerous pattern in derived filename, using hash name");
        return None;
    }

    let final_ext = extension_of(&name)?;
    if !is_allowed_extension(&final_ext) {
        return None;
    }

    Some(truncate_keeping_extension(name, &final_ext))
}

/// Reduces a name to `[A-Za-z0-9._-]`, whitespace becoming `-`, with
/// separators trimmed from both ends.
fn sanitize_component(raw: &str) -> String {
    let options = SanitizeOptions {
        truncate: false,
        windows: true,
        replacement: "",
    };
    let cleaned = sanitize_filename::sanitize_with_options(raw, options);

    let filtered: String = cleaned
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('-'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    filtered
        .trim_matches(|c| matches!(c, '.' | '-' | '_'))
        .to_string()
}

fn version_token(url: &Url) -> Option<String> {
    let (_, raw) = url
        .query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("ver"))?;

    let version = sanitize_component(&raw)
        .replace("..", "")
        .replace(['/', '\\'], "");
    let version: String = version.chars().take(MAX_VERSION_LEN).collect();
    let version = version.trim_matches('.').to_string();

    let safe = !version.is_empty()
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    safe.then_some(version)
}

fn splice_version(name: &str, version: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.{version}.{ext}"),
        None => format!("{name}.{version}"),
    }
}

fn has_dangerous_pattern(name: &str) -> bool {
    if name.contains("..") || name.contains(['/', '\\', '\0']) {
        return true;
    }
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    // Every dot-separated part between the stem and the final extension.
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() > 2
        && parts[1..parts.len() - 1]
            .iter()
            .any(|part| DANGEROUS_EXTENSIONS.contains(&part.to_ascii_lowercase().as_str()))
}

fn truncate_keeping_extension(name: String, ext: &str) -> String {
    if name.len() <= MAX_FILENAME_LEN {
        return name;
    }
    let keep = MAX_FILENAME_LEN - ext.len() - 1;
    format!("{}.{}", &name[..keep], ext)
}
