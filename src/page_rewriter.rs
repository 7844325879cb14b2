//! Converts a rendered live page into a self-contained static page.
//!
//! One streaming pass over the document extracts same-origin assets,
//! points their references at the shared `assets/` directory, turns
//! internal links into static-tree paths and drops tags that only make
//! sense on the live server. Every step leaves markup it does not
//! understand untouched, and a failed pass returns the input unchanged.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeSet;

use html_escape::decode_html_entities;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, text, HandlerResult, HtmlRewriter, Settings};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::error::RewriteError;
use crate::payload::{rewrite_references, scan_stylesheet};
use crate::staleness::GenerationStamp;
use crate::url_resolver::{
    self, asset_key, depth_of, depth_prefix, extension_of, is_allowed_extension, is_same_origin,
    page_segments, AssetNames, ResourceType,
};

/// `<link rel>` tokens for live-server discovery endpoints.
const REMOVED_LINK_RELS: &[&str] = &[
    "https://api.w.org/",
    "alternate",
    "edituri",
    "wlwmanifest",
    "shortlink",
];

const EMOJI_SCRIPT_MARKER: &str = "wp-emoji-release.min.js";

const SOCIAL_IMAGE_META: &[&str] = &["og:image", "og:image:url", "twitter:image"];

const INERT_LINK_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:", "data:"];

static SCRIPT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script\b[^>]*>").expect("static pattern"));

static BODY_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</body\s*>").expect("static pattern"));

/// A same-origin resource referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    /// Canonical absolute URL, as queued for download.
    pub url: String,
    /// Name the page now references under `assets/`.
    pub filename: String,
    pub kind: ResourceType,
}

#[derive(Debug, Clone)]
pub struct RewrittenPage {
    pub html: String,
    /// Deduplicated, in document order.
    pub assets: Vec<DiscoveredAsset>,
    pub links_rewritten: usize,
}

#[derive(Debug, Clone)]
pub struct PageRewriter {
    site: Url,
}

impl PageRewriter {
    pub fn new(site: Url) -> Self {
        Self { site }
    }

    /// Live URL of the page served for `request_path`.
    pub fn page_url(&self, request_path: &str) -> Url {
        self.site
            .join(request_path)
            .unwrap_or_else(|_| self.site.clone())
    }

    /// Rewrites `html` as captured for `request_path` and stamps it.
    ///
    /// Stamp-shaped comments already in `html` are dropped. Names are
    /// claimed in `names`; on failure `names` is left as it was and the page
    /// comes back otherwise unmodified, unstamped and with no assets.
    pub fn rewrite(
        &self,
        html: &str,
        request_path: &str,
        stamp: &GenerationStamp,
        names: &mut AssetNames,
    ) -> RewrittenPage {
        let html = GenerationStamp::strip(html);
        let mut working = names.clone();
        match self.try_rewrite(&html, request_path, &mut working) {
            Ok(mut page) => {
                *names = working;
                page.html = append_generation_comment(page.html, stamp);
                debug!(
                    request_path,
                    assets = page.assets.len(),
                    links = page.links_rewritten,
                    "page rewritten"
                );
                page
            }
            Err(e) => {
                warn!(request_path, error = %e, "page rewrite failed, keeping original markup");
                RewrittenPage {
                    html: html.into_owned(),
                    assets: Vec::new(),
                    links_rewritten: 0,
                }
            }
        }
    }

    fn try_rewrite(
        &self,
        html: &str,
        request_path: &str,
        names: &mut AssetNames,
    ) -> Result<RewrittenPage, RewriteError> {
        let input = strip_emoji_scripts(html);
        let ctx = RefCell::new(PageContext {
            site: &self.site,
            page_url: self.page_url(request_path),
            prefix: depth_prefix(depth_of(request_path)),
            names,
            assets: Vec::new(),
            seen: BTreeSet::new(),
            links_rewritten: 0,
            style_buffer: String::new(),
        });

        let mut output = Vec::with_capacity(input.len() + 256);
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("link", |el| {
                        let rel = el.get_attribute("rel").unwrap_or_default().to_ascii_lowercase();
                        if rel
                            .split_whitespace()
                            .any(|token| REMOVED_LINK_RELS.contains(&token))
                        {
                            el.remove();
                            return Ok(());
                        }
                        let Some(href) = el.get_attribute("href") else {
                            return Ok(());
                        };
                        let href = decode_html_entities(&href).into_owned();
                        if is_asset_link(&rel, &href) {
                            if let Some(local) = ctx.borrow_mut().localize(&href) {
                                el.set_attribute("href", &local)?;
                            }
                        }
                        Ok(())
                    }),
                    element!("script[src]", |el| localize_attr(&ctx, el, "src")),
                    element!("img", |el| {
                        localize_attr(&ctx, el, "src")?;
                        localize_srcset_attr(&ctx, el)
                    }),
                    element!("source[srcset]", |el| localize_srcset_attr(&ctx, el)),
                    element!("video[poster]", |el| localize_attr(&ctx, el, "poster")),
                    element!("meta", |el| {
                        let name = el.get_attribute("name").unwrap_or_default().to_ascii_lowercase();
                        if name == "generator" {
                            el.remove();
                            return Ok(());
                        }
                        let property = el
                            .get_attribute("property")
                            .unwrap_or_default()
                            .to_ascii_lowercase();
                        if SOCIAL_IMAGE_META.contains(&name.as_str())
                            || SOCIAL_IMAGE_META.contains(&property.as_str())
                        {
                            localize_attr(&ctx, el, "content")?;
                        }
                        Ok(())
                    }),
                    element!("[style]", |el| {
                        if let Some(raw) = el.get_attribute("style") {
                            let css = decode_html_entities(&raw).into_owned();
                            let rewritten = ctx.borrow_mut().localize_css(&css);
                            if rewritten != css {
                                el.set_attribute("style", &rewritten)?;
                            }
                        }
                        Ok(())
                    }),
                    element!("[data-wp-strategy]", |el| {
                        el.remove_attribute("data-wp-strategy");
                        Ok(())
                    }),
                    element!("a[href]", |el| {
                        let Some(raw) = el.get_attribute("href") else {
                            return Ok(());
                        };
                        let href = decode_html_entities(&raw).into_owned();
                        if let Some(target) = ctx.borrow_mut().rewrite_link(&href) {
                            el.set_attribute("href", &target)?;
                        }
                        Ok(())
                    }),
                    text!("style", |chunk| {
                        let mut ctx = ctx.borrow_mut();
                        ctx.style_buffer.push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let css = std::mem::take(&mut ctx.style_buffer);
                            let rewritten = ctx.localize_css(&css);
                            chunk.replace(&rewritten, ContentType::Html);
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter.write(input.as_bytes())?;
        rewriter.end()?;

        let ctx = ctx.into_inner();
        Ok(RewrittenPage {
            html: String::from_utf8(output)?,
            assets: ctx.assets,
            links_rewritten: ctx.links_rewritten,
        })
    }
}

struct PageContext<'a> {
    site: &'a Url,
    page_url: Url,
    prefix: String,
    names: &'a mut AssetNames,
    assets: Vec<DiscoveredAsset>,
    seen: BTreeSet<String>,
    links_rewritten: usize,
    style_buffer: String,
}

impl PageContext<'_> {
    /// Local reference for a same-origin asset, recording it as discovered.
    fn localize(&mut self, value: &str) -> Option<String> {
        let url = url_resolver::absolute(value, &self.page_url)?;
        if !is_same_origin(&url, self.site) {
            return None;
        }

        let fragment = url.fragment().map(|f| format!("#{f}")).unwrap_or_default();
        let key = asset_key(&url);
        let name = self.names.local_name(&key);
        if self.seen.insert(key.clone()) {
            self.assets.push(DiscoveredAsset {
                kind: ResourceType::of_filename(&name),
                filename: name.clone(),
                url: key,
            });
        }
        Some(format!("{}assets/{}{}", self.prefix, name, fragment))
    }

    /// Rewrites each candidate of a `srcset` list, keeping descriptors.
    fn localize_srcset(&mut self, srcset: &str) -> Option<String> {
        let mut changed = false;
        let candidates: Vec<String> = srcset
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| {
                let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                    Some((url, descriptor)) => (url, Some(descriptor.trim())),
                    None => (candidate, None),
                };
                match self.localize(url) {
                    Some(local) => {
                        changed = true;
                        match descriptor {
                            Some(d) => format!("{local} {d}"),
                            None => local,
                        }
                    }
                    None => candidate.to_string(),
                }
            })
            .collect();
        changed.then(|| candidates.join(", "))
    }

    fn localize_css(&mut self, css: &str) -> String {
        let refs = scan_stylesheet(css);
        if refs.is_empty() {
            return css.to_string();
        }
        rewrite_references(css, &refs, |reference| self.localize(&reference.raw))
    }

    /// Static-tree target for an internal navigation link.
    fn rewrite_link(&mut self, href: &str) -> Option<String> {
        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || INERT_LINK_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
        {
            return None;
        }

        let url = url_resolver::absolute(href, &self.page_url)?;
        if !is_same_origin(&url, self.site) {
            return None;
        }

        let segments = page_segments(url.path());
        if let Some(ext) = segments.last().and_then(|last| file_extension(last)) {
            return if is_allowed_extension(&ext) {
                self.localize(href)
            } else {
                None
            };
        }

        let mut target = self.prefix.clone();
        if !segments.is_empty() {
            target.push_str(&segments.join("/"));
            target.push('/');
        }
        target.push_str("index.html");
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            target.push('#');
            target.push_str(fragment);
        }
        self.links_rewritten += 1;
        Some(target)
    }
}

fn localize_attr(ctx: &RefCell<PageContext<'_>>, el: &mut Element<'_, '_>, attr: &str) -> HandlerResult {
    if let Some(raw) = el.get_attribute(attr) {
        let value = decode_html_entities(&raw).into_owned();
        if let Some(local) = ctx.borrow_mut().localize(&value) {
            el.set_attribute(attr, &local)?;
        }
    }
    Ok(())
}

fn localize_srcset_attr(ctx: &RefCell<PageContext<'_>>, el: &mut Element<'_, '_>) -> HandlerResult {
    if let Some(raw) = el.get_attribute("srcset") {
        let srcset = decode_html_entities(&raw).into_owned();
        if let Some(rewritten) = ctx.borrow_mut().localize_srcset(&srcset) {
            el.set_attribute("srcset", &rewritten)?;
        }
    }
    Ok(())
}

/// Stylesheets, icons and anything whose path names a static resource.
fn is_asset_link(rel: &str, href: &str) -> bool {
    if rel
        .split_whitespace()
        .any(|token| token == "stylesheet" || token.contains("icon"))
    {
        return true;
    }
    let path_end = href.find(['?', '#']).unwrap_or(href.len());
    let last = href[..path_end].rsplit('/').next().unwrap_or_default();
    match extension_of(last) {
        Some(ext) => {
            is_allowed_extension(&ext) && ResourceType::of_filename(last) != ResourceType::Document
        }
        None => false,
    }
}

/// Extension of a path segment when it looks like a file name
/// (`report.pdf`, `feed.xml`), not a dotted slug (`release-1.2`).
fn file_extension(segment: &str) -> Option<String> {
    extension_of(segment).filter(|ext| ext.chars().any(|c| c.is_ascii_alphabetic()))
}

/// Removes `<script>` elements that load or inline the emoji bootstrap.
fn strip_emoji_scripts(html: &str) -> Cow<'_, str> {
    if !html.contains(EMOJI_SCRIPT_MARKER) {
        return Cow::Borrowed(html);
    }

    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    for open in SCRIPT_OPEN.find_iter(html) {
        if open.start() < cursor {
            continue;
        }
        let Some(close_offset) = lower[open.end()..].find("</script") else {
            break;
        };
        let close_start = open.end() + close_offset;
        let close_end = html[close_start..]
            .find('>')
            .map(|i| close_start + i + 1)
            .unwrap_or(html.len());

        if html[open.start()..close_end].contains(EMOJI_SCRIPT_MARKER) {
            out.push_str(&html[cursor..open.start()]);
            cursor = close_end;
        }
    }

    out.push_str(&html[cursor..]);
    Cow::Owned(out)
}

/// Inserts the human-readable notice and the machine stamp before the
/// last `</body>`, or at the end when there is none.
fn append_generation_comment(mut html: String, stamp: &GenerationStamp) -> String {
    let comment = format!(
        "\n<!-- Static version generated: {} -->\n<!-- To use offline: open index.html in a browser -->\n{}\n",
        stamp.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        stamp.render()
    );
    match BODY_CLOSE.find_iter(&html).last().map(|m| m.start()) {
        Some(at) => html.insert_str(at, &comment),
        None => html.push_str(&comment),
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_resolver::hash_filename;
    use chrono::{TimeZone, Utc};

    fn rewriter() -> PageRewriter {
        PageRewriter::new(Url::parse("https://example.com/").unwrap())
    }

    fn stamp() -> GenerationStamp {
        GenerationStamp::new(Utc.with_ymd_and_hms(2026, 5, 4, 3, 2, 1).unwrap(), "1.0.0")
    }

    fn rewrite(html: &str, path: &str) -> RewrittenPage {
        rewriter().rewrite(html, path, &stamp(), &mut AssetNames::new())
    }

    fn urls(page: &RewrittenPage) -> Vec<&str> {
        page.assets.iter().map(|a| a.url.as_str()).collect()
    }

    #[test]
    fn test_root_page_assets_and_links() {
        let page = rewrite(
            r#"<link rel="stylesheet" href="/style.css?ver=5"><a href="/about/">About</a>"#,
            "/",
        );
        assert!(page.html.contains(r#"href="assets/style.5.css""#), "{}", page.html);
        assert!(page.html.contains(r#"href="about/index.html""#), "{}", page.html);
        assert_eq!(urls(&page), vec!["https://example.com/style.css?ver=5"]);
        assert_eq!(page.assets[0].kind, ResourceType::Stylesheet);
        assert_eq!(page.links_rewritten, 1);
    }

    #[test]
    fn test_nested_page_uses_depth_prefix() {
        let page = rewrite(
            r#"<link rel="stylesheet" href="/style.css?ver=5"><a href="https://example.com/">Home</a><a href="/about/">About</a>"#,
            "/blog/post/",
        );
        assert!(page.html.contains(r#"href="../../assets/style.5.css""#), "{}", page.html);
        assert!(page.html.contains(r#"href="../../index.html""#), "{}", page.html);
        assert!(page.html.contains(r#"href="../../about/index.html""#), "{}", page.html);
    }

    #[test]
    fn test_same_origin_assets_counted_and_cross_origin_left_alone() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="https://example.com/wp-content/themes/t/style.css">
            <link rel="stylesheet" href="https://fonts.googleapis.com/css?family=Inter">
            <script src="https://example.com/wp-includes/js/jquery.js?ver=3.7"></script>
            <script src="https://cdn.example.net/lib.js"></script>
            </head><body>
            <img src="https://example.com/wp-content/uploads/photo.jpg">
            <img src="https://example.com/wp-content/uploads/photo.jpg">
            </body></html>"#;
        let page = rewrite(html, "/");

        assert_eq!(page.assets.len(), 3);
        assert!(!page.html.contains("https://example.com/wp-content"), "{}", page.html);
        assert!(!page.html.contains("https://example.com/wp-includes"), "{}", page.html);
        assert!(page.html.contains("https://fonts.googleapis.com/css?family=Inter"));
        assert!(page.html.contains("https://cdn.example.net/lib.js"));
    }

    #[test]
    fn test_srcset_keeps_descriptors() {
        let page = rewrite(
            r#"<img src="/img/a.png" srcset="/img/a.png 1x, /img/a-2x.png 2x, https://cdn.other.com/c.png 3x">"#,
            "/",
        );
        assert!(
            page.html.contains(
                r#"srcset="assets/a.png 1x, assets/a-2x.png 2x, https://cdn.other.com/c.png 3x""#
            ),
            "{}",
            page.html
        );
        assert_eq!(page.assets.len(), 2);
    }

    #[test]
    fn test_other_carriers_are_localized() {
        let html = r#"<head>
            <link rel="icon" href="/favicon.ico">
            <meta property="og:image" content="/img/share.jpg">
            </head><body>
            <picture><source srcset="/img/wide.webp"></picture>
            <video poster="/img/poster.jpg"><source src="/media/clip.mp4"></video>
            <div style="background-image: url('/img/bg.png')"></div>
            </body>"#;
        let page = rewrite(html, "/a/");
        for expected in [
            r#"href="../assets/favicon.ico""#,
            r#"content="../assets/share.jpg""#,
            r#"srcset="../assets/wide.webp""#,
            r#"poster="../assets/poster.jpg""#,
            "url(../assets/bg.png)",
        ] {
            assert!(page.html.contains(expected), "missing {expected} in {}", page.html);
        }
        assert!(page.html.contains(r#"src="/media/clip.mp4""#));
        assert_eq!(page.assets.len(), 5);
    }

    #[test]
    fn test_style_block_urls_and_imports() {
        let html = "<style>@import \"/css/extra.css\";\n.a{background:url('/img/bg.jpg')}\n.b{background:url(data:image/png;base64,AA==)}</style>";
        let page = rewrite(html, "/a/");
        assert!(page.html.contains("@import \"../assets/extra.css\""), "{}", page.html);
        assert!(page.html.contains("url(../assets/bg.jpg)"), "{}", page.html);
        assert!(page.html.contains("url(data:image/png;base64,AA==)"));
        assert_eq!(
            urls(&page),
            vec!["https://example.com/css/extra.css", "https://example.com/img/bg.jpg"]
        );
    }

    #[test]
    fn test_link_exclusions_and_query_fragment() {
        let html = r##"
            <a href="mailto:me@example.com">m</a>
            <a href="tel:+123">t</a>
            <a href="javascript:void(0)">j</a>
            <a href="#section">f</a>
            <a href="https://other.org/page/">x</a>
            <a href="/search/?q=rust&amp;page=2#top">s</a>
            <a href="/feed.xml">feed</a>
        "##;
        let page = rewrite(html, "/");
        assert!(page.html.contains(r#"href="mailto:me@example.com""#));
        assert!(page.html.contains(r#"href="tel:+123""#));
        assert!(page.html.contains(r#"href="javascript:void(0)""#));
        assert!(page.html.contains(r##"href="#section""##));
        assert!(page.html.contains(r#"href="https://other.org/page/""#));
        assert!(page.html.contains(r#"href="/feed.xml""#));
        assert!(page.html.contains(r#"href="search/index.html?q=rust"#), "{}", page.html);
        assert!(page.html.contains("page=2#top"), "{}", page.html);
        assert_eq!(page.links_rewritten, 1);
    }

    #[test]
    fn test_file_links_become_assets() {
        let page = rewrite(r#"<a href="/docs/manual.pdf">Manual</a>"#, "/docs/");
        assert!(page.html.contains(r#"href="../assets/manual.pdf""#), "{}", page.html);
        assert_eq!(page.assets[0].kind, ResourceType::Document);
    }

    #[test]
    fn test_entities_are_decoded_before_resolution() {
        let page = rewrite(r#"<img src="/img/a.png?ver=1&amp;x=2">"#, "/");
        assert_eq!(urls(&page), vec!["https://example.com/img/a.png?ver=1&x=2"]);
        assert!(page.html.contains(r#"src="assets/a.1.png""#), "{}", page.html);
    }

    #[test]
    fn test_cleanup_removes_live_only_markup() {
        let html = r#"<html><head>
            <link rel="https://api.w.org/" href="https://example.com/wp-json/">
            <link rel="EditURI" type="application/rsd+xml" href="https://example.com/xmlrpc.php?rsd">
            <link rel="shortlink" href="https://example.com/?p=1">
            <meta name="generator" content="WordPress 6.4">
            <script>window._wpemojiSettings = {"source":{"concatemoji":"https:\/\/example.com\/wp-includes\/js\/wp-emoji-release.min.js"}};</script>
            <script data-wp-strategy="defer" src="/app.js"></script>
            </head><body><p>Hello</p></body></html>"#;
        let page = rewrite(html, "/");
        for gone in ["api.w.org", "EditURI", "shortlink", "generator", "wp-emoji", "data-wp-strategy"] {
            assert!(!page.html.contains(gone), "{gone} still present in {}", page.html);
        }
        assert!(page.html.contains(r#"src="assets/app.js""#));
        assert!(page.html.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_stamp_goes_before_body_close_or_at_end() {
        let page = rewrite("<html><body><p>x</p></body></html>", "/");
        let stamp_at = page.html.find("<!-- StaticMirror:").unwrap();
        assert!(stamp_at < page.html.find("</body>").unwrap());
        assert!(page.html.contains("Static version generated: 2026-05-04 03:02:01 UTC"));
        assert!(GenerationStamp::find(&page.html).is_some());

        let bare = rewrite("<p>fragment</p>", "/");
        assert!(bare.html.trim_end().ends_with("version=1.0.0 -->"));
    }

    #[test]
    fn test_malformed_markup_still_produces_a_page() {
        let page = rewrite(r#"<div><img src="/a.png"<p>unclosed <a href="/x/">x"#, "/");
        assert!(GenerationStamp::find(&page.html).is_some());
    }

    #[test]
    fn test_failed_rewrite_keeps_markup_without_stamp_or_assets() {
        let html = concat!(
            r#"<img src="/a.png"><select><xmp><script>"use strict";</script></xmp></select>"#,
            "<!-- StaticMirror: generated=2099-01-01T00:00:00Z; version=999 -->",
        );
        let mut names = AssetNames::new();
        let page = rewriter().rewrite(html, "/", &stamp(), &mut names);

        assert!(page.assets.is_empty());
        assert_eq!(page.links_rewritten, 0);
        assert!(page.html.contains(r#"<img src="/a.png">"#), "{}", page.html);
        assert!(GenerationStamp::find(&page.html).is_none(), "{}", page.html);
        assert_eq!(names, AssetNames::new());
    }

    #[test]
    fn test_content_stamps_are_replaced_by_capture_stamp() {
        let page = rewrite(
            "<body><p><!-- StaticMirror: generated=2099-01-01T00:00:00Z; version=999 --></p></body>",
            "/post/",
        );
        assert_eq!(page.html.matches("StaticMirror: generated=").count(), 1);
        assert_eq!(
            GenerationStamp::find(&page.html),
            Some(("2026-05-04T03:02:01Z".to_string(), "1.0.0".to_string()))
        );
    }

    #[test]
    fn test_colliding_names_use_shared_registry() {
        let mut names = AssetNames::new();
        let page = rewriter().rewrite(
            r#"<img src="/a/logo.png"><img src="/b/logo.png">"#,
            "/",
            &stamp(),
            &mut names,
        );
        let hashed = hash_filename("https://example.com/b/logo.png");
        assert!(page.html.contains(r#"src="assets/logo.png""#));
        assert!(page.html.contains(&format!(r#"src="assets/{hashed}""#)));
        assert_eq!(names.owner_of("logo.png"), Some("https://example.com/a/logo.png"));
    }

    #[test]
    fn test_strip_emoji_scripts_only_touches_emoji_blocks() {
        let html = "<script>a()</script><SCRIPT>load('wp-emoji-release.min.js')</SCRIPT><script>b()</script>";
        assert_eq!(
            strip_emoji_scripts(html),
            "<script>a()</script><script>b()</script>"
        );
    }
}
