//! Decides per request whether to capture the rendered page, and captures it.
//!
//! Capture is a side effect of serving a page: nothing here can fail the
//! live request or change the response it returns.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::asset_store::AssetStore;
use crate::clock::Clock;
use crate::error::CaptureError;
use crate::file_manager::FileManager;
use crate::page_rewriter::PageRewriter;
use crate::staleness::{Freshness, GenerationStamp, StalenessPolicy};
use crate::url_resolver::{is_reserved_path, page_file_path};

/// What the host rendered, as far as capture cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageKind {
    #[default]
    Content,
    Error,
    Search,
    Preview,
    Feed,
    Api,
    Trackback,
}

impl PageKind {
    pub fn is_cacheable(self) -> bool {
        matches!(self, PageKind::Content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub is_admin: bool,
    pub is_authenticated: bool,
    pub kind: PageKind,
}

impl RequestInfo {
    pub fn anonymous_get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            is_admin: false,
            is_authenticated: false,
            kind: PageKind::Content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotGet,
    Admin,
    Authenticated,
    Uncacheable(PageKind),
    EmptyResponse,
    /// The page would be written into the asset directory.
    ReservedPath,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotGet => write!(f, "not a GET request"),
            SkipReason::Admin => write!(f, "admin request"),
            SkipReason::Authenticated => write!(f, "authenticated session"),
            SkipReason::Uncacheable(kind) => write!(f, "{kind:?} page is not cacheable"),
            SkipReason::EmptyResponse => write!(f, "empty response body"),
            SkipReason::ReservedPath => write!(f, "path is reserved for assets"),
        }
    }
}

/// Only anonymous, canonical GET responses are mirrored.
pub fn should_capture(request: &RequestInfo) -> Result<(), SkipReason> {
    if !request.method.eq_ignore_ascii_case("GET") {
        return Err(SkipReason::NotGet);
    }
    if request.is_admin {
        return Err(SkipReason::Admin);
    }
    if request.is_authenticated {
        return Err(SkipReason::Authenticated);
    }
    if !request.kind.is_cacheable() {
        return Err(SkipReason::Uncacheable(request.kind));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Disabled,
    Skipped(SkipReason),
    /// The existing static copy is still valid and was left alone.
    Fresh { path: PathBuf },
    Captured {
        path: PathBuf,
        assets_found: usize,
        assets_queued: usize,
    },
    /// Capture was abandoned; the live response is unaffected.
    Failed(String),
}

pub struct CaptureScheduler {
    rewriter: PageRewriter,
    assets: Arc<AssetStore>,
    files: FileManager,
    clock: Arc<dyn Clock>,
    policy: StalenessPolicy,
}

impl CaptureScheduler {
    pub fn new(
        rewriter: PageRewriter,
        assets: Arc<AssetStore>,
        files: FileManager,
        clock: Arc<dyn Clock>,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            rewriter,
            assets,
            files,
            clock,
            policy,
        }
    }

    /// Staleness of the static copy currently stored for `request_path`.
    pub fn freshness(&self, request_path: &str) -> Freshness {
        let relative = page_file_path(request_path);
        let existing = if self.files.exists(&relative) {
            match self.files.read_to_string(&relative) {
                Ok(html) => Some(html),
                Err(e) => {
                    warn!(path = %relative.display(), error = %e, "unreadable static page, recapturing");
                    None
                }
            }
        } else {
            None
        };
        self.policy.evaluate(existing.as_deref(), self.clock.now())
    }

    /// Gate, then [`CaptureScheduler::capture`].
    pub fn handle(&self, request: &RequestInfo, html: &str) -> CaptureOutcome {
        if let Err(reason) = should_capture(request) {
            debug!(path = %request.path, %reason, "capture skipped");
            return CaptureOutcome::Skipped(reason);
        }
        self.capture(html, &request.path)
    }

    /// Captures `html` as the static page for `request_path` unless the
    /// stored copy is still fresh.
    pub fn capture(&self, html: &str, request_path: &str) -> CaptureOutcome {
        if html.trim().is_empty() {
            return CaptureOutcome::Skipped(SkipReason::EmptyResponse);
        }
        if is_reserved_path(request_path) {
            debug!(request_path, "capture skipped, path is reserved for assets");
            return CaptureOutcome::Skipped(SkipReason::ReservedPath);
        }
        match self.try_capture(html, request_path) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(request_path, error = %e, "capture abandoned");
                CaptureOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_capture(&self, html: &str, request_path: &str) -> Result<CaptureOutcome, CaptureError> {
        let relative = page_file_path(request_path);

        let freshness = self.freshness(request_path);
        if !freshness.is_stale() {
            debug!(request_path, "static copy is fresh");
            return Ok(CaptureOutcome::Fresh {
                path: self.files.base_dir().join(&relative),
            });
        }

        let stamp = GenerationStamp::new(self.clock.now(), self.policy.current_version.clone());
        let page = self
            .assets
            .with_names(|names| self.rewriter.rewrite(html, request_path, &stamp, names))?;
        let queued = self
            .assets
            .queue(page.assets.iter().map(|asset| asset.url.as_str()))?;

        let path = self
            .files
            .write_atomic(&relative, page.html.as_bytes())
            .map_err(|source| CaptureError::Io {
                path: relative.clone(),
                source,
            })?;

        info!(
            request_path,
            reason = ?freshness,
            assets = page.assets.len(),
            queued,
            "page captured"
        );
        Ok(CaptureOutcome::Captured {
            path,
            assets_found: page.assets.len(),
            assets_queued: queued,
        })
    }
}
