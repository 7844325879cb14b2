pub mod asset_store;
pub mod batch;
pub mod capture;
pub mod cli;
pub mod clock;
pub mod config;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod mirror;
pub mod page_rewriter;
pub mod payload;
pub mod scheduler;
pub mod staleness;
pub mod store;
pub mod url_resolver;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use asset_store::{AssetStore, BatchReport};
pub use capture::{CaptureOutcome, PageKind, RequestInfo, SkipReason};
pub use cli::MirrorCommand;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::MirrorConfig;
pub use downloader::{FetchResponse, HttpFetcher, ReqwestFetcher, RetryPolicy};
pub use error::{AssetError, CaptureError, ConfigError, FetchError, MirrorError, StoreError};
pub use file_manager::FileManager;
pub use mirror::{MirrorStatus, StaticMirror};
pub use page_rewriter::{PageRewriter, RewrittenPage};
pub use scheduler::{Job, Scheduler, StoreScheduler};
pub use staleness::{Freshness, GenerationStamp, StalenessPolicy};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use url_resolver::ResourceType;
