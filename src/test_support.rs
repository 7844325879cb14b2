//! In-crate fakes for unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::downloader::{FetchResponse, HttpFetcher};
use crate::error::FetchError;

/// Serves fixed bodies by exact URL; everything else is a 404.
#[derive(Default)]
pub(crate) struct FakeSite {
    responses: HashMap<String, (Option<&'static str>, Vec<u8>)>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeSite {
    pub(crate) fn serve(mut self, url: &str, content_type: Option<&'static str>, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), (content_type, body.as_bytes().to_vec()));
        self
    }

    pub(crate) fn calls(&self, url: &str) -> u32 {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpFetcher for FakeSite {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;
        Ok(match self.responses.get(url) {
            Some((content_type, body)) => FetchResponse {
                status: 200,
                content_type: content_type.map(str::to_string),
                body: body.clone(),
            },
            None => FetchResponse {
                status: 404,
                content_type: None,
                body: Vec::new(),
            },
        })
    }
}
