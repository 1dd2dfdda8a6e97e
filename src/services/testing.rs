use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ClientFactory, ClientOptions, ContentClient, UpstreamResult};
use crate::models::{CommentKind, Page, SearchFilters, SessionToken};

/// Answers every call with the same result and counts how often it was
/// bound and called.
#[derive(Clone)]
pub(crate) struct StaticFactory {
    pub result: UpstreamResult,
    pub binds: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub last_options: Arc<std::sync::Mutex<Option<ClientOptions>>>,
}

impl StaticFactory {
    pub fn new(result: UpstreamResult) -> Self {
        Self {
            result,
            binds: Arc::default(),
            calls: Arc::default(),
            last_options: Arc::default(),
        }
    }

    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClientFactory for StaticFactory {
    fn bind(
        &self,
        _session: Option<&SessionToken>,
        options: ClientOptions,
    ) -> Box<dyn ContentClient> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        Box::new(StaticClient {
            result: self.result.clone(),
            calls: self.calls.clone(),
        })
    }
}

struct StaticClient {
    result: UpstreamResult,
    calls: Arc<AtomicUsize>,
}

impl StaticClient {
    fn answer(&self) -> UpstreamResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[async_trait]
impl ContentClient for StaticClient {
    async fn messages(&self) -> UpstreamResult {
        self.answer()
    }
    async fn submissions_inbox(&self) -> UpstreamResult {
        self.answer()
    }
    async fn notes(&self) -> UpstreamResult {
        self.answer()
    }
    async fn note(&self, _id: u64) -> UpstreamResult {
        self.answer()
    }
    async fn user_page(&self, _username: &str) -> UpstreamResult {
        self.answer()
    }
    async fn gallery_page(&self, _username: &str, _page: Page) -> UpstreamResult {
        self.answer()
    }
    async fn scraps_page(&self, _username: &str, _page: Page) -> UpstreamResult {
        self.answer()
    }
    async fn favorites_page(&self, _username: &str, _page: Page) -> UpstreamResult {
        self.answer()
    }
    async fn user_journals(&self, _username: &str) -> UpstreamResult {
        self.answer()
    }
    async fn submission(&self, _id: u64) -> UpstreamResult {
        self.answer()
    }
    async fn journal(&self, _id: u64) -> UpstreamResult {
        self.answer()
    }
    async fn comment_text(&self, _id: u64, _kind: CommentKind) -> UpstreamResult {
        self.answer()
    }
    async fn search_page(
        &self,
        _query: &str,
        _filters: &SearchFilters,
        _page: Page,
    ) -> UpstreamResult {
        self.answer()
    }
}
