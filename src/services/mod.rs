use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CommentKind, Page, SearchFilters, SessionToken};

mod remote;

pub use remote::{RemoteClient, RemoteClientFactory};

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

/// Failure signals raised by a content client. The gateway never sees a
/// partially populated payload in place of one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("session rejected by the content site")]
    AuthenticationExpired,
    #[error("resource does not exist")]
    NotFound,
    #[error("rate limited by the content site")]
    RateLimited,
    #[error("transport failure: {0}")]
    Unavailable(String),
    #[error("timed out")]
    Timeout,
    #[error("could not parse upstream response: {0}")]
    Parse(String),
    #[error("unexpected upstream status {0}")]
    Status(u16),
    #[error("{0}")]
    Other(String),
}

pub type UpstreamResult = Result<Value, UpstreamError>;

/// How a bound client behaves on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientOptions {
    /// Surface transport failures on the first attempt.
    pub disable_retry: bool,
    /// Turn non-success upstream responses into `UpstreamError`s instead of
    /// returning whatever body came back.
    pub throw_errors: bool,
}

impl ClientOptions {
    /// The only configuration the gateway binds sessions with.
    pub fn strict() -> Self {
        Self {
            disable_retry: true,
            throw_errors: true,
        }
    }
}

/// Read access to the content site on behalf of one session.
#[async_trait]
pub trait ContentClient: Send + Sync {
    async fn messages(&self) -> UpstreamResult;
    async fn submissions_inbox(&self) -> UpstreamResult;
    async fn notes(&self) -> UpstreamResult;
    async fn note(&self, id: u64) -> UpstreamResult;
    async fn user_page(&self, username: &str) -> UpstreamResult;
    async fn gallery_page(&self, username: &str, page: Page) -> UpstreamResult;
    async fn scraps_page(&self, username: &str, page: Page) -> UpstreamResult;
    async fn favorites_page(&self, username: &str, page: Page) -> UpstreamResult;
    async fn user_journals(&self, username: &str) -> UpstreamResult;
    async fn submission(&self, id: u64) -> UpstreamResult;
    async fn journal(&self, id: u64) -> UpstreamResult;
    async fn comment_text(&self, id: u64, kind: CommentKind) -> UpstreamResult;
    async fn search_page(&self, query: &str, filters: &SearchFilters, page: Page) -> UpstreamResult;
}

/// Binds a fresh content client to a caller's session.
///
/// Implementations may share a transport between the clients they hand out,
/// but each returned client owns its session token exclusively.
pub trait ClientFactory: Send + Sync {
    fn bind(
        &self,
        session: Option<&SessionToken>,
        options: ClientOptions,
    ) -> Box<dyn ContentClient>;
}
