use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::GatewayConfig;
use crate::services::{ClientFactory, ClientOptions, ContentClient};

/// Additional search fields passed through to the content client untouched.
pub type SearchFilters = Map<String, Value>;

/// Immutable state shared by every request: the API secret and the factory
/// that binds per-request content clients.
pub struct AppState {
    pub api_key: String,
    pub clients: Arc<dyn ClientFactory>,
}

impl AppState {
    pub fn new(api_key: impl Into<String>, clients: Arc<dyn ClientFactory>) -> Self {
        Self {
            api_key: api_key.into(),
            clients,
        }
    }

    pub fn from_config(config: &GatewayConfig, clients: Arc<dyn ClientFactory>) -> Self {
        Self::new(config.api_key.clone(), clients)
    }
}

/// A forwarded site session cookie. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// An empty header value counts as no session at all.
    pub fn from_header(value: Option<String>) -> Option<Self> {
        value.filter(|v| !v.trim().is_empty()).map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Everything one request needs to talk to the content site. Built once at
/// the top of the pipeline and dropped with the response.
pub struct SessionContext {
    token: Option<SessionToken>,
    client: Box<dyn ContentClient>,
}

impl SessionContext {
    pub fn build(token: Option<SessionToken>, factory: &dyn ClientFactory) -> Self {
        let client = factory.bind(token.as_ref(), ClientOptions::strict());
        Self { token, client }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn client(&self) -> &dyn ContentClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}

/// 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Page(NonZeroU32);

impl Page {
    pub const FIRST: Page = Page(NonZeroU32::MIN);

    pub fn new(page: u32) -> Option<Self> {
        NonZeroU32::new(page).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    Submission,
    Journal,
}

impl CommentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Journal => "journal",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub page: Page,
    pub filters: SearchFilters,
}

/// A validated route: which upstream operation to run and with what.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Hello,
    Identity,
    SubmissionsInbox,
    Messages,
    Notes,
    Note { id: u64 },
    UserProfile { username: String },
    Gallery { username: String, page: Page },
    Scraps { username: String, page: Page },
    Favorites { username: String, page: Page },
    Journals { username: String },
    Submission { id: u64 },
    Journal { id: u64 },
    Comment { kind: CommentKind, id: u64 },
    Search(SearchRequest),
}
