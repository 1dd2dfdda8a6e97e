use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::http::uri::InvalidUri;
use hyper::{header, Body, Client, Method, Request, StatusCode, Uri};
use serde_json::Value;
use tokio::time::timeout;

use super::{ClientFactory, ClientOptions, ContentClient, UpstreamError, UpstreamResult};
use crate::models::{CommentKind, Page, SearchFilters, SessionToken};

/// Extra attempts made for transient failures when retry is enabled.
const MAX_RETRIES: usize = 2;

/// Hands out [`RemoteClient`]s that share one pooled hyper client.
#[derive(Clone)]
pub struct RemoteClientFactory {
    transport: Client<HttpConnector>,
    base: Arc<str>,
    timeout: Duration,
}

impl RemoteClientFactory {
    pub fn new(base: &str, timeout: Duration) -> Self {
        Self::with_transport(Client::new(), base, timeout)
    }

    pub fn with_transport(transport: Client<HttpConnector>, base: &str, timeout: Duration) -> Self {
        Self {
            transport,
            base: Arc::from(base.trim_end_matches('/')),
            timeout,
        }
    }
}

impl ClientFactory for RemoteClientFactory {
    fn bind(
        &self,
        session: Option<&SessionToken>,
        options: ClientOptions,
    ) -> Box<dyn ContentClient> {
        Box::new(RemoteClient {
            transport: self.transport.clone(),
            base: self.base.clone(),
            timeout: self.timeout,
            session: session.cloned(),
            options,
        })
    }
}

/// Content client backed by a JSON content backend whose paths mirror the
/// site's own pages. The session token travels as the `Cookie` header.
pub struct RemoteClient {
    transport: Client<HttpConnector>,
    base: Arc<str>,
    timeout: Duration,
    session: Option<SessionToken>,
    options: ClientOptions,
}

impl RemoteClient {
    async fn get(&self, path: String) -> UpstreamResult {
        self.send(Method::GET, path, None).await
    }

    async fn send(&self, method: Method, path: String, body: Option<Value>) -> UpstreamResult {
        let attempts = if self.options.disable_retry { 1 } else { 1 + MAX_RETRIES };
        let mut attempt = 1;
        loop {
            match self.attempt(&method, &path, body.as_ref()).await {
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::debug!(
                        %method,
                        %path,
                        attempt,
                        error = %err,
                        "retrying upstream call"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn attempt(&self, method: &Method, path: &str, body: Option<&Value>) -> UpstreamResult {
        let uri_str = format!("{}{}", self.base, path);
        let uri: Uri = uri_str.parse().map_err(|e: InvalidUri| {
            UpstreamError::Other(format!("invalid upstream uri {uri_str}: {e}"))
        })?;

        let mut req_builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.session {
            req_builder = req_builder.header(header::COOKIE, token.expose());
        }

        let req = match body {
            Some(body) => {
                let bytes = serde_json::to_vec(body)
                    .map_err(|e| UpstreamError::Other(e.to_string()))?;
                req_builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(bytes))
            }
            None => req_builder.body(Body::empty()),
        }
        .map_err(|e| UpstreamError::Other(format!("error building request: {e}")))?;

        let exchange = async {
            let response = self
                .transport
                .request(req)
                .await
                .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let body_bytes = hyper::body::to_bytes(body)
                .await
                .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
            Ok::<_, UpstreamError>((parts.status, body_bytes))
        };

        let (status, body_bytes) = timeout(self.timeout, exchange)
            .await
            .map_err(|_| UpstreamError::Timeout)??;

        if !status.is_success() {
            if self.options.throw_errors {
                return Err(classify(status));
            }
            return Ok(serde_json::from_slice(&body_bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body_bytes).into_owned())
            }));
        }

        if body_bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body_bytes).map_err(|e| UpstreamError::Parse(e.to_string()))
    }
}

fn classify(status: StatusCode) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::AuthenticationExpired,
        StatusCode::NOT_FOUND => UpstreamError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            UpstreamError::Unavailable(format!("upstream answered {status}"))
        }
        other => UpstreamError::Status(other.as_u16()),
    }
}

impl UpstreamError {
    /// Failures worth another attempt when retry is enabled.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

#[async_trait]
impl ContentClient for RemoteClient {
    async fn messages(&self) -> UpstreamResult {
        self.get("/msg/others/".to_string()).await
    }

    async fn submissions_inbox(&self) -> UpstreamResult {
        self.get("/msg/submissions/".to_string()).await
    }

    async fn notes(&self) -> UpstreamResult {
        self.get("/msg/pms/".to_string()).await
    }

    async fn note(&self, id: u64) -> UpstreamResult {
        self.get(format!("/viewmessage/{id}/")).await
    }

    async fn user_page(&self, username: &str) -> UpstreamResult {
        self.get(format!("/user/{username}/")).await
    }

    async fn gallery_page(&self, username: &str, page: Page) -> UpstreamResult {
        self.get(format!("/gallery/{username}/{page}/")).await
    }

    async fn scraps_page(&self, username: &str, page: Page) -> UpstreamResult {
        self.get(format!("/scraps/{username}/{page}/")).await
    }

    async fn favorites_page(&self, username: &str, page: Page) -> UpstreamResult {
        self.get(format!("/favorites/{username}/{page}/")).await
    }

    async fn user_journals(&self, username: &str) -> UpstreamResult {
        self.get(format!("/journals/{username}/")).await
    }

    async fn submission(&self, id: u64) -> UpstreamResult {
        self.get(format!("/view/{id}/")).await
    }

    async fn journal(&self, id: u64) -> UpstreamResult {
        self.get(format!("/journal/{id}/")).await
    }

    async fn comment_text(&self, id: u64, kind: CommentKind) -> UpstreamResult {
        self.get(format!("/replyto/{}/{id}/", kind.as_str())).await
    }

    async fn search_page(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: Page,
    ) -> UpstreamResult {
        let mut body = filters.clone();
        body.insert("q".to_string(), Value::from(query));
        body.insert("page".to_string(), Value::from(page.get()));
        self.send(Method::POST, "/search/".to_string(), Some(Value::Object(body)))
            .await
    }
}
