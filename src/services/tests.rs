#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use warp::http::{Method, StatusCode};
    use warp::path::FullPath;
    use warp::Filter;

    use crate::models::{CommentKind, Page, SearchFilters, SessionToken};
    use crate::services::{
        ClientFactory, ClientOptions, ContentClient, RemoteClientFactory, UpstreamError,
    };

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        cookie: Option<String>,
        body: Value,
    }

    /// Starts a fake content backend on an ephemeral port and returns its base URL.
    fn spawn_backend<F>(handler: F) -> String
    where
        F: Fn(Seen) -> (StatusCode, Value) + Clone + Send + Sync + 'static,
    {
        let route = warp::any()
            .and(warp::method())
            .and(warp::path::full())
            .and(warp::header::optional::<String>("cookie"))
            .and(warp::body::bytes())
            .map(
                move |method: Method, path: FullPath, cookie: Option<String>, body: Bytes| {
                    let seen = Seen {
                        method,
                        path: path.as_str().to_string(),
                        cookie,
                        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
                    };
                    let (status, value) = handler(seen);
                    warp::reply::with_status(warp::reply::json(&value), status)
                },
            );

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    fn echo_backend() -> String {
        spawn_backend(|seen| {
            (
                StatusCode::OK,
                json!({
                    "method": seen.method.as_str(),
                    "path": seen.path,
                    "cookie": seen.cookie,
                    "body": seen.body,
                }),
            )
        })
    }

    fn status_backend(status: StatusCode) -> String {
        spawn_backend(move |_| (status, json!({ "reason": "upstream said no" })))
    }

    fn factory(base: &str) -> RemoteClientFactory {
        RemoteClientFactory::new(base, Duration::from_secs(5))
    }

    fn token(value: &str) -> SessionToken {
        SessionToken::from_header(Some(value.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_session_cookie() {
        let base = echo_backend();
        let session = token("a=1; b=2");
        let client = factory(&base).bind(Some(&session), ClientOptions::strict());

        let body = client.user_page("alice").await.unwrap();
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/user/alice/");
        assert_eq!(body["cookie"], "a=1; b=2");
    }

    #[tokio::test]
    async fn test_guest_sends_no_cookie() {
        let base = echo_backend();
        let client = factory(&base).bind(None, ClientOptions::strict());

        let body = client.messages().await.unwrap();
        assert_eq!(body["path"], "/msg/others/");
        assert_eq!(body["cookie"], Value::Null);
    }

    #[tokio::test]
    async fn test_operation_paths() {
        let base = echo_backend();
        let client = factory(&base).bind(None, ClientOptions::strict());
        let page = Page::new(2).unwrap();

        let cases = vec![
            (client.submissions_inbox().await, "/msg/submissions/"),
            (client.notes().await, "/msg/pms/"),
            (client.note(7).await, "/viewmessage/7/"),
            (client.gallery_page("alice", page).await, "/gallery/alice/2/"),
            (client.scraps_page("alice", page).await, "/scraps/alice/2/"),
            (client.favorites_page("alice", page).await, "/favorites/alice/2/"),
            (client.user_journals("alice").await, "/journals/alice/"),
            (client.submission(42).await, "/view/42/"),
            (client.journal(43).await, "/journal/43/"),
            (client.comment_text(9, CommentKind::Submission).await, "/replyto/submission/9/"),
            (client.comment_text(9, CommentKind::Journal).await, "/replyto/journal/9/"),
        ];

        for (result, expected) in cases {
            assert_eq!(result.unwrap()["path"], expected);
        }
    }

    #[tokio::test]
    async fn test_search_posts_filters() {
        let base = echo_backend();
        let client = factory(&base).bind(None, ClientOptions::strict());
        let mut filters = SearchFilters::new();
        filters.insert("species".to_string(), json!("wolf"));

        let body = client
            .search_page("foo", &filters, Page::new(3).unwrap())
            .await
            .unwrap();

        assert_eq!(body["method"], "POST");
        assert_eq!(body["path"], "/search/");
        assert_eq!(body["body"], json!({ "q": "foo", "page": 3, "species": "wolf" }));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let cases = vec![
            (StatusCode::UNAUTHORIZED, UpstreamError::AuthenticationExpired),
            (StatusCode::FORBIDDEN, UpstreamError::AuthenticationExpired),
            (StatusCode::NOT_FOUND, UpstreamError::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, UpstreamError::RateLimited),
            (StatusCode::IM_A_TEAPOT, UpstreamError::Status(418)),
        ];

        for (status, expected) in cases {
            let base = status_backend(status);
            let client = factory(&base).bind(None, ClientOptions::strict());
            assert_eq!(client.submission(1).await.unwrap_err(), expected);
        }

        let base = status_backend(StatusCode::SERVICE_UNAVAILABLE);
        let client = factory(&base).bind(None, ClientOptions::strict());
        assert!(matches!(
            client.submission(1).await,
            Err(UpstreamError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_lenient_client_returns_error_bodies() {
        let base = status_backend(StatusCode::NOT_FOUND);
        let options = ClientOptions {
            disable_retry: true,
            throw_errors: false,
        };
        let client = factory(&base).bind(None, options);

        let body = client.journal(5).await.unwrap();
        assert_eq!(body["reason"], "upstream said no");
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let route = warp::any().map(|| "<html>not json</html>");
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let client = factory(&format!("http://{}", addr)).bind(None, ClientOptions::strict());
        assert!(matches!(client.notes().await, Err(UpstreamError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = factory(&format!("http://{}", addr)).bind(None, ClientOptions::strict());
        assert!(matches!(
            client.user_page("alice").await,
            Err(UpstreamError::Unavailable(_))
        ));
    }

    fn slow_backend(hits: Arc<AtomicUsize>) -> String {
        let route = warp::any().and_then(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, Infallible>(warp::reply::json(&json!({})))
            }
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_strict_client_times_out_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = slow_backend(hits.clone());
        let factory = RemoteClientFactory::new(&base, Duration::from_millis(50));
        let client = factory.bind(None, ClientOptions::strict());

        assert_eq!(client.messages().await.unwrap_err(), UpstreamError::Timeout);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrying_client_retries_timeouts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = slow_backend(hits.clone());
        let factory = RemoteClientFactory::new(&base, Duration::from_millis(50));
        let client = factory.bind(None, ClientOptions::default());

        assert_eq!(client.messages().await.unwrap_err(), UpstreamError::Timeout);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_strict_options() {
        let options = ClientOptions::strict();
        assert!(options.disable_retry);
        assert!(options.throw_errors);
    }
}
