use std::collections::HashMap;
use std::convert::Infallible;

use bytes::{Buf, BufMut, BytesMut};
use futures::{Stream, StreamExt};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use warp::Reply;

use crate::config::MAX_BODY_BYTES;
use crate::errors::{ErrorEnvelope, GatewayError};
use crate::models::{Operation, Page, SearchFilters, SearchRequest, SessionContext};


const MAX_USERNAME_LEN: usize = 64;

pub type ParsedOperation = Result<Operation, GatewayError>;

/// Parses a page number taken from the URL path. There is no default here:
/// the caller wrote the segment, so it has to be a positive integer.
pub fn parse_page(raw: &str) -> Result<Page, GatewayError> {
    raw.parse::<u32>()
        .ok()
        .and_then(Page::new)
        .ok_or_else(|| GatewayError::validation("Invalid page number, expected a positive integer"))
}

pub fn parse_id(raw: &str, what: &str) -> Result<u64, GatewayError> {
    raw.parse::<u64>()
        .map_err(|_| GatewayError::validation(format!("Invalid {what} id, expected a number")))
}

/// Site usernames are ASCII alphanumerics plus `-`, `_`, `.` and `~`.
pub fn parse_username(raw: &str) -> Result<String, GatewayError> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_USERNAME_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if valid {
        Ok(raw.to_string())
    } else {
        Err(GatewayError::validation("Invalid username"))
    }
}

/// `GET /search`: `q` is required, `page` falls back to 1 when absent or
/// not a positive integer.
pub fn search_from_query(params: &HashMap<String, String>) -> ParsedOperation {
    let query = params
        .get("q")
        .filter(|q| !q.is_empty())
        .ok_or_else(|| GatewayError::validation("Missing query parameter"))?;

    let page = params
        .get("page")
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .and_then(Page::new)
        .unwrap_or_default();

    Ok(Operation::Search(SearchRequest {
        query: query.clone(),
        page,
        filters: SearchFilters::new(),
    }))
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    q: Option<String>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(flatten)]
    filters: SearchFilters,
}

/// `POST /search`: a JSON object with `q`, an optional `page` (0 or absent
/// means 1) and any further filter fields, forwarded as-is.
pub fn search_from_body(body: &[u8]) -> ParsedOperation {
    let body: SearchBody = serde_json::from_slice(body)
        .map_err(|e| GatewayError::validation(format!("Invalid search body: {e}")))?;

    let query = body
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| GatewayError::validation("Missing query parameter"))?;

    Ok(Operation::Search(SearchRequest {
        query,
        page: body.page.and_then(Page::new).unwrap_or_default(),
        filters: body.filters,
    }))
}

/// Reads a request body chunk by chunk, failing as soon as it grows past
/// `limit`. Chunked bodies without a Content-Length are accepted.
pub async fn collect_body<S, B>(body: S, limit: u64) -> Result<BytesMut, GatewayError>
where
    S: Stream<Item = Result<B, warp::Error>> + Send,
    B: Buf + Send,
{
    futures::pin_mut!(body);
    let mut collected = BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!(error = %e, "failed reading request body");
            GatewayError::validation("Could not read request body")
        })?;
        if (collected.len() + chunk.remaining()) as u64 > limit {
            return Err(GatewayError::PayloadTooLarge);
        }
        collected.put(chunk);
    }
    Ok(collected)
}

/// Body half of `POST /search`. Size and parse failures are carried in the
/// operation so they reach the caller as envelopes from `respond`.
pub async fn read_search_body<S, B>(body: S) -> Result<ParsedOperation, Infallible>
where
    S: Stream<Item = Result<B, warp::Error>> + Send,
    B: Buf + Send,
{
    Ok(collect_body(body, MAX_BODY_BYTES)
        .await
        .and_then(|bytes| search_from_body(&bytes)))
}

/// Runs one operation against the session's content client. This is the
/// only await on the upstream for a request.
pub async fn dispatch(ctx: &SessionContext, op: &Operation) -> Result<Value, GatewayError> {
    let client = ctx.client();
    let result = match op {
        Operation::Hello => return Ok(json!({ "hi": true })),
        Operation::Identity => return identity(client.messages().await?),
        Operation::SubmissionsInbox => client.submissions_inbox().await,
        Operation::Messages => client.messages().await,
        Operation::Notes => client.notes().await,
        Operation::Note { id } => client.note(*id).await,
        Operation::UserProfile { username } => client.user_page(username).await,
        Operation::Gallery { username, page } => client.gallery_page(username, *page).await,
        Operation::Scraps { username, page } => client.scraps_page(username, *page).await,
        Operation::Favorites { username, page } => client.favorites_page(username, *page).await,
        Operation::Journals { username } => client.user_journals(username).await,
        Operation::Submission { id } => client.submission(*id).await,
        Operation::Journal { id } => client.journal(*id).await,
        Operation::Comment { kind, id } => client.comment_text(*id, *kind).await,
        Operation::Search(search) => {
            client
                .search_page(&search.query, &search.filters, search.page)
                .await
        }
    };
    result.map_err(GatewayError::from)
}

/// Projects the logged-in username out of a messages payload. Guests get a
/// payload without one, which counts as an expired session.
pub fn identity(messages: Value) -> Result<Value, GatewayError> {
    messages
        .get("my_username")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(|name| json!({ "username": name }))
        .ok_or(GatewayError::AuthenticationExpired)
}

/// Final step of every routed request: dispatch when the route parsed,
/// then normalize the outcome. The guest flag is stamped by the caller.
pub async fn respond(
    op: ParsedOperation,
    ctx: SessionContext,
) -> Result<warp::reply::Response, Infallible> {
    let outcome = match op {
        Ok(op) => dispatch(&ctx, &op).await,
        Err(err) => Err(err),
    };

    let response = match outcome {
        Ok(payload) => warp::reply::json(&payload).into_response(),
        Err(err) => {
            log_failure(&err);
            error_response(&err)
        }
    };
    Ok(response)
}

pub fn error_response(err: &GatewayError) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&err.envelope()), err.status_code())
        .into_response()
}

fn log_failure(err: &GatewayError) {
    match err {
        GatewayError::Validation(_) | GatewayError::CredentialRejected => {
            tracing::debug!(error = %err, "request rejected");
        }
        GatewayError::NotFound => tracing::debug!(error = %err, "upstream resource missing"),
        _ => tracing::warn!(error = %err, status = %err.status_code(), "upstream call failed"),
    }
}

pub async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<GatewayError>() {
        (e.status_code(), e.public_message())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else if err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
    {
        (StatusCode::BAD_REQUEST, "Invalid request header".to_string())
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorEnvelope::new(message)),
        code,
    ))
}
