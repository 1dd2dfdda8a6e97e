use std::convert::Infallible;
use std::sync::Arc;

use hyper::{header::{HeaderName, HeaderValue}, HeaderMap};
use warp::{Filter, Rejection, Reply};

use crate::config::{API_KEY_HEADER, GUEST_HEADER, SESSION_HEADER};
use crate::errors::GatewayError;
use crate::models::{AppState, SessionContext, SessionToken};


/// Rejects with [`GatewayError::CredentialRejected`] unless the API key
/// header matches the configured secret exactly.
pub fn credential_gate(
    state: Arc<AppState>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .and_then(move |headers: HeaderMap| {
            let state = state.clone();
            async move {
                if has_valid_credential(&headers, &state.api_key) {
                    Ok(())
                } else {
                    tracing::debug!("rejected request with missing or mismatched api key");
                    Err(warp::reject::custom(GatewayError::CredentialRejected))
                }
            }
        })
        .untuple_one()
}

pub fn has_valid_credential(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .map(|value| value.as_bytes() == secret.as_bytes())
        .unwrap_or(false)
}

/// Builds a fresh [`SessionContext`] for every request from the optional
/// session cookie header. A missing, empty or non-text value means guest.
pub fn session_context(
    state: Arc<AppState>,
) -> impl Filter<Extract = (SessionContext,), Error = Infallible> + Clone {
    warp::header::headers_cloned().map(move |headers: HeaderMap| {
        SessionContext::build(session_token(&headers), state.clients.as_ref())
    })
}

/// Whether the request carries a session, without binding a client.
pub fn session_flag() -> impl Filter<Extract = (bool,), Error = Infallible> + Clone {
    warp::header::headers_cloned().map(|headers: HeaderMap| session_token(&headers).is_some())
}

pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    let cookies = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    SessionToken::from_header(cookies)
}

/// Stamps the guest flag onto any reply produced after the credential gate.
pub fn flag_session<R: Reply>(logged_in: bool, reply: R) -> warp::reply::Response {
    let mut response = reply.into_response();
    mark_session(response.headers_mut(), logged_in);
    response
}

pub fn mark_session(headers: &mut HeaderMap, logged_in: bool) {
    headers.insert(
        HeaderName::from_static(GUEST_HEADER),
        HeaderValue::from_static(if logged_in { "false" } else { "true" }),
    );
}
