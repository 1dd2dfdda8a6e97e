use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::handlers::{
    handle_rejection, parse_id, parse_page, parse_username, read_search_body, respond,
    search_from_query, ParsedOperation,
};
use crate::middleware::{credential_gate, flag_session, session_context, session_flag};
use crate::models::{AppState, CommentKind, Operation};

/// The whole HTTP surface: gate, route parsing, per-request session,
/// dispatch, and the rejection handler that keeps every failure in the
/// error envelope shape.
///
/// Everything behind the gate, unmatched routes and wrong methods included,
/// is recovered first and then stamped with the guest flag. Only the gate's
/// own 401 goes out without it.
pub fn api(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let routed = operations()
        .and(session_context(state.clone()))
        .and_then(respond)
        .recover(handle_rejection);

    credential_gate(state)
        .and(session_flag())
        .and(routed)
        .map(flag_session)
        .recover(handle_rejection)
        .with(warp::log::custom(access_log))
}

fn access_log(info: warp::log::Info<'_>) {
    tracing::info!(
        method = %info.method(),
        path = info.path(),
        status = info.status().as_u16(),
        elapsed_ms = info.elapsed().as_millis() as u64,
        "request"
    );
}

/// Matches a route and turns its path, query and body into an [`Operation`].
/// Validation failures are carried forward rather than rejected so the
/// response still gets the session header.
pub fn operations() -> impl Filter<Extract = (ParsedOperation,), Error = Rejection> + Clone {
    let hello = warp::path::end().map(|| -> ParsedOperation { Ok(Operation::Hello) });

    let me = warp::path!("me").map(|| -> ParsedOperation { Ok(Operation::Identity) });

    let inbox = warp::path!("me" / "messages" / "submissions")
        .map(|| -> ParsedOperation { Ok(Operation::SubmissionsInbox) });

    let messages = warp::path!("me" / "messages" / "other")
        .map(|| -> ParsedOperation { Ok(Operation::Messages) });

    let notes = warp::path!("me" / "notes").map(|| -> ParsedOperation { Ok(Operation::Notes) });

    let note = warp::path!("me" / "notes" / String)
        .map(|id: String| -> ParsedOperation {
            Ok(Operation::Note {
                id: parse_id(&id, "note")?,
            })
        });

    let profile = warp::path!("user" / String).map(|username: String| -> ParsedOperation {
        Ok(Operation::UserProfile {
            username: parse_username(&username)?,
        })
    });

    let gallery = warp::path!("user" / String / "gallery" / String)
        .map(|username: String, page: String| -> ParsedOperation {
            Ok(Operation::Gallery {
                username: parse_username(&username)?,
                page: parse_page(&page)?,
            })
        });

    let scraps = warp::path!("user" / String / "scraps" / String)
        .map(|username: String, page: String| -> ParsedOperation {
            Ok(Operation::Scraps {
                username: parse_username(&username)?,
                page: parse_page(&page)?,
            })
        });

    let favorites = warp::path!("user" / String / "favorites" / String)
        .map(|username: String, page: String| -> ParsedOperation {
            Ok(Operation::Favorites {
                username: parse_username(&username)?,
                page: parse_page(&page)?,
            })
        });

    let journals = warp::path!("user" / String / "journals")
        .map(|username: String| -> ParsedOperation {
            Ok(Operation::Journals {
                username: parse_username(&username)?,
            })
        });

    let submission = warp::path!("submission" / String)
        .map(|id: String| -> ParsedOperation {
            Ok(Operation::Submission {
                id: parse_id(&id, "submission")?,
            })
        });

    let journal = warp::path!("journal" / String)
        .map(|id: String| -> ParsedOperation {
            Ok(Operation::Journal {
                id: parse_id(&id, "journal")?,
            })
        });

    let submission_comment = warp::path!("comment" / "submission" / String)
        .map(|id: String| -> ParsedOperation {
            Ok(Operation::Comment {
                kind: CommentKind::Submission,
                id: parse_id(&id, "comment")?,
            })
        });

    let journal_comment = warp::path!("comment" / "journal" / String)
        .map(|id: String| -> ParsedOperation {
            Ok(Operation::Comment {
                kind: CommentKind::Journal,
                id: parse_id(&id, "comment")?,
            })
        });

    let search = warp::path!("search")
        .and(warp::query::<HashMap<String, String>>())
        .map(|params: HashMap<String, String>| search_from_query(&params));

    let reads = hello
        .or(me)
        .unify()
        .or(inbox)
        .unify()
        .or(messages)
        .unify()
        .or(notes)
        .unify()
        .or(note)
        .unify()
        .or(profile)
        .unify()
        .or(gallery)
        .unify()
        .or(scraps)
        .unify()
        .or(favorites)
        .unify()
        .or(journals)
        .unify()
        .or(submission)
        .unify()
        .or(journal)
        .unify()
        .or(submission_comment)
        .unify()
        .or(journal_comment)
        .unify()
        .or(search)
        .unify();

    let search_body = warp::path!("search")
        .and(warp::post())
        .and(warp::body::stream())
        .and_then(read_search_body);

    // Method checks sit behind the path match so an unknown path is a 404
    // rather than a 405.
    reads.and(warp::get()).or(search_body).unify()
}
