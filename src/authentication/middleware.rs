use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::error::ApiError;

use super::jwt::{SessionData, SessionKeys};

/// Extracts the token from `Authorization: Token <t>` (or `Bearer <t>`).
pub fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }
    match scheme {
        s if s.eq_ignore_ascii_case("token") || s.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

pub fn with_session(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let keys = keys.clone();
        async move {
            let token = header
                .as_deref()
                .and_then(parse_token)
                .ok_or_else(ApiError::unauthenticated)?;

            keys.verify(token).map_err(Rejection::from)
        }
    })
}

pub fn with_possible_session(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(parse_token)
            .and_then(|token| keys.verify(token).ok())
    })
}
