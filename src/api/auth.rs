use log::debug;
use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::filters::{json, json_body, no_content, with_state};
use crate::{
    actions::login_user, form::LoginPayload, jwt::SessionData, middleware::with_session,
    state::AppState,
};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginPayload>())
        .and(with_state(state.clone()))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and_then(logout);

    login.or(logout).unify().boxed()
}

async fn login(payload: LoginPayload, state: AppState) -> Result<Response, Rejection> {
    let (email, password) = payload.validate()?;
    let token = login_user(&state.pool, &state.sessions, &email, &password).await?;

    Ok(json(&json!({ "auth_token": token }), StatusCode::OK))
}

/// Tokens are stateless; the client discards its copy.
async fn logout(session: SessionData) -> Result<Response, Rejection> {
    debug!("User {} logged out", session.user_id);
    Ok(no_content())
}
