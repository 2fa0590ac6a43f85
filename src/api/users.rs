use serde_json::json;
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Rejection};

use super::filters::{json, json_body, no_content, parse_int, query_pairs, with_state};
use crate::{
    actions::{
        fetch_subscriptions, fetch_users, get_user_or_404, register_user, set_avatar,
        set_password, subscribe, unsubscribe,
    },
    constants::AVATAR_IMAGE_DIR,
    error::ApiError,
    form::{AvatarPayload, PasswordPayload, UserPayload},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{LimitOffset, PageContext},
    permissions::ActionType,
    representation::{present_user, present_user_with_recipes, CreatedUser, UserWithRecipes},
    schema::Id,
    state::AppState,
};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(query_pairs())
        .and(with_possible_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(user_list);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<UserPayload>())
        .and(with_state(state.clone()))
        .and_then(user_register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(user_me);

    let avatar_set = warp::path!("users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<AvatarPayload>())
        .and(with_state(state.clone()))
        .and_then(avatar_set);

    let avatar_delete = warp::path!("users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(avatar_delete);

    let password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<PasswordPayload>())
        .and(with_state(state.clone()))
        .and_then(user_set_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(query_pairs())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(subscription_list);

    let get = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(user_get);

    let follow = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(query_pairs())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(user_subscribe);

    let unfollow = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state))
        .and_then(user_unsubscribe);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(avatar_set)
        .unify()
        .or(avatar_delete)
        .unify()
        .or(password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(get)
        .unify()
        .or(follow)
        .unify()
        .or(unfollow)
        .unify()
        .boxed()
}

fn integer_param(query: &[(String, String)], key: &str) -> Result<Option<i64>, ApiError> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, value)| parse_int(key, value))
        .transpose()
}

/// Reads `limit`/`offset` and returns the other parameters to carry into the links.
pub fn parse_window(
    query: &[(String, String)],
) -> Result<(LimitOffset, Vec<(String, String)>), ApiError> {
    let window = LimitOffset::new(
        integer_param(query, "limit")?,
        integer_param(query, "offset")?,
    );
    let carried = query
        .iter()
        .filter(|(key, _)| key != "limit" && key != "offset")
        .cloned()
        .collect();

    Ok((window, carried))
}

/// `recipes_limit`, ignored when it is not a positive integer.
pub fn parse_recipes_limit(query: &[(String, String)]) -> Option<i64> {
    query
        .iter()
        .find(|(key, _)| key == "recipes_limit")
        .and_then(|(_, value)| value.trim().parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
}

async fn user_list(
    query: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let (window, carried) = parse_window(&query)?;
    let viewer = session.map(|s| s.user_id);

    let (users, total) = fetch_users(&state.pool, &window).await?;
    let context = window.context(users, total, &state.absolute("/api/users/"), &carried);

    let mut results = Vec::with_capacity(context.results.len());
    for user in &context.results {
        results.push(present_user(&state.pool, &state.media, user, viewer).await?);
    }

    let page = PageContext {
        count: context.count,
        next: context.next,
        previous: context.previous,
        results,
    };
    Ok(json(&page, StatusCode::OK))
}

async fn user_register(payload: UserPayload, state: AppState) -> Result<Response, Rejection> {
    let new_user = payload.validate()?;
    let user = register_user(&state.pool, new_user).await?;

    Ok(json(&CreatedUser::from(user), StatusCode::CREATED))
}

async fn user_get(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = get_user_or_404(&state.pool, id).await?;
    let repr = present_user(&state.pool, &state.media, &user, session.map(|s| s.user_id)).await?;

    Ok(json(&repr, StatusCode::OK))
}

async fn user_me(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let user = get_user_or_404(&state.pool, session.user_id).await?;
    let repr = present_user(&state.pool, &state.media, &user, Some(session.user_id)).await?;

    Ok(json(&repr, StatusCode::OK))
}

async fn user_set_password(
    session: SessionData,
    payload: PasswordPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;
    let (new_password, current_password) = payload.validate()?;

    set_password(&state.pool, session.user_id, &current_password, &new_password).await?;
    Ok(no_content())
}

async fn subscription_list(
    query: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let (window, carried) = parse_window(&query)?;
    let recipes_limit = parse_recipes_limit(&query);

    let (authors, total) = fetch_subscriptions(&state.pool, session.user_id, &window).await?;
    let context = window.context(
        authors,
        total,
        &state.absolute("/api/users/subscriptions/"),
        &carried,
    );

    let mut results: Vec<UserWithRecipes> = Vec::with_capacity(context.results.len());
    for author in &context.results {
        results.push(
            present_user_with_recipes(
                &state.pool,
                &state.media,
                author,
                Some(session.user_id),
                recipes_limit,
            )
            .await?,
        );
    }

    let page = PageContext {
        count: context.count,
        next: context.next,
        previous: context.previous,
        results,
    };
    Ok(json(&page, StatusCode::OK))
}

async fn user_subscribe(
    id: Id,
    query: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    if id == session.user_id {
        return Err(ApiError::bad_request("You cannot subscribe to yourself").into());
    }

    let author = get_user_or_404(&state.pool, id).await?;
    subscribe(&state.pool, session.user_id, author.id).await?;

    let repr = present_user_with_recipes(
        &state.pool,
        &state.media,
        &author,
        Some(session.user_id),
        parse_recipes_limit(&query),
    )
    .await?;
    Ok(json(&repr, StatusCode::CREATED))
}

async fn user_unsubscribe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let author = get_user_or_404(&state.pool, id).await?;

    unsubscribe(&state.pool, session.user_id, author.id).await?;
    Ok(no_content())
}

async fn avatar_set(
    session: SessionData,
    payload: AvatarPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;
    let image = payload.validate()?;

    let stored = state.media.save(AVATAR_IMAGE_DIR, &image).await?;
    let previous = match set_avatar(&state.pool, session.user_id, Some(&stored)).await {
        Ok(previous) => previous,
        Err(e) => {
            state.media.remove(&stored).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        state.media.remove(&previous).await;
    }

    Ok(json(
        &json!({ "avatar": state.media.url(&stored) }),
        StatusCode::OK,
    ))
}

async fn avatar_delete(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    if let Some(previous) = set_avatar(&state.pool, session.user_id, None).await? {
        state.media.remove(&previous).await;
    }
    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(query: &[(&str, &str)]) -> Vec<(String, String)> {
        query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn window_keeps_other_parameters() {
        let query = pairs(&[("limit", "2"), ("offset", "4"), ("recipes_limit", "1")]);
        let (window, carried) = parse_window(&query).unwrap();

        assert_eq!(window, LimitOffset { limit: 2, offset: 4 });
        assert_eq!(carried, pairs(&[("recipes_limit", "1")]));
        assert_eq!(parse_recipes_limit(&query), Some(1));
    }

    #[test]
    fn bad_limit_is_a_field_error() {
        let error = parse_window(&pairs(&[("limit", "many")])).unwrap_err();
        assert!(error.body().get("limit").is_some());
    }

    #[test]
    fn recipes_limit_ignores_garbage() {
        assert_eq!(parse_recipes_limit(&pairs(&[("recipes_limit", "x")])), None);
        assert_eq!(parse_recipes_limit(&pairs(&[("recipes_limit", "-1")])), None);
        assert_eq!(parse_recipes_limit(&[]), None);
    }
}
