use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::Response,
    Filter, Rejection,
};

use super::filters::{json, json_body, no_content, query_pairs, with_state};
use crate::{
    actions::{
        create_ingredient, create_tag, delete_ingredient, get_ingredient, get_tag,
        list_ingredients, list_tags,
    },
    error::ApiError,
    form::{IngredientPayload, TagPayload},
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::Id,
    state::AppState,
};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let tag_list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(tag_list);

    let tag_create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<TagPayload>())
        .and(with_state(state.clone()))
        .and_then(tag_create);

    let tag_get = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(tag_get);

    let ingredient_list = warp::path!("ingredients")
        .and(warp::get())
        .and(query_pairs())
        .and(with_state(state.clone()))
        .and_then(ingredient_list);

    let ingredient_create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<IngredientPayload>())
        .and(with_state(state.clone()))
        .and_then(ingredient_create);

    let ingredient_get = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(ingredient_get);

    let ingredient_delete = warp::path!("ingredients" / Id)
        .and(warp::delete())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state))
        .and_then(ingredient_delete);

    tag_list
        .or(tag_create)
        .unify()
        .or(tag_get)
        .unify()
        .or(ingredient_list)
        .unify()
        .or(ingredient_create)
        .unify()
        .or(ingredient_get)
        .unify()
        .or(ingredient_delete)
        .unify()
        .boxed()
}

async fn tag_list(state: AppState) -> Result<Response, Rejection> {
    let tags = list_tags(&state.pool).await?;
    Ok(json(&tags, StatusCode::OK))
}

async fn tag_get(id: Id, state: AppState) -> Result<Response, Rejection> {
    let tag = get_tag(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("No tag exists with the specified id."))?;
    Ok(json(&tag, StatusCode::OK))
}

async fn tag_create(
    session: SessionData,
    payload: TagPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageCatalogue)?;
    let (name, slug) = payload.validate()?;

    let tag = create_tag(&state.pool, &name, &slug).await?;
    Ok(json(&tag, StatusCode::CREATED))
}

async fn ingredient_list(
    query: Vec<(String, String)>,
    state: AppState,
) -> Result<Response, Rejection> {
    let name = query
        .iter()
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.as_str());

    let ingredients = list_ingredients(&state.pool, name).await?;
    Ok(json(&ingredients, StatusCode::OK))
}

async fn ingredient_get(id: Id, state: AppState) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("No ingredient exists with the specified id."))?;
    Ok(json(&ingredient, StatusCode::OK))
}

async fn ingredient_create(
    session: SessionData,
    payload: IngredientPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageCatalogue)?;
    let (name, measurement_unit) = payload.validate()?;

    let ingredient = create_ingredient(&state.pool, &name, &measurement_unit).await?;
    Ok(json(&ingredient, StatusCode::CREATED))
}

async fn ingredient_delete(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageCatalogue)?;
    delete_ingredient(&state.pool, id).await?;
    Ok(no_content())
}
