use serde_json::json;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use super::filters::{json, json_body, no_content, parse_flag, parse_int, query_pairs, with_state};
use crate::{
    actions::{
        add_relation, create_recipe, delete_recipe, fetch_recipes, fetch_shopping_list,
        get_recipe_mut, get_recipe_or_404, remove_relation, update_recipe, RecipeFilter,
        RecipeRelation,
    },
    constants::{RECIPE_IMAGE_DIR, SHOPPING_LIST_FILENAME},
    error::ApiError,
    form::RecipePayload,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageNumber},
    permissions::ActionType,
    representation::{present_recipe, RecipeMinified, RecipeRepr},
    schema::Id,
    state::AppState,
};

pub fn routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(query_pairs())
        .and(with_possible_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_list);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_state(state.clone()))
        .and_then(recipe_create);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let get = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_get);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.sessions.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_state(state.clone()))
        .and_then(recipe_update);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_delete);

    let link = warp::path!("recipes" / Id / "get-link")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(recipe_link);

    let favorite = relation_routes(state.clone(), "favorite", RecipeRelation::Favorite);
    let cart = relation_routes(state, "shopping_cart", RecipeRelation::ShoppingCart);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(link)
        .unify()
        .or(favorite)
        .unify()
        .or(cart)
        .unify()
        .boxed()
}

/// POST adds and DELETE removes the (user, recipe) relation behind `segment`.
fn relation_routes(
    state: AppState,
    segment: &'static str,
    relation: RecipeRelation,
) -> BoxedFilter<(Response,)> {
    let path = warp::path("recipes")
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = path
        .clone()
        .and(warp::post())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            relation_add(id, session, state, relation)
        });

    let remove = path
        .and(warp::delete())
        .and(with_session(state.sessions.clone()))
        .and(with_state(state))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            relation_remove(id, session, state, relation)
        });

    add.or(remove).unify().boxed()
}

/// Splits the listing query into filters, the page window and the parameters
/// to repeat in the `next`/`previous` links.
pub fn parse_recipe_query(
    query: &[(String, String)],
) -> Result<(RecipeFilter, PageNumber, Vec<(String, String)>), ApiError> {
    let mut filter = RecipeFilter::default();
    let mut page = None;
    let mut limit = None;
    let mut carried = vec![];

    for (key, value) in query {
        match key.as_str() {
            "page" => {
                page = Some(
                    value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ApiError::not_found("Invalid page."))?,
                );
                continue;
            }
            // An unreadable limit falls back to the default page size.
            "limit" => {
                limit = value.trim().parse::<i64>().ok();
                continue;
            }
            "author" => {
                let author = Id::try_from(parse_int("author", value)?)
                    .map_err(|_| ApiError::field("author", "A valid integer is required."))?;
                filter.author = Some(author);
            }
            "tags" => {
                let slug = value.trim();
                if !slug.is_empty() && !filter.tags.iter().any(|tag| tag == slug) {
                    filter.tags.push(slug.to_string());
                }
            }
            "is_favorited" => filter.is_favorited = parse_flag("is_favorited", value)?,
            "is_in_shopping_cart" => {
                filter.is_in_shopping_cart = parse_flag("is_in_shopping_cart", value)?
            }
            _ => {}
        }
        carried.push((key.to_owned(), value.to_owned()));
    }

    Ok((filter, PageNumber::new(page, limit)?, carried))
}

async fn recipe_list(
    query: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let (filter, page, carried) = parse_recipe_query(&query)?;
    let viewer = session.map(|s| s.user_id);

    let (recipes, total) = fetch_recipes(&state.pool, &filter, viewer, &page).await?;
    let context = page.context(
        recipes,
        total,
        &state.absolute("/api/recipes/"),
        &carried,
    )?;

    let mut results: Vec<RecipeRepr> = Vec::with_capacity(context.results.len());
    for recipe in context.results {
        results.push(present_recipe(&state.pool, &state.media, recipe, viewer).await?);
    }

    let page = PageContext {
        count: context.count,
        next: context.next,
        previous: context.previous,
        results,
    };
    Ok(json(&page, StatusCode::OK))
}

async fn recipe_get(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_or_404(&state.pool, id).await?;
    let repr = present_recipe(&state.pool, &state.media, recipe, session.map(|s| s.user_id)).await?;
    Ok(json(&repr, StatusCode::OK))
}

async fn recipe_create(
    session: SessionData,
    payload: RecipePayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let draft = payload.validate(true)?;
    let image = draft
        .image
        .as_ref()
        .ok_or_else(|| ApiError::field("image", "This field is required."))?;

    let stored = state.media.save(RECIPE_IMAGE_DIR, image).await?;
    let id = match create_recipe(&state.pool, session.user_id, &draft, &stored).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&stored).await;
            return Err(e.into());
        }
    };

    let recipe = get_recipe_or_404(&state.pool, id).await?;
    let repr = present_recipe(&state.pool, &state.media, recipe, Some(session.user_id)).await?;
    Ok(json(&repr, StatusCode::CREATED))
}

async fn recipe_update(
    id: Id,
    session: SessionData,
    payload: RecipePayload,
    state: AppState,
) -> Result<Response, Rejection> {
    let current = get_recipe_mut(&state.pool, id, &session).await?;
    let draft = payload.validate(false)?;

    let stored = match &draft.image {
        Some(image) => Some(state.media.save(RECIPE_IMAGE_DIR, image).await?),
        None => None,
    };

    if let Err(e) = update_recipe(&state.pool, id, &draft, stored.as_deref()).await {
        if let Some(stored) = &stored {
            state.media.remove(stored).await;
        }
        return Err(e.into());
    }
    if stored.is_some() {
        state.media.remove(&current.image).await;
    }

    let recipe = get_recipe_or_404(&state.pool, id).await?;
    let repr = present_recipe(&state.pool, &state.media, recipe, Some(session.user_id)).await?;
    Ok(json(&repr, StatusCode::OK))
}

async fn recipe_delete(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(&state.pool, id, &session).await?;

    delete_recipe(&state.pool, id).await?;
    state.media.remove(&recipe.image).await;

    Ok(no_content())
}

async fn recipe_link(id: Id, state: AppState) -> Result<Response, Rejection> {
    let recipe = get_recipe_or_404(&state.pool, id).await?;
    let link = format!("{}/recipes/{}", state.public_url, recipe.id);

    Ok(json(&json!({ "short-link": link }), StatusCode::OK))
}

async fn relation_add(
    id: Id,
    session: SessionData,
    state: AppState,
    relation: RecipeRelation,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = get_recipe_or_404(&state.pool, id).await?;

    add_relation(&state.pool, relation, session.user_id, recipe.id).await?;
    Ok(json(
        &RecipeMinified::new(&recipe, &state.media),
        StatusCode::CREATED,
    ))
}

async fn relation_remove(
    id: Id,
    session: SessionData,
    state: AppState,
    relation: RecipeRelation,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = get_recipe_or_404(&state.pool, id).await?;

    remove_relation(&state.pool, relation, session.user_id, recipe.id).await?;
    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let list = fetch_shopping_list(&state.pool, session.user_id).await?;

    let reply = reply::with_header(
        list.to_string(),
        "content-type",
        "text/plain; charset=utf-8",
    );
    let reply = reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(reply.into_response())
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
    fn reads_filters_and_window() {
        let query = pairs(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("tags", "breakfast"),
            ("author", "4"),
            ("is_favorited", "1"),
            ("page", "2"),
            ("limit", "3"),
        ]);
        let (filter, page, carried) = parse_recipe_query(&query).unwrap();

        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.author, Some(4));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
        assert_eq!(page, PageNumber { page: 2, limit: 3 });
        assert_eq!(carried.len(), 5);
    }

    #[test]
    fn unreadable_page_is_not_found() {
        let error = parse_recipe_query(&pairs(&[("page", "abc")])).unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let error = parse_recipe_query(&pairs(&[("page", "0")])).unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unreadable_author_is_a_field_error() {
        let error = parse_recipe_query(&pairs(&[("author", "me")])).unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.body().get("author").is_some());
    }

    #[test]
    fn unknown_parameters_are_ignored_but_carried() {
        let (filter, page, carried) = parse_recipe_query(&pairs(&[("format", "json")])).unwrap();

        assert_eq!(filter, RecipeFilter::default());
        assert_eq!(page, PageNumber::default());
        assert_eq!(carried, pairs(&[("format", "json")]));
    }
}
