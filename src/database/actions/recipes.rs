use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    error::{ApiError, QueryError},
    form::{Form, RecipeDraft},
    jwt::SessionData,
    pagination::PageNumber,
    schema::{Id, Recipe, RecipePart, RecipeRow},
};

use log::info;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

/// Recipe list filters. The relation flags restrict to the viewer's own relations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
    page: &PageNumber,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    if viewer.is_none() && (filter.is_favorited || filter.is_in_shopping_cart) {
        return Ok((vec![], 0));
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(|row| row.recipe).collect(), total_count))
}

pub async fn get_recipe(pool: &Pool<Postgres>, id: Id) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_or_404(pool: &Pool<Postgres>, id: Id) -> Result<Recipe, ApiError> {
    get_recipe(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("No recipe exists with the specified id."))
}

/// Loads a recipe the session may modify: its author's, or any for admins.
pub async fn get_recipe_mut(
    pool: &Pool<Postgres>,
    id: Id,
    session: &SessionData,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe_or_404(pool, id).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(_) => Ok(recipe),
        Err(_) if recipe.author_id == session.user_id => Ok(recipe),
        Err(e) => Err(e),
    }
}

pub async fn list_recipe_parts(
    pool: &Pool<Postgres>,
    recipe_id: Id,
) -> Result<Vec<RecipePart>, ApiError> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Newest first, truncated to `limit` when given.
pub async fn fetch_author_recipes(
    pool: &Pool<Postgres>,
    author_id: Id,
    limit: Option<i64>,
) -> Result<Vec<Recipe>, ApiError> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
    )
    .bind(author_id)
    .bind(limit.map(|limit| limit.max(0)))
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn count_author_recipes(pool: &Pool<Postgres>, author_id: Id) -> Result<i64, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

/// Creates the recipe with its tags and ingredient amounts in one transaction.
pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    draft: &RecipeDraft,
    image: &str,
) -> Result<Id, ApiError> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    ensure_references(&mut tx, draft).await?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(image)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    replace_tags(&mut tx, id.0, &draft.tags).await?;
    replace_ingredients(&mut tx, id.0, &draft.ingredients).await?;

    tx.commit().await.map_err(QueryError::from)?;

    info!("User {author_id} created recipe {}", id.0);
    Ok(id.0)
}

/// Rewrites the recipe, its tag set and its ingredient rows in one transaction.
/// `image` replaces the stored image path when given.
pub async fn update_recipe(
    pool: &Pool<Postgres>,
    id: Id,
    draft: &RecipeDraft,
    image: Option<&str>,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    ensure_references(&mut tx, draft).await?;

    let result = sqlx::query(
        "
        UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(draft.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("No recipe exists with the specified id."));
    }

    replace_tags(&mut tx, id, &draft.tags).await?;
    replace_ingredients(&mut tx, id, &draft.ingredients).await?;

    tx.commit().await.map_err(QueryError::from)?;

    Ok(())
}

/// Join rows, favorites and cart entries go with the recipe.
pub async fn delete_recipe(pool: &Pool<Postgres>, id: Id) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("No recipe exists with the specified id."));
    }

    info!("Deleted recipe {id}");
    Ok(())
}

async fn ensure_references(conn: &mut PgConnection, draft: &RecipeDraft) -> Result<(), ApiError> {
    let ingredient_ids: Vec<Id> = draft.ingredients.iter().map(|(id, _)| *id).collect();
    let missing_ingredients = missing_ids(conn, "ingredients", &ingredient_ids).await?;
    let missing_tags = missing_ids(conn, "tags", &draft.tags).await?;

    let mut form = Form::new();
    for id in missing_ingredients {
        form.error("ingredients", format!("Ingredient {id} does not exist."));
    }
    for id in missing_tags {
        form.error("tags", format!("Tag {id} does not exist."));
    }

    form.finish(Some(()))
}

async fn missing_ids(conn: &mut PgConnection, table: &str, ids: &[Id]) -> Result<Vec<Id>, ApiError> {
    let found: Vec<(Id,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();
    Ok(ids.iter().filter(|id| !found.contains(id)).copied().collect())
}

async fn replace_tags(conn: &mut PgConnection, recipe_id: Id, tags: &[Id]) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::int[])")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// The join rows carry an amount, so they are deleted and re-inserted.
async fn replace_ingredients(
    conn: &mut PgConnection,
    recipe_id: Id,
    parts: &[(Id, i32)],
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if parts.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(parts, |mut row, (ingredient_id, amount)| {
        row.push_bind(recipe_id)
            .push_bind(*ingredient_id)
            .push_bind(*amount);
    });

    query
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
