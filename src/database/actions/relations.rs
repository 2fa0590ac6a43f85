use crate::{
    error::{ApiError, QueryError},
    schema::{CartPart, Id},
    shopping_list::ShoppingList,
};

use sqlx::{Pool, Postgres};

/// A (user, recipe) relation toggled from the recipe endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    fn table(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorites",
            RecipeRelation::ShoppingCart => "shopping_cart",
        }
    }

    fn already_present(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites",
            RecipeRelation::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_present(self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites",
            RecipeRelation::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

pub async fn is_related(
    pool: &Pool<Postgres>,
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
) -> Result<bool, ApiError> {
    let result: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn add_relation(
    pool: &Pool<Postgres>,
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(relation.already_present()));
    }

    Ok(())
}

pub async fn remove_relation(
    pool: &Pool<Postgres>,
    relation: RecipeRelation,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(relation.not_present()));
    }

    Ok(())
}

/// Every ingredient line of every recipe in the user's cart, unaggregated.
pub async fn list_cart_parts(pool: &Pool<Postgres>, user_id: Id) -> Result<Vec<CartPart>, ApiError> {
    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn fetch_shopping_list(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<ShoppingList, ApiError> {
    let parts = list_cart_parts(pool, user_id).await?;
    Ok(ShoppingList::from_parts(parts))
}
