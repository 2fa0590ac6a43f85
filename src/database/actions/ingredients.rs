use crate::{
    error::{ApiError, ConstraintKind, QueryError},
    schema::{Id, Ingredient},
};

use log::info;
use sqlx::{Pool, Postgres};

/// Ingredients whose name starts with `name` (case-insensitive), or all of them.
pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    name: Option<&str>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => sqlx::query_as(
            "SELECT * FROM ingredients WHERE name ILIKE $1 ESCAPE '\\' ORDER BY name, measurement_unit",
        )
        .bind(format!("{}%", escape_like(name)))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, measurement_unit")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING *
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| {
        ApiError::field(
            "name",
            "An ingredient with this name and measurement unit already exists.",
        )
    })
}

/// Deletes an ingredient. Refused while any recipe still uses it.
pub async fn delete_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match QueryError::from(e) {
            e if e.constraint() == Some(ConstraintKind::ForeignKey) => {
                ApiError::bad_request("Ingredient is used in recipes and cannot be deleted")
            }
            e => e.into(),
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("No ingredient exists with the specified id."));
    }

    Ok(())
}

/// Inserts every (name, unit) pair not present yet; returns how many were new.
pub async fn import_ingredients(
    pool: &Pool<Postgres>,
    ingredients: &[(String, String)],
) -> Result<u64, ApiError> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let mut created = 0;

    for (name, measurement_unit) in ingredients {
        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(measurement_unit)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

        created += result.rows_affected();
    }

    tx.commit().await.map_err(QueryError::from)?;

    info!(
        "Imported {} ingredients, {created} of them new",
        ingredients.len()
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("flour"), "flour");
    }
}
