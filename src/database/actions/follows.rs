use crate::{
    error::{ApiError, QueryError},
    pagination::LimitOffset,
    schema::{Id, User},
};

use sqlx::{Pool, Postgres};

pub async fn is_subscribed(
    pool: &Pool<Postgres>,
    user_id: Id,
    author_id: Id,
) -> Result<bool, ApiError> {
    let result: Option<(Id,)> =
        sqlx::query_as("SELECT id FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn subscribe(pool: &Pool<Postgres>, user_id: Id, author_id: Id) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(ApiError::bad_request("You cannot subscribe to yourself"));
    }

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("You are already subscribed to this user"));
    }

    Ok(())
}

pub async fn unsubscribe(
    pool: &Pool<Postgres>,
    user_id: Id,
    author_id: Id,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("You are not subscribed to this user"));
    }

    Ok(())
}

/// Authors the user follows, ordered by username.
pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    user_id: Id,
    window: &LimitOffset,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<User> = sqlx::query_as(
        "
        SELECT u.* FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(window.limit)
    .bind(window.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total.0))
}
