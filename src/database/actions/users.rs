use crate::{
    authentication::cryptography::{hash_password, verify_password},
    error::{ApiError, QueryError},
    form::{Form, NewUser},
    jwt::SessionKeys,
    pagination::LimitOffset,
    schema::{Id, User},
};

use log::info;
use sqlx::{Pool, Postgres};

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_or_404(pool: &Pool<Postgres>, user_id: Id) -> Result<User, ApiError> {
    get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user exists with the specified id."))
}

/// Creates a user, storing an argon2 hash of their password.
pub async fn register_user(pool: &Pool<Postgres>, user: NewUser) -> Result<User, ApiError> {
    let taken: Vec<(String, String)> = sqlx::query_as(
        "SELECT LOWER(email), username FROM users WHERE LOWER(email) = LOWER($1) OR username = $2",
    )
    .bind(&user.email)
    .bind(&user.username)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut form = Form::new();
    for (email, username) in &taken {
        if *email == user.email.to_lowercase() {
            form.error("email", "A user with that email already exists.");
        }
        if *username == user.username {
            form.error("username", "A user with that username already exists.");
        }
    }
    if !form.is_valid() {
        return form.finish(None);
    }

    let password = hash_password(&user.password)?;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    info!("Registered user {} ({})", row.username, row.id);
    Ok(row)
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    keys: &SessionKeys,
    email: &str,
    password: &str,
) -> Result<String, ApiError> {
    let invalid = || ApiError::bad_request("Unable to log in with provided credentials.");

    let user = get_user_by_email(pool, email).await?.ok_or_else(invalid)?;
    let authenticated = verify_password(password, &user.password)?;
    if !authenticated {
        return Err(invalid());
    }

    keys.issue(&user)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    current_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let user = get_user_or_404(pool, user_id).await?;
    let authenticated = verify_password(current_password, &user.password)?;
    if !authenticated {
        return Err(ApiError::field("current_password", "Invalid password."));
    }

    let password = hash_password(new_password)?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    window: &LimitOffset,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<User> =
        sqlx::query_as("SELECT * FROM users ORDER BY username LIMIT $1 OFFSET $2")
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((rows, total.0))
}

/// Replaces the avatar path and returns the previous one.
pub async fn set_avatar(
    pool: &Pool<Postgres>,
    user_id: Id,
    avatar: Option<&str>,
) -> Result<Option<String>, ApiError> {
    let previous: Option<(Option<String>,)> = sqlx::query_as(
        "
        UPDATE users u SET avatar = $1
        FROM (SELECT id, avatar FROM users WHERE id = $2 FOR UPDATE) old
        WHERE u.id = old.id
        RETURNING old.avatar
    ",
    )
    .bind(avatar)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match previous {
        Some((previous,)) => Ok(previous),
        None => Err(ApiError::not_found("No user exists with the specified id.")),
    }
}
