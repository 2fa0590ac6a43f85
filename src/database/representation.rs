//! JSON shapes served by the API, assembled from rows plus per-viewer flags.

use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::{
    actions::{
        count_author_recipes, fetch_author_recipes, get_user_by_id, is_related, is_subscribed,
        list_recipe_parts, list_recipe_tags, RecipeRelation,
    },
    error::ApiError,
    media::MediaStore,
    schema::{Id, Recipe, RecipePart, Tag, User},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserRepr {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserRepr {
    pub fn new(user: &User, is_subscribed: bool, media: &MediaStore) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
            avatar: user.avatar.as_deref().map(|path| media.url(path)),
        }
    }
}

/// What registration answers with: no flags, no avatar.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreatedUser {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUser {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeMinified {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeMinified {
    pub fn new(recipe: &Recipe, media: &MediaStore) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: media.url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserWithRecipes {
    #[serde(flatten)]
    pub user: UserRepr,
    pub recipes: Vec<RecipeMinified>,
    pub recipes_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeRepr {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserRepr,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

pub async fn present_user(
    pool: &Pool<Postgres>,
    media: &MediaStore,
    user: &User,
    viewer: Option<Id>,
) -> Result<UserRepr, ApiError> {
    let subscribed = match viewer {
        Some(viewer) => is_subscribed(pool, viewer, user.id).await?,
        None => false,
    };

    Ok(UserRepr::new(user, subscribed, media))
}

pub async fn present_user_with_recipes(
    pool: &Pool<Postgres>,
    media: &MediaStore,
    user: &User,
    viewer: Option<Id>,
    recipes_limit: Option<i64>,
) -> Result<UserWithRecipes, ApiError> {
    let recipes = fetch_author_recipes(pool, user.id, recipes_limit).await?;

    Ok(UserWithRecipes {
        user: present_user(pool, media, user, viewer).await?,
        recipes: recipes
            .iter()
            .map(|recipe| RecipeMinified::new(recipe, media))
            .collect(),
        recipes_count: count_author_recipes(pool, user.id).await?,
    })
}

pub async fn present_recipe(
    pool: &Pool<Postgres>,
    media: &MediaStore,
    recipe: Recipe,
    viewer: Option<Id>,
) -> Result<RecipeRepr, ApiError> {
    let author = get_user_by_id(pool, recipe.author_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Recipe {} has no author", recipe.id)))?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            is_related(pool, RecipeRelation::Favorite, viewer, recipe.id).await?,
            is_related(pool, RecipeRelation::ShoppingCart, viewer, recipe.id).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeRepr {
        id: recipe.id,
        tags: list_recipe_tags(pool, recipe.id).await?,
        author: present_user(pool, media, &author, viewer).await?,
        ingredients: list_recipe_parts(pool, recipe.id).await?,
        is_favorited,
        is_in_shopping_cart,
        image: media.url(&recipe.image),
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}
