use std::collections::HashSet;

use serde::Deserialize;

use super::{
    error::{ApiError, FieldErrors},
    schema::Id,
};
use crate::{
    constants::{
        INGREDIENT_NAME_MAX_LENGTH, INGREDIENT_UNIT_MAX_LENGTH, MIN_AMOUNT, MIN_COOKING_TIME,
        RECIPE_NAME_MAX_LENGTH, TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH, USER_EMAIL_MAX_LENGTH,
        USER_NAME_MAX_LENGTH, USER_PASSWORD_MAX_LENGTH, USER_USERNAME_MAX_LENGTH,
    },
    media::{decode_image, ImageUpload},
};

const REQUIRED: &str = "This field is required.";

/// Collects per-field messages while a payload is checked.
#[derive(Default)]
pub struct Form {
    errors: FieldErrors,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.error(field, REQUIRED);
        }
        value
    }

    /// Required, non-blank text no longer than `max` characters.
    pub fn text(&mut self, field: &str, value: Option<String>, max: usize) -> Option<String> {
        let value = self.required(field, value)?;
        let trimmed = value.trim();

        if trimmed.is_empty() {
            self.error(field, "This field may not be blank.");
            return None;
        }
        if trimmed.chars().count() > max {
            self.error(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Required integer no smaller than `min`.
    pub fn at_least(&mut self, field: &str, value: Option<i64>, min: i64) -> Option<i32> {
        let value = self.required(field, value)?;

        if value < min {
            self.error(field, format!("Ensure this value is at least {min}."));
            return None;
        }
        match i32::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error(field, "Ensure this value is not too large.");
                None
            }
        }
    }

    pub fn image(&mut self, field: &str, value: Option<String>) -> Option<ImageUpload> {
        let value = self.required(field, value)?;

        match decode_image(&value) {
            Ok(image) => Some(image),
            Err(info) => {
                self.error(field, info);
                None
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish<T>(self, value: Option<T>) -> Result<T, ApiError> {
        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(ApiError::Validation(self.errors)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i64,
}

#[derive(Deserialize, Debug, Default)]
pub struct RecipePayload {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

/// A validated recipe write. `image` is absent only for updates keeping the old image.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<ImageUpload>,
    pub tags: Vec<Id>,
    pub ingredients: Vec<(Id, i32)>,
}

impl RecipePayload {
    pub fn validate(self, require_image: bool) -> Result<RecipeDraft, ApiError> {
        let mut form = Form::new();

        let name = form.text("name", self.name, RECIPE_NAME_MAX_LENGTH);
        let text = form.text("text", self.text, usize::MAX);
        let cooking_time = form.at_least("cooking_time", self.cooking_time, MIN_COOKING_TIME);
        let image = match (self.image, require_image) {
            (None, false) => Some(None),
            (image, _) => form.image("image", image).map(Some),
        };
        let tags = validate_tags(&mut form, self.tags);
        let ingredients = validate_ingredients(&mut form, self.ingredients);

        let draft = match (name, text, cooking_time, image, tags, ingredients) {
            (Some(name), Some(text), Some(cooking_time), Some(image), Some(tags), Some(ingredients)) => {
                Some(RecipeDraft {
                    name,
                    text,
                    cooking_time,
                    image,
                    tags,
                    ingredients,
                })
            }
            _ => None,
        };

        form.finish(draft)
    }
}

fn validate_tags(form: &mut Form, tags: Option<Vec<Id>>) -> Option<Vec<Id>> {
    let tags = form.required("tags", tags)?;

    if tags.is_empty() {
        form.error("tags", "At least one tag is required.");
        return None;
    }

    let mut seen = HashSet::new();
    if tags.iter().any(|id| !seen.insert(*id)) {
        form.error("tags", "Tags must not repeat.");
        return None;
    }

    Some(tags)
}

fn validate_ingredients(
    form: &mut Form,
    ingredients: Option<Vec<IngredientAmount>>,
) -> Option<Vec<(Id, i32)>> {
    let ingredients = form.required("ingredients", ingredients)?;

    if ingredients.is_empty() {
        form.error("ingredients", "At least one ingredient is required.");
        return None;
    }

    let mut seen = HashSet::new();
    if ingredients.iter().any(|part| !seen.insert(part.id)) {
        form.error("ingredients", "Ingredients must not repeat.");
        return None;
    }

    let mut parts: Vec<(Id, i32)> = Vec::with_capacity(ingredients.len());
    for part in &ingredients {
        if part.amount < MIN_AMOUNT {
            form.error(
                "ingredients",
                format!(
                    "Ingredient {}: ensure the amount is at least {MIN_AMOUNT}.",
                    part.id
                ),
            );
            continue;
        }
        match i32::try_from(part.amount) {
            Ok(amount) => parts.push((part.id, amount)),
            Err(_) => form.error(
                "ingredients",
                format!("Ingredient {}: the amount is too large.", part.id),
            ),
        }
    }

    if parts.len() != ingredients.len() {
        return None;
    }

    Some(parts)
}

#[derive(Deserialize, Debug, Default)]
pub struct UserPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserPayload {
    pub fn validate(self) -> Result<NewUser, ApiError> {
        let mut form = Form::new();

        let email = form
            .text("email", self.email, USER_EMAIL_MAX_LENGTH)
            .filter(|email| {
                let valid = is_valid_email(email);
                if !valid {
                    form.error("email", "Enter a valid email address.");
                }
                valid
            })
            .map(|email| email.to_lowercase());
        let username = form
            .text("username", self.username, USER_USERNAME_MAX_LENGTH)
            .filter(|username| {
                let valid = is_valid_username(username);
                if !valid {
                    form.error(
                        "username",
                        "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
                    );
                }
                valid
            });
        let first_name = form.text("first_name", self.first_name, USER_NAME_MAX_LENGTH);
        let last_name = form.text("last_name", self.last_name, USER_NAME_MAX_LENGTH);
        let password = form.text("password", self.password, USER_PASSWORD_MAX_LENGTH);

        let user = match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) => {
                Some(NewUser {
                    email,
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => None,
        };

        form.finish(user)
    }
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let mut form = Form::new();
        let email = form.text("email", self.email, USER_EMAIL_MAX_LENGTH);
        let password = form.text("password", self.password, USER_PASSWORD_MAX_LENGTH);

        form.finish(email.zip(password))
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PasswordPayload {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

impl PasswordPayload {
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let mut form = Form::new();
        let new_password = form.text("new_password", self.new_password, USER_PASSWORD_MAX_LENGTH);
        let current_password = form.text(
            "current_password",
            self.current_password,
            USER_PASSWORD_MAX_LENGTH,
        );

        form.finish(new_password.zip(current_password))
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AvatarPayload {
    pub avatar: Option<String>,
}

impl AvatarPayload {
    pub fn validate(self) -> Result<ImageUpload, ApiError> {
        let mut form = Form::new();
        let avatar = form.image("avatar", self.avatar);

        form.finish(avatar)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct TagPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
}

impl TagPayload {
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let mut form = Form::new();
        let name = form.text("name", self.name, TAG_NAME_MAX_LENGTH);
        let slug = form
            .text("slug", self.slug, TAG_SLUG_MAX_LENGTH)
            .filter(|slug| {
                let valid = slug
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                if !valid {
                    form.error(
                        "slug",
                        "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                    );
                }
                valid
            });

        form.finish(name.zip(slug))
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

impl IngredientPayload {
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let mut form = Form::new();
        let name = form.text("name", self.name, INGREDIENT_NAME_MAX_LENGTH);
        let unit = form.text(
            "measurement_unit",
            self.measurement_unit,
            INGREDIENT_UNIT_MAX_LENGTH,
        );

        form.finish(name.zip(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn recipe() -> RecipePayload {
        RecipePayload {
            name: Some(String::from("Pancakes")),
            image: Some(String::from(PNG)),
            text: Some(String::from("Mix and fry.")),
            cooking_time: Some(20),
            tags: Some(vec![1, 2]),
            ingredients: Some(vec![
                IngredientAmount { id: 1, amount: 200 },
                IngredientAmount { id: 2, amount: 2 },
            ]),
        }
    }

    fn field_errors(result: Result<RecipeDraft, ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_complete_recipe() {
        let draft = recipe().validate(true).unwrap();

        assert_eq!(draft.name, "Pancakes");
        assert_eq!(draft.cooking_time, 20);
        assert_eq!(draft.tags, vec![1, 2]);
        assert_eq!(draft.ingredients, vec![(1, 200), (2, 2)]);
        assert_eq!(draft.image.map(|image| image.extension), Some("png"));
    }

    #[test]
    fn rejects_duplicate_ingredients() {
        let mut payload = recipe();
        payload.ingredients = Some(vec![
            IngredientAmount { id: 3, amount: 1 },
            IngredientAmount { id: 3, amount: 5 },
        ]);

        let errors = field_errors(payload.validate(true));
        assert_eq!(errors["ingredients"], vec!["Ingredients must not repeat."]);
    }

    #[test]
    fn rejects_duplicate_and_missing_tags() {
        let mut payload = recipe();
        payload.tags = Some(vec![4, 4]);
        assert!(field_errors(payload.validate(true)).contains_key("tags"));

        let mut payload = recipe();
        payload.tags = Some(vec![]);
        assert!(field_errors(payload.validate(true)).contains_key("tags"));

        let mut payload = recipe();
        payload.tags = None;
        assert_eq!(field_errors(payload.validate(true))["tags"], vec![REQUIRED]);
    }

    #[test]
    fn rejects_zero_cooking_time() {
        let mut payload = recipe();
        payload.cooking_time = Some(0);

        let errors = field_errors(payload.validate(true));
        assert_eq!(
            errors["cooking_time"],
            vec!["Ensure this value is at least 1."]
        );
    }

    #[test]
    fn bad_amounts_name_their_ingredient() {
        let mut payload = recipe();
        payload.ingredients = Some(vec![
            IngredientAmount { id: 1, amount: 3 },
            IngredientAmount { id: 7, amount: 0 },
            IngredientAmount { id: 8, amount: i64::MAX },
        ]);

        let errors = field_errors(payload.validate(true));
        assert!(!errors.contains_key("amount"));
        assert_eq!(
            errors["ingredients"],
            vec![
                "Ingredient 7: ensure the amount is at least 1.",
                "Ingredient 8: the amount is too large.",
            ]
        );
    }

    #[test]
    fn padded_passwords_match_between_registration_and_login() {
        let padded = String::from("  pass word  ");
        let user = UserPayload {
            email: Some(String::from("cook@example.com")),
            username: Some(String::from("cook")),
            first_name: Some(String::from("Ann")),
            last_name: Some(String::from("Smith")),
            password: Some(padded.clone()),
        }
        .validate()
        .unwrap();

        let (_, login_password) = LoginPayload {
            email: Some(String::from("cook@example.com")),
            password: Some(padded.clone()),
        }
        .validate()
        .unwrap();

        let (_, current_password) = PasswordPayload {
            new_password: Some(String::from("another one")),
            current_password: Some(padded),
        }
        .validate()
        .unwrap();

        assert_eq!(user.password, "pass word");
        assert_eq!(login_password, user.password);
        assert_eq!(current_password, user.password);
    }

    #[test]
    fn rejects_empty_ingredients() {
        let mut payload = recipe();
        payload.ingredients = Some(vec![]);

        assert!(field_errors(payload.validate(true)).contains_key("ingredients"));
    }

    #[test]
    fn image_is_required_only_on_create() {
        let mut payload = recipe();
        payload.image = None;
        assert_eq!(field_errors(payload.validate(true))["image"], vec![REQUIRED]);

        let mut payload = recipe();
        payload.image = None;
        assert!(payload.validate(false).unwrap().image.is_none());
    }

    #[test]
    fn reports_every_invalid_field() {
        let errors = field_errors(RecipePayload::default().validate(true));
        let fields: Vec<&str> = errors.keys().map(String::as_str).collect();

        assert_eq!(
            fields,
            vec!["cooking_time", "image", "ingredients", "name", "tags", "text"]
        );
    }

    #[test]
    fn validates_users() {
        let payload = UserPayload {
            email: Some(String::from("Cook@Example.com")),
            username: Some(String::from("cook.42")),
            first_name: Some(String::from("Ann")),
            last_name: Some(String::from("Smith")),
            password: Some(String::from("s3cret-pass")),
        };
        let user = payload.validate().unwrap();
        assert_eq!(user.email, "cook@example.com");

        let payload = UserPayload {
            email: Some(String::from("nope")),
            username: Some(String::from("bad name")),
            ..Default::default()
        };
        match payload.validate() {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("username"));
                assert!(errors.contains_key("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn username_and_email_rules() {
        assert!(is_valid_username("a.b@c+d-e_f"));
        assert!(!is_valid_username("a b"));
        assert!(!is_valid_username("semi;colon"));
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.io"));
    }

    #[test]
    fn validates_tag_slugs() {
        let payload = TagPayload {
            name: Some(String::from("Breakfast")),
            slug: Some(String::from("break fast")),
        };
        assert!(payload.validate().is_err());

        let payload = TagPayload {
            name: Some(String::from("Breakfast")),
            slug: Some(String::from("breakfast")),
        };
        assert_eq!(
            payload.validate().unwrap(),
            (String::from("Breakfast"), String::from("breakfast"))
        );
    }
}
