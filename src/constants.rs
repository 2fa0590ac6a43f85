pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_AMOUNT: i64 = 1;
pub const MIN_COOKING_TIME: i64 = 1;

pub const TAG_NAME_MAX_LENGTH: usize = 32;
pub const TAG_SLUG_MAX_LENGTH: usize = 32;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const INGREDIENT_UNIT_MAX_LENGTH: usize = 64;
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;

pub const USER_EMAIL_MAX_LENGTH: usize = 254;
pub const USER_USERNAME_MAX_LENGTH: usize = 150;
pub const USER_NAME_MAX_LENGTH: usize = 150;
pub const USER_PASSWORD_MAX_LENGTH: usize = 128;

pub const MAX_BODY_SIZE: u64 = 1024 * 1024 * 10;

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
pub const AVATAR_IMAGE_DIR: &str = "users/avatars";

pub const SHOPPING_LIST_TITLE: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
