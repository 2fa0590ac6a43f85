mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod representation;
    pub mod schema;
    pub mod shopping_list;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod auth;
    pub mod catalogue;
    pub mod filters;
    pub mod recipes;
    pub mod rejection;
    pub mod routes;
    pub mod users;
}
pub mod config;
pub mod constants;
pub mod media;
pub mod state;

pub use api::routes::routes;
pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use media::*;
pub use state::*;
