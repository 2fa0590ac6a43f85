mod follows;
mod ingredients;
mod recipes;
mod relations;
mod tags;
mod users;

pub use follows::*;
pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use tags::*;
pub use users::*;
