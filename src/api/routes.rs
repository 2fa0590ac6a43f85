use std::convert::Infallible;

use warp::{fs::File, Filter, Reply};

use super::{auth, catalogue, recipes, rejection::handle_rejection, users};
use crate::state::AppState;

/// The whole HTTP surface: `/api/...` plus stored images under `/media/`.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api").and(
        catalogue::routes(state.clone())
            .or(recipes::routes(state.clone()))
            .unify()
            .or(users::routes(state.clone()))
            .unify()
            .or(auth::routes(state.clone()))
            .unify(),
    );

    let media = warp::path("media").and(warp::fs::dir(state.media.root().to_path_buf()));

    api.or(media.map(|file: File| file.into_response()))
        .unify()
        .with(warp::log("foodgram"))
        .recover(handle_rejection)
}
