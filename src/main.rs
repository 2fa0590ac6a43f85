use std::error::Error;

use env_logger::Env;
use foodgram::{connect, routes, AppState, Config};
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn")).init();

    let config = Config::load()?;
    let pool = connect(&config).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    tokio::fs::create_dir_all(&config.media_root).await?;
    let state = AppState::new(pool, &config)?;

    info!("Listening on {}", config.bind_addr);
    warp::serve(routes(state)).run(config.bind_addr).await;

    Ok(())
}
