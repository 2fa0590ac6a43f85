//! Imports the ingredient catalogue from a JSON array of
//! `{"name": ..., "measurement_unit": ...}` objects.
//!
//! Usage: `load_ingredients [path]`, defaulting to `INGREDIENTS_FILE`.

use std::{env, error::Error, path::PathBuf};

use env_logger::Env;
use foodgram::{actions::import_ingredients, connect, form::IngredientPayload, Config};
use log::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn")).init();

    let config = Config::load()?;
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.ingredients_file.clone());

    let contents = tokio::fs::read_to_string(&path).await?;
    let entries: Vec<IngredientPayload> = serde_json::from_str(&contents)?;
    info!("Read {} ingredients from {}", entries.len(), path.display());

    let mut ingredients = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match entry.clone().validate() {
            Ok(ingredient) => ingredients.push(ingredient),
            Err(e) => warn!("Skipping entry {index} ({entry:?}): {}", e.body()),
        }
    }

    let pool = connect(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    import_ingredients(&pool, &ingredients).await?;

    Ok(())
}
