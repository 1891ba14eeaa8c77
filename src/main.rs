use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use pawcare_api::infra::{
    app_state::AppState,
    bootstrap::{self, bootstrap},
    config, db,
};

/// Migrations embedded into the binary so the image needs no migration files.
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let db_pool = db::create_pool(&config.database).await?;
    let state = AppState::new(db_pool, config.clone());
    let app = pawcare_api::app(state);

    tracing::info!("Bootstrapping...");
    bootstrap("PawCare API", app, &config).await?;
    Ok(())
}
