use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use brandreel::stripe_client::StripeConfig;
use brandreel::web::{PgPool, start_web_server};

// Embed migrations into the binary
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Parser)]
#[command(name = "brandreel", about = "BrandReel payment and escrow service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web server
    Serve {
        /// Interface to bind to
        #[arg(long, default_value = "0.0.0.0")]
        interface: String,

        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Run pending database migrations and exit
    Migrate,
}

fn build_pool(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(10)
        .build(manager)
        .context("Failed to create database connection pool")
}

async fn run_migrations(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
        for migration in &applied {
            info!(migration = %migration, "Applied migration");
        }
        Ok::<(), anyhow::Error>(())
    })
    .await??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let _sentry_guard = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in the environment")?;
    let pool = build_pool(&database_url)?;

    match cli.command {
        Commands::Serve { interface, port } => {
            run_migrations(&pool).await?;

            let stripe = match StripeConfig::from_env() {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(error = %e, "Stripe configuration missing; payment endpoints disabled");
                    None
                }
            };

            start_web_server(interface, port, pool, stripe).await
        }
        Commands::Migrate => {
            run_migrations(&pool).await?;
            info!("Migrations complete");
            Ok(())
        }
    }
}
