//! Common test utilities for database-backed integration tests
//!
//! Each test gets its own PostgreSQL database cloned from the
//! `brandreel_test_template` template database, so tests run in parallel
//! without interference. Migrations are applied to the template once per
//! test session.

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::sync::Once;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

// Embed migrations at compile time
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

// Ensure migrations only run once per test session
static MIGRATIONS_RUN: Once = Once::new();

type PgPool = Pool<ConnectionManager<PgConnection>>;

const TEMPLATE_NAME: &str = "brandreel_test_template";

/// Ensures the template database exists and has the latest migrations
/// applied. Called automatically by `TestDatabase::new()`.
fn ensure_template_migrated() {
    MIGRATIONS_RUN.call_once(|| {
        dotenvy::dotenv().ok();

        let base_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/brandreel_test".to_string());

        let admin_url = admin_url_for(&base_url);
        let template_url = base_url
            .replace("/brandreel_test_template", &format!("/{TEMPLATE_NAME}"))
            .replace("/brandreel_test", &format!("/{TEMPLATE_NAME}"));

        if let Ok(mut admin_conn) = PgConnection::establish(&admin_url) {
            let exists: Result<bool, _> = diesel::sql_query(format!(
                "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = '{TEMPLATE_NAME}')"
            ))
            .get_result::<TemplateExists>(&mut admin_conn)
            .map(|r| r.exists);

            if exists != Ok(true) {
                let _ = diesel::sql_query(format!("CREATE DATABASE {TEMPLATE_NAME}"))
                    .execute(&mut admin_conn);
            }

            // Unmark as template temporarily to allow connections for migrations
            let _ = diesel::sql_query(format!(
                "UPDATE pg_database SET datistemplate = FALSE, datallowconn = TRUE \
                 WHERE datname = '{TEMPLATE_NAME}'"
            ))
            .execute(&mut admin_conn);

            drop(admin_conn);
        }

        if let Ok(mut template_conn) = PgConnection::establish(&template_url) {
            match template_conn.run_pending_migrations(MIGRATIONS) {
                Ok(applied) => {
                    if !applied.is_empty() {
                        eprintln!("Applied {} migration(s) to test template", applied.len());
                    }
                }
                Err(e) => {
                    eprintln!("Warning: Failed to run migrations on template: {e}");
                }
            }
            drop(template_conn);
        }

        // Let PostgreSQL fully release the connection before re-marking the
        // template, or parallel clones hit "source database is being
        // accessed by other users"
        thread::sleep(Duration::from_millis(50));

        if let Ok(mut admin_conn) = PgConnection::establish(&admin_url) {
            let _ = diesel::sql_query(format!(
                "UPDATE pg_database SET datistemplate = TRUE, datallowconn = FALSE \
                 WHERE datname = '{TEMPLATE_NAME}'"
            ))
            .execute(&mut admin_conn);
            drop(admin_conn);
        }

        thread::sleep(Duration::from_millis(20));
    });
}

fn admin_url_for(base_url: &str) -> String {
    base_url
        .replace("/brandreel_test_template", "/postgres")
        .replace("/brandreel_test", "/postgres")
}

#[derive(QueryableByName)]
struct TemplateExists {
    #[diesel(sql_type = diesel::sql_types::Bool)]
    exists: bool,
}

/// Manages an isolated test database created from the template.
///
/// 1. `new()` runs `CREATE DATABASE brandreel_test_<random> TEMPLATE brandreel_test_template`
/// 2. The test runs against the isolated database
/// 3. `Drop` runs `DROP DATABASE ... WITH (FORCE)` (requires PostgreSQL 13+)
pub struct TestDatabase {
    db_name: String,
    pool: PgPool,
    admin_url: String,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        ensure_template_migrated();

        dotenvy::dotenv().ok();

        let base_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/brandreel_test".to_string());

        let (admin_url, db_name) = Self::generate_database_info(&base_url);

        Self::create_database(&admin_url, &db_name)
            .await
            .context("Failed to create test database from template")?;

        let test_db_url = Self::build_database_url(&base_url, &db_name);

        let manager = ConnectionManager::<PgConnection>::new(&test_db_url);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .with_context(|| format!("Failed to create connection pool for {db_name}"))?;

        Ok(TestDatabase {
            db_name,
            pool,
            admin_url,
        })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.db_name
    }

    /// Returns (admin_url, db_name)
    fn generate_database_info(base_url: &str) -> (String, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let db_name = format!("brandreel_test_{suffix}");
        (admin_url_for(base_url), db_name)
    }

    fn build_database_url(base_url: &str, db_name: &str) -> String {
        base_url
            .replace("/brandreel_test_template", &format!("/{db_name}"))
            .replace("/brandreel_test", &format!("/{db_name}"))
    }

    /// Creates a new database from the template, serialized through a
    /// file lock so concurrent clones do not trip over the template.
    async fn create_database(admin_url: &str, db_name: &str) -> Result<()> {
        use fs2::FileExt;
        use std::fs::OpenOptions;

        let admin_url = admin_url.to_string();
        let db_name = db_name.to_string();

        tokio::task::spawn_blocking(move || {
            let lock_path = std::env::temp_dir().join("brandreel_test_template.lock");
            let lock_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .context("Failed to create lock file for template database cloning")?;

            lock_file
                .lock_exclusive()
                .context("Failed to acquire lock for template database cloning")?;

            let mut conn = PgConnection::establish(&admin_url).context(
                "Failed to connect to PostgreSQL for database creation. Is PostgreSQL running?",
            )?;

            // Terminate lingering connections to the template before cloning
            diesel::sql_query(format!(
                "SELECT pg_terminate_backend(pg_stat_activity.pid) \
                 FROM pg_stat_activity \
                 WHERE pg_stat_activity.datname = '{TEMPLATE_NAME}' \
                   AND pid <> pg_backend_pid()"
            ))
            .execute(&mut conn)
            .context("Failed to terminate connections to template database")?;

            let result = diesel::sql_query(format!(
                "CREATE DATABASE \"{db_name}\" TEMPLATE {TEMPLATE_NAME}"
            ))
            .execute(&mut conn)
            .with_context(|| format!("Failed to create database '{db_name}' from template"));

            drop(lock_file);

            result?;
            Ok::<(), anyhow::Error>(())
        })
        .await
        .context("Database creation task panicked")?
    }

    fn cleanup(&self) {
        use std::panic::AssertUnwindSafe;

        let db_name = self.db_name.clone();
        let admin_url = self.admin_url.clone();

        let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let mut conn = PgConnection::establish(&admin_url).ok()?;
            diesel::sql_query(format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
                .execute(&mut conn)
                .ok()
        }));

        if result.is_err() {
            eprintln!(
                "Warning: Failed to drop test database '{}'. \
                 Clean up manually: DROP DATABASE {};",
                self.db_name, self.db_name
            );
        }
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        self.cleanup();
    }
}
