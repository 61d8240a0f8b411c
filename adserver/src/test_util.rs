//! Test helpers for wiring up an `Application` against a scratch Postgres
//! database - the role the teacher's own `test_util.rs` played for its
//! `ApplicationGuard`, minus the Redis/MongoDB pools and chain adapter this
//! crate has no use for.

use std::env;

use once_cell::sync::Lazy;
use primitives::{clock::FixedClock, config::configuration, test_util::NOW, util::logging::discard_logger};

use crate::{
    creator_revenue::CreatorRevenueClient,
    db::{postgres_connection, setup_migrations, PostgresConfig},
    token::TokenSecret,
    Application,
};

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

static TEST_POSTGRES_CONFIG: Lazy<PostgresConfig> = Lazy::new(|| PostgresConfig {
    host: env_or("TEST_DATABASE_HOST", "localhost"),
    port: env_or("TEST_DATABASE_PORT", "5432")
        .parse()
        .expect("valid test database port"),
    dbname: env_or("TEST_DATABASE_NAME", "adserver_test"),
    user: env_or("TEST_DATABASE_USER", "postgres"),
    password: env_or("TEST_DATABASE_PASSWORD", "postgres"),
    max_pool_size: 4,
});

static TEST_DATABASE_URL: Lazy<String> = Lazy::new(|| {
    format!(
        "postgres://{user}:{password}@{host}:{port}/{dbname}",
        user = TEST_POSTGRES_CONFIG.user,
        password = TEST_POSTGRES_CONFIG.password,
        host = TEST_POSTGRES_CONFIG.host,
        port = TEST_POSTGRES_CONFIG.port,
        dbname = TEST_POSTGRES_CONFIG.dbname,
    )
});

/// Builds an `Application` against a real scratch Postgres database with
/// migrations applied, a clock fixed at [`primitives::test_util::NOW`], and a
/// dummy token secret and creator-revenue client. Integration tests should
/// go through this rather than standing up their own pool, so they all agree
/// on connection settings and migration state.
pub async fn test_application() -> Application {
    setup_migrations(&TEST_DATABASE_URL).expect("test migrations should apply");

    let pool = postgres_connection(&TEST_POSTGRES_CONFIG)
        .await
        .expect("should build test pool");

    let config = configuration("development", None).expect("default config should load");

    let token_secret = TokenSecret::new(b"test-signing-secret".to_vec());

    let creator_revenue = CreatorRevenueClient::new(
        "http://localhost:9/".parse().expect("valid dummy base url"),
        "test-api-key",
    )
    .expect("should build test creator-revenue client");

    Application::new(
        pool,
        config,
        discard_logger(),
        token_secret,
        Box::new(FixedClock(*NOW)),
        creator_revenue,
    )
}
