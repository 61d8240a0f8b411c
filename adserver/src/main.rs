#![deny(clippy::all)]
#![deny(rust_2018_idioms)]

use std::net::{IpAddr, SocketAddr};

use adserver::{
    creator_revenue::CreatorRevenueClient,
    db::{postgres_connection, setup_migrations, PostgresConfig},
    token::TokenSecret,
    Application,
};
use clap::{crate_version, Arg, Command};
use primitives::{clock::UtcClock, config::configuration, util::logging::new_logger};
use serde::Deserialize;
use slog::info;

/// Infra-level settings pulled from the environment (SPEC_FULL.md §6's
/// Environment section), as opposed to the business `Config` loaded from
/// TOML - the same split the teacher draws between its `Config::from_env`
/// and `primitives::config::configuration`.
#[derive(Debug, Deserialize)]
struct EnvConfig {
    #[serde(default = "default_ip")]
    ip_addr: IpAddr,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_env")]
    env: String,
    jwt_secret: String,
    database_url: String,
    database_host: String,
    #[serde(default = "default_port_pg")]
    database_port: u16,
    database_name: String,
    database_user: String,
    database_password: String,
    #[serde(default = "default_pool_size")]
    database_pool_size: usize,
    videostreampro_monetization_url: String,
    videostreampro_api_key: String,
}

fn default_ip() -> IpAddr {
    "0.0.0.0".parse().expect("valid default ip")
}

fn default_port() -> u16 {
    8787
}

fn default_port_pg() -> u16 {
    5432
}

fn default_env() -> String {
    "development".to_string()
}

fn default_pool_size() -> usize {
    16
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Command::new("adserver")
        .version(crate_version!())
        .arg(
            Arg::new("config")
                .help("the TOML file with business configuration overrides")
                .takes_value(true),
        )
        .get_matches();

    let env_config: EnvConfig = envy::from_env()?;
    let socket_addr: SocketAddr = (env_config.ip_addr, env_config.port).into();

    let config_file = cli.value_of("config");
    let config = configuration(&env_config.env, config_file)?;

    let logger = new_logger("adserver");

    info!(&logger, "Checking connection and applying migrations...");
    setup_migrations(&env_config.database_url)?;

    let postgres_config = PostgresConfig {
        host: env_config.database_host,
        port: env_config.database_port,
        dbname: env_config.database_name,
        user: env_config.database_user,
        password: env_config.database_password,
        max_pool_size: env_config.database_pool_size,
    };
    let pool = postgres_connection(&postgres_config).await?;

    let token_secret = TokenSecret::new(env_config.jwt_secret.into_bytes());

    let creator_revenue = CreatorRevenueClient::new(
        env_config
            .videostreampro_monetization_url
            .parse()
            .expect("VIDEOSTREAMPRO_MONETIZATION_URL must be a valid base url"),
        env_config.videostreampro_api_key,
    )?;

    Application::new(
        pool,
        config,
        logger,
        token_secret,
        Box::new(UtcClock),
        creator_revenue,
    )
    .run(socket_addr)
    .await;

    Ok(())
}
