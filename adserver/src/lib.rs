#![deny(clippy::all)]
#![deny(rust_2018_idioms)]

//! Application shell (SPEC_FULL.md §4.10).
//!
//! Bundles the state every handler needs - the Postgres pool, the business
//! `Config`, the structured logger, the token-signing secret, the clock,
//! and the creator-revenue client - behind a single `Arc` threaded through
//! `axum::Extension`, the same shape the teacher's own `Application<A>`
//! bundled its adapter, config, and pools behind.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Extension, Router,
};
use primitives::{clock::Clock, Config};
use slog::{info, Logger};

use crate::{creator_revenue::CreatorRevenueClient, db::DbPool, token::TokenSecret};

pub mod candidate;
pub mod client_info;
pub mod confirm;
pub mod creator_revenue;
pub mod db;
pub mod lifecycle;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod scorer;
pub mod serve;
pub mod token;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

/// Shared state threaded into every handler via `axum::Extension<Arc<Application>>`.
pub struct Application {
    pub pool: DbPool,
    pub config: Config,
    pub logger: Logger,
    pub token_secret: TokenSecret,
    pub clock: Box<dyn Clock>,
    pub creator_revenue: CreatorRevenueClient,
}

impl Application {
    pub fn new(
        pool: DbPool,
        config: Config,
        logger: Logger,
        token_secret: TokenSecret,
        clock: Box<dyn Clock>,
        creator_revenue: CreatorRevenueClient,
    ) -> Self {
        Self {
            pool,
            config,
            logger,
            token_secret,
            clock,
            creator_revenue,
        }
    }

    fn into_router(self) -> Router {
        let shared = Arc::new(self);

        Router::new()
            .route("/ad/serve", post(routes::serve::serve))
            .route("/impression/confirm", post(routes::confirm::confirm))
            .route("/impression/:token", get(routes::confirm::lookup))
            .route("/cfg", get(routes::cfg::config))
            .route(
                "/teams/:team_id/campaigns",
                post(routes::campaign::create),
            )
            .route(
                "/teams/:team_id/campaigns/:campaign_id",
                axum::routing::put(routes::campaign::update)
                    .delete(routes::campaign::delete),
            )
            .route(
                "/teams/:team_id/campaigns/:campaign_id/ads",
                post(routes::ad::create),
            )
            .route(
                "/teams/:team_id/campaigns/:campaign_id/ads/:ad_id",
                axum::routing::put(routes::ad::update).delete(routes::ad::delete),
            )
            .layer(axum::middleware::from_fn(middleware::cors::apply_cors))
            .layer(Extension(shared))
    }

    /// Binds and serves the router until the process receives a shutdown
    /// signal. Client IP is exposed to handlers via `ConnectInfo`, which
    /// `client_info::parse` needs for the impression's stored `ip_address`.
    pub async fn run(self, address: SocketAddr) {
        let logger = self.logger.clone();
        let router = self.into_router();

        info!(logger, "starting ad server"; "address" => %address);

        axum::Server::bind(&address)
            .serve(router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("server error");
    }
}
