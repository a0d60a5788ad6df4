//! Room-Tally Server
//!
//! Hosts one actor per room and exposes it over a JSON WebSocket.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod handler;
pub mod room_actor;
pub mod service;

use std::future::Future;

use axum::Router;
use axum::routing::get;
use http::{Method, header};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RoomConfig;
use crate::handler::{room_http, room_socket};
use crate::service::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            registry: RoomRegistry::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(room_http::health))
        .route("/rooms/{room_id}", get(room_http::get_room))
        .route("/rooms/{room_id}/ws", get(room_socket::room_socket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
