//! Debug HTTP server surfaced only in debug feature builds.
//!
//! This module spawns a lightweight Axum server that exposes health,
//! telemetry, indicator geometry, an SSE sample stream and a lifecycle
//! endpoint for diagnostics.

#[cfg(all(feature = "debug_http", debug_assertions))]
mod routes;
#[cfg(all(feature = "debug_http", debug_assertions))]
mod sse;

use crate::engine::TiltEngine;

#[cfg(all(feature = "debug_http", debug_assertions))]
pub use routes::{build_router, run_http_server, DebugHttpState};

#[cfg(all(feature = "debug_http", debug_assertions))]
use log::{error, info, warn};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::net::SocketAddr;
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::thread;

#[cfg(all(feature = "debug_http", debug_assertions))]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawn the debug HTTP server. Requires the `debug_http` feature in a debug build.
#[cfg(all(feature = "debug_http", debug_assertions))]
pub fn spawn_if_enabled(engine: &'static TiltEngine) {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Debug HTTP server already running");
        return;
    }

    let addr: SocketAddr = std::env::var("TILT_DEBUG_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8788".to_string())
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8788)));

    let token = std::env::var("TILT_DEBUG_TOKEN").unwrap_or_else(|_| "tilt-debug".to_string());
    let preview = token.chars().take(4).collect::<String>();

    let spawned = thread::Builder::new()
        .name("tilt-debug-http".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Failed to build tokio runtime for debug HTTP server: {}", err);
                    return;
                }
            };

            info!(
                "Debug HTTP server binding {} (token prefix {}***)",
                addr, preview
            );

            runtime.block_on(async move {
                let state = DebugHttpState::new(engine, token);
                if let Err(err) = run_http_server(state, addr).await {
                    error!("Debug HTTP server stopped: {}", err);
                }
            });
        });

    if let Err(err) = spawned {
        SERVER_STARTED.store(false, Ordering::SeqCst);
        error!("Failed to spawn debug HTTP server thread: {}", err);
    }
}

/// No-op outside `debug_http` debug builds.
#[cfg(not(all(feature = "debug_http", debug_assertions)))]
pub fn spawn_if_enabled(_engine: &'static TiltEngine) {
    log::debug!("Debug HTTP server not compiled into this build");
}
