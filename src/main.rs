mod address;
mod api;
mod config;
mod store;
mod utils;
mod verifier;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mcverify::{MojangSessionService, Outcome, ServerKeys, verify};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Instrument, error, info, info_span, warn};

use crate::address::JoinAddress;
use crate::api::ApiState;
use crate::config::Config;
use crate::store::VerificationStore;
use crate::verifier::TokenVerifier;

/// Minecraft account verification server.
///
/// Accepts Minecraft clients on a join address carrying a verification
/// token, proves they own the account they log in with, and completes the
/// matching pending verification.
struct VerifyServer {
    keys: Arc<ServerKeys>,
    session: Arc<MojangSessionService>,
    verifier: TokenVerifier,
    /// Deadline for one attempt.
    timeout: Option<Duration>,
    /// Connection counter for session IDs
    connection_count: AtomicUsize,
}

impl VerifyServer {
    /// Handle a single client connection.
    async fn handle_connection(&self, client: TcpStream, client_addr: SocketAddr) {
        let session_id = self.connection_count.fetch_add(1, Ordering::Relaxed);

        async {
            let attempt = verify(
                client,
                Arc::clone(&self.keys),
                Arc::clone(&self.session),
                self.verifier.clone(),
            );

            let result = match self.timeout {
                Some(timeout) => {
                    if let Ok(result) = tokio::time::timeout(timeout, attempt).await {
                        result
                    } else {
                        warn!("Verification timed out after {}s", timeout.as_secs());
                        return;
                    }
                }
                None => attempt.await,
            };

            match result {
                Ok(Outcome::Verified { profile, .. }) => {
                    info!(name = %profile.name, uuid = %profile.id, "Attempt verified");
                }
                Ok(outcome) => info!(?outcome, "Attempt rejected"),
                Err(e) => warn!("Verification aborted: {e}"),
            }
        }
        .instrument(info_span!(
            "conn",
            sid = session_id,
            ip = %client_addr.ip(),
            port = client_addr.port()
        ))
        .await;
    }

    async fn run(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((client, client_addr)) => {
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        server.handle_connection(client, client_addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                }
            }
        }
    }
}

/// Periodically drop verifications past their deadline.
fn spawn_cleanup_task(store: Arc<VerificationStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let expired = store.cleanup_expired();
            if !expired.is_empty() {
                info!(count = expired.len(), "Removed expired verifications");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    let address = Arc::new(JoinAddress::parse(&config.verify_address)?);
    let store = Arc::new(VerificationStore::new(config.verify_window));

    spawn_cleanup_task(Arc::clone(&store), config.cleanup_interval);

    if config.api_enabled {
        let app = api::router(ApiState {
            store: Arc::clone(&store),
            address: Arc::clone(&address),
        });
        let api_listener = TcpListener::bind(&config.api_addr).await?;
        info!("REST API listening on {}", config.api_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(api_listener, app).await {
                error!("REST API error: {e}");
            }
        });
    }

    let Some(listen_addr) = config.listen_addr else {
        info!("Minecraft listener disabled");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    };

    let keys = tokio::task::spawn_blocking(ServerKeys::generate).await??;
    info!("Generated server key pair");

    let server = Arc::new(VerifyServer {
        keys: Arc::new(keys),
        session: Arc::new(MojangSessionService::with_base_url(
            config.session_server_url,
        )),
        verifier: TokenVerifier::new(store, address),
        timeout: config.verify_timeout,
        connection_count: AtomicUsize::new(0),
    });

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    tokio::select! {
        () = server.run(listener) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }

    Ok(())
}
