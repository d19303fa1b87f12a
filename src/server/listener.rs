use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::ConnectionError;
use crate::http::connection::{Connection, Settings};

pub async fn run<D: Dispatcher>(cfg: &Config, dispatcher: Arc<D>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.server.listen_addr))?;
    info!("Listening on {}", cfg.server.listen_addr);

    serve(listener, dispatcher, cfg.connection.settings()).await
}

/// Accepts connections forever, one task per connection.
pub async fn serve<D: Dispatcher>(
    listener: TcpListener,
    dispatcher: Arc<D>,
    settings: Settings,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "Could not set TCP_NODELAY");
        }

        let mut conn = Connection::new(socket, dispatcher.clone(), settings.clone());
        tokio::spawn(async move {
            match conn.run().await {
                Ok(reason) => tracing::debug!(%peer, ?reason, "Connection closed"),
                Err(ConnectionError::Transport(e)) => {
                    tracing::debug!(%peer, error = %e, "Connection dropped")
                }
                Err(e) => tracing::error!("Connection error from {}: {}", peer, e),
            }
        });
    }
}
