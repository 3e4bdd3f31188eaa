use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, instrument};

use crate::commands::Dispatcher;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame;
use crate::Error;

pub async fn run(config: Config, dispatcher: Arc<dyn Dispatcher>) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

    serve(listener, dispatcher, config.max_frame_size).await
}

/// Accepts connections on `listener` until accepting fails, serving each one on its own task.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<dyn Dispatcher>,
    max_frame_size: usize,
) -> Result<(), Error> {
    info!("RESP server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            let conn =
                Connection::with_max_frame_size(socket, Some(client_address), max_frame_size);
            if let Err(e) = handle_connection(conn, dispatcher).await {
                error!(error = %e, "Connection terminated");
            }
        });
    }
}

/// Serves one client: read a request, dispatch it, write the reply, repeat.
///
/// The next request is only read once the previous reply has been written. The first decode or
/// encode error ends the session and drops the connection, closing the stream.
#[instrument(
    name = "connection",
    skip(conn, dispatcher),
    fields(connection_id, client_address)
)]
pub async fn handle_connection<S>(
    mut conn: Connection<S>,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<(), frame::Error>
where
    S: AsyncRead + AsyncWrite,
{
    let span = tracing::Span::current();
    span.record("connection_id", conn.handle.id.to_string());
    if let Some(address) = conn.handle.address {
        span.record("client_address", address.to_string());
    }

    while let Some(request) = conn.read_request().await? {
        info!(
            command = %request.command,
            arguments = request.arguments.len(),
            "Received request from client"
        );
        let reply = dispatcher.dispatch(&request);
        debug!(kind = reply.as_ref(), "Sending reply to client: {:?}", reply);

        let written = conn.write_reply(&reply).await?;
        debug!(bytes = written, "Reply written");
    }

    info!("Connection closed");
    Ok(())
}

/// Spawns [`serve`] on an ephemeral loopback port and returns its address.
pub async fn serve_local(
    dispatcher: Arc<dyn Dispatcher>,
    max_frame_size: usize,
) -> Result<SocketAddr, Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = serve(listener, dispatcher, max_frame_size).await {
            error!(error = %e, "Server stopped");
        }
    });

    Ok(address)
}
