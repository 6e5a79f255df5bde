//! The per-connection request loop.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::broker::router::Router;
use crate::protocol::frame::FrameReader;

/// Serves one accepted connection: read a frame, route it, write the
/// response, repeat. Handlers run one at a time per connection, so responses
/// appear in request order.
///
/// Framing errors and unroutable requests close the connection without a
/// framed reply. The write side is always shut down on exit.
pub(crate) async fn handle_connection(stream: TcpStream, router: Arc<Router>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(read_half);

    loop {
        let request = match frames.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                warn!(%peer, %err, "closing connection on framing error");
                break;
            }
        };

        let correlation_id = request.header.correlation_id;
        debug!(%peer, correlation_id, api_key = ?request.header.api_key, "handling request");

        let response = match router.route(&request) {
            Ok(response) => response,
            Err(err) => {
                warn!(%peer, correlation_id, %err, "closing connection on unroutable request");
                break;
            }
        };

        let encoded = match response.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(%peer, correlation_id, %err, "closing connection on unencodable response");
                break;
            }
        };
        if let Err(err) = write_half.write_all(&encoded).await {
            warn!(%peer, correlation_id, %err, "closing connection on write error");
            break;
        }
        if let Err(err) = write_half.flush().await {
            warn!(%peer, correlation_id, %err, "closing connection on flush error");
            break;
        }
    }

    let _ = write_half.shutdown().await;
    debug!(%peer, "connection closed");
}
