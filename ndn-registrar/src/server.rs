// UDP shell around the registry: one datagram in, at most one reply out.

use anyhow::Result;
use log::{debug, warn};
use tokio::net::UdpSocket;

use ndn_common::wire::MAX_MSG_LEN;

use crate::registry::Registry;

/// Serves registration requests on `socket` until the task is dropped.
pub async fn serve(socket: UdpSocket, mut registry: Registry) -> Result<()> {
    let mut buf = [0u8; MAX_MSG_LEN];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(err) => {
                warn!("recv error: {err}");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&buf[..len]);
        debug!("received {:?} from {peer}", text.as_ref());
        if let Some(reply) = registry.handle_datagram(&text) {
            if let Err(err) = socket.send_to(reply.as_bytes(), peer).await {
                warn!("failed to reply to {peer}: {err}");
            }
        }
    }
}
