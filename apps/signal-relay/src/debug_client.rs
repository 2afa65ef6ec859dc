//! Debug client: joins a relay as one side of a call and prints what arrives.

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::io::Write;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::config::DebugClientArgs;
use crate::connection::Role;
use crate::protocol::{ClientMessage, ServerMessage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: DebugClientArgs) -> Result<()> {
    run_with(args, std::io::stdout()).await
}

/// Runs the client, writing each received frame to `out` as one line.
pub async fn run_with<W: Write + Send>(args: DebugClientArgs, mut out: W) -> Result<()> {
    let role = Role::from(args.role);
    debug!(url = %args.url, %role, "connecting");

    let (stream, _) = match timeout(CONNECT_TIMEOUT, connect_async(&args.url)).await {
        Ok(result) => result.with_context(|| format!("failed to connect to {}", args.url))?,
        Err(_) => {
            return Err(anyhow!(
                "connection timeout after {}s - is the relay running?",
                CONNECT_TIMEOUT.as_secs()
            ))
        }
    };
    let (mut write, mut read) = stream.split();

    let declaration = match role {
        Role::Sender => ClientMessage::Sender,
        Role::Receiver => ClientMessage::Receiver,
        Role::Unset => return Err(anyhow!("debug client needs a concrete role")),
    };
    write
        .send(Message::Text(serde_json::to_string(&declaration)?.into()))
        .await?;

    let mut offer = args.offer;
    let mut printed = 0usize;
    while args.count.map_or(true, |limit| printed < limit) {
        let Some(frame) = read.next().await else {
            break;
        };
        let text = match frame? {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        writeln!(out, "{text}").context("failed to write frame")?;
        out.flush().context("failed to flush output")?;
        printed += 1;

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::PartnerConnected { .. }) => {
                if let Some(sdp) = offer.take() {
                    let message = ClientMessage::CreateOffer {
                        sdp: Value::String(sdp),
                    };
                    write
                        .send(Message::Text(serde_json::to_string(&message)?.into()))
                        .await?;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "relay sent an unrecognised frame"),
        }
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}
