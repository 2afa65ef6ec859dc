use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, decrement_gauge, increment_gauge};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionId;
use crate::error::DecodeError;
use crate::lifecycle::{self, Admission, TeardownOutcome};
use crate::pairing::{self, PairingOutcome};
use crate::protocol::{ClientMessage, Inbound};
use crate::registry::Registry;
use crate::relay::{self, RelayOutcome};
use crate::server::AppState;
use crate::telemetry::{
    CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DECODE_FAILURES_TOTAL, MESSAGES_DROPPED_TOTAL,
    MESSAGES_RELAYED_TOTAL, PAIRS_FORMED_TOTAL, ROLE_REJECTIONS_TOTAL,
};

pub const UPGRADE_REQUIRED_BODY: &str = "Expected Upgrade: websocket";

/// WebSocket upgrade handler for `/ws`.
pub async fn websocket_handler(
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state.registry, remote_addr)),
        Err(rejection) => {
            debug!(%remote_addr, reason = %rejection, "rejecting non-upgrade request");
            (StatusCode::UPGRADE_REQUIRED, UPGRADE_REQUIRED_BODY).into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, registry: Registry, remote_addr: SocketAddr) {
    let Admission { id, mut outbound } = match lifecycle::admit(&registry) {
        Ok(admission) => admission,
        Err(err) => {
            error!(%remote_addr, error = %err, "failed to admit connection");
            return;
        }
    };
    counter!(CONNECTIONS_TOTAL, 1);
    increment_gauge!(CONNECTIONS_ACTIVE, 1.0);
    info!(connection_id = %id, %remote_addr, "connection admitted");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(connection_id = %id, error = %err, "failed to encode outbound message");
                    continue;
                }
            };
            if let Err(err) = ws_tx.send(Message::Text(payload)).await {
                debug!(connection_id = %id, error = %err, "websocket write failed");
                break;
            }
        }
        debug!(connection_id = %id, "writer task finished");
    });

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&registry, id, ClientMessage::decode(&text));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    dispatch(&registry, id, ClientMessage::decode_bytes(&bytes));
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(
                        connection_id = %id,
                        reason = ?frame.map(|f| f.reason.to_string()),
                        "client closed websocket"
                    );
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    warn!(connection_id = %id, error = %err, "error receiving frame");
                    break;
                }
                None => break,
            },
            _ = &mut writer => {
                warn!(connection_id = %id, "writer stopped; closing connection");
                break;
            }
        }
    }

    let outcome = registry.with_table(|table| lifecycle::teardown(table, id));
    writer.abort();
    decrement_gauge!(CONNECTIONS_ACTIVE, 1.0);

    match outcome {
        TeardownOutcome::Removed {
            former_partner,
            repaired_with,
        } => {
            if repaired_with.is_some() {
                counter!(PAIRS_FORMED_TOTAL, 1);
            }
            info!(
                connection_id = %id,
                former_partner = ?former_partner,
                partner_repaired_with = ?repaired_with,
                "connection closed"
            );
        }
        TeardownOutcome::NotRegistered => {
            debug!(connection_id = %id, "connection already removed");
        }
    }
}

/// Applies one decoded frame from `id`. Bad input is logged and ignored.
pub fn dispatch(registry: &Registry, id: ConnectionId, decoded: Result<ClientMessage, DecodeError>) {
    let message = match decoded {
        Ok(message) => message,
        Err(err) => {
            counter!(DECODE_FAILURES_TOTAL, 1, "reason" => err.metric_label());
            warn!(connection_id = %id, error = %err, "ignoring undecodable frame");
            return;
        }
    };

    match message.classify() {
        Inbound::DeclareRole(role) => {
            match registry.with_table(|table| pairing::declare_role(table, id, role)) {
                Ok(PairingOutcome::Paired { partner }) => {
                    counter!(PAIRS_FORMED_TOTAL, 1);
                    info!(connection_id = %id, %role, partner_id = %partner, "paired");
                }
                Ok(PairingOutcome::Waiting) => {
                    info!(connection_id = %id, %role, "waiting for partner");
                }
                Ok(PairingOutcome::AlreadyPaired { partner }) => {
                    debug!(connection_id = %id, partner_id = %partner, "already paired");
                }
                Err(err) => {
                    counter!(ROLE_REJECTIONS_TOTAL, 1);
                    warn!(connection_id = %id, requested = %role, error = %err, "rejected role declaration");
                }
            }
        }
        Inbound::Relay(signal) => {
            let kind = signal.kind();
            match registry.with_table(|table| relay::relay(table, id, signal)) {
                RelayOutcome::Delivered { partner } => {
                    counter!(MESSAGES_RELAYED_TOTAL, 1, "type" => kind);
                    debug!(connection_id = %id, partner_id = %partner, kind, "relayed");
                }
                RelayOutcome::NoPartner => {
                    counter!(MESSAGES_DROPPED_TOTAL, 1, "reason" => "no_partner");
                    debug!(connection_id = %id, kind, "dropping message; no partner");
                }
                RelayOutcome::StalePartner { partner } => {
                    counter!(MESSAGES_DROPPED_TOTAL, 1, "reason" => "stale_partner");
                    warn!(connection_id = %id, partner_id = %partner, kind, "cleared stale partner link");
                }
                RelayOutcome::PartnerUnreachable { partner } => {
                    counter!(MESSAGES_DROPPED_TOTAL, 1, "reason" => "partner_closing");
                    debug!(connection_id = %id, partner_id = %partner, kind, "partner is closing");
                }
                RelayOutcome::WrongDirection { role } => {
                    counter!(MESSAGES_DROPPED_TOTAL, 1, "reason" => "wrong_direction");
                    warn!(connection_id = %id, %role, kind, "dropping message sent by the wrong role");
                }
                RelayOutcome::UnknownConnection => {
                    warn!(connection_id = %id, kind, "relay from unregistered connection");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Role;
    use crate::protocol::ServerMessage;
    use serde_json::json;

    #[test_timeout::timeout]
    fn dispatch_pairs_relays_and_ignores_garbage() {
        let registry = Registry::new();
        let mut a = lifecycle::admit(&registry).unwrap();
        let mut b = lifecycle::admit(&registry).unwrap();

        dispatch(&registry, a.id, ClientMessage::decode("{{nope"));
        dispatch(&registry, a.id, ClientMessage::decode(r#"{"type":"hangup"}"#));
        assert_eq!(registry.role_of(a.id), Some(Role::Unset));

        dispatch(&registry, a.id, ClientMessage::decode(r#"{"type":"createOffer","sdp":"v=0"}"#));
        dispatch(&registry, a.id, ClientMessage::decode(r#"{"type":"sender"}"#));
        dispatch(&registry, b.id, ClientMessage::decode_bytes(br#"{"type":"receiver"}"#));
        assert_eq!(registry.partner_of(a.id), Some(b.id));
        assert!(matches!(
            a.outbound.try_recv().unwrap(),
            ServerMessage::PartnerConnected { .. }
        ));
        assert!(matches!(
            b.outbound.try_recv().unwrap(),
            ServerMessage::PartnerConnected { .. }
        ));

        dispatch(&registry, b.id, ClientMessage::decode(r#"{"type":"sender"}"#));
        assert_eq!(registry.role_of(b.id), Some(Role::Receiver));

        dispatch(
            &registry,
            a.id,
            ClientMessage::decode(r#"{"type":"createoffer","sdp":{"type":"offer","sdp":"v=0"}}"#),
        );
        assert_eq!(
            b.outbound.try_recv().unwrap(),
            ServerMessage::LegacyCreateOffer {
                sdp: json!({ "type": "offer", "sdp": "v=0" })
            }
        );

        dispatch(&registry, b.id, ClientMessage::decode(r#"{"type":"createOffer","sdp":"v=0"}"#));
        dispatch(&registry, a.id, ClientMessage::decode(r#"{"type":"createAnswer","sdp":"v=0"}"#));
        assert!(a.outbound.try_recv().is_err());
        assert!(b.outbound.try_recv().is_err());
    }
}
