use tokio::sync::mpsc;

use crate::connection::{Connection, ConnectionId};
use crate::error::RegistryError;
use crate::pairing::{self, PairingOutcome};
use crate::protocol::ServerMessage;
use crate::registry::{ConnectionTable, Registry};

/// A freshly registered connection and the queue its writer task drains.
#[derive(Debug)]
pub struct Admission {
    pub id: ConnectionId,
    pub outbound: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Registers a new `Unset` connection. Nothing is sent until a role is declared.
pub fn admit(registry: &Registry) -> Result<Admission, RegistryError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = ConnectionId::generate();
    registry.with_table(|table| {
        let admitted = table.next_admission();
        table.insert(Connection::new(id, tx, admitted))
    })?;
    Ok(Admission { id, outbound: rx })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The id was never registered or is already gone.
    NotRegistered,
    Removed {
        /// Partner that was unlinked and sent `partnerDisconnected`.
        former_partner: Option<ConnectionId>,
        /// Connection the former partner was immediately re-paired with.
        repaired_with: Option<ConnectionId>,
    },
}

/// Unlinks and notifies the partner, then removes `id`. Safe to call twice.
///
/// The orphaned partner goes back into the candidate pool and is matched at
/// once if an opposite-role connection is already waiting.
pub fn teardown(table: &mut ConnectionTable, id: ConnectionId) -> TeardownOutcome {
    let Some(closing) = table.remove(id) else {
        return TeardownOutcome::NotRegistered;
    };

    let former_partner = closing.partner().filter(|partner_id| {
        let Some(partner) = table.get_mut(*partner_id) else {
            return false;
        };
        if partner.partner() != Some(id) {
            return false;
        }
        partner.unlink();
        partner.send(ServerMessage::PartnerDisconnected);
        true
    });

    let repaired_with = former_partner.and_then(|partner_id| {
        match pairing::try_pair(table, partner_id) {
            Ok(PairingOutcome::Paired { partner }) => Some(partner),
            _ => None,
        }
    });

    TeardownOutcome::Removed {
        former_partner,
        repaired_with,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Role;
    use crate::pairing::declare_role;
    use crate::protocol::Signal;
    use crate::relay::{relay, RelayOutcome};
    use serde_json::json;

    fn declared(registry: &Registry, role: Role) -> Admission {
        let admission = admit(registry).unwrap();
        registry
            .with_table(|t| declare_role(t, admission.id, role))
            .unwrap();
        admission
    }

    fn drain(admission: &mut Admission) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = admission.outbound.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test_timeout::timeout]
    fn admit_registers_unset_connection_silently() {
        let registry = Registry::new();
        let mut admission = admit(&registry).unwrap();
        assert!(registry.contains(admission.id));
        assert_eq!(registry.role_of(admission.id), Some(Role::Unset));
        assert_eq!(registry.partner_of(admission.id), None);
        assert!(drain(&mut admission).is_empty());
    }

    #[test_timeout::timeout]
    fn closing_paired_connection_notifies_partner() {
        let registry = Registry::new();
        let mut a = declared(&registry, Role::Sender);
        let b = declared(&registry, Role::Receiver);
        drain(&mut a);

        let outcome = registry.with_table(|t| teardown(t, b.id));
        assert_eq!(
            outcome,
            TeardownOutcome::Removed {
                former_partner: Some(a.id),
                repaired_with: None,
            }
        );
        assert!(!registry.contains(b.id));
        assert_eq!(registry.partner_of(a.id), None);
        assert_eq!(drain(&mut a), vec![ServerMessage::PartnerDisconnected]);
        registry.with_table(|t| t.assert_links_consistent());
    }

    #[test_timeout::timeout]
    fn teardown_is_idempotent() {
        let registry = Registry::new();
        let a = declared(&registry, Role::Sender);
        assert_eq!(
            registry.with_table(|t| teardown(t, a.id)),
            TeardownOutcome::Removed {
                former_partner: None,
                repaired_with: None,
            }
        );
        assert_eq!(
            registry.with_table(|t| teardown(t, a.id)),
            TeardownOutcome::NotRegistered
        );
        assert_eq!(
            registry.with_table(|t| teardown(t, ConnectionId::generate())),
            TeardownOutcome::NotRegistered
        );
        assert!(registry.snapshot().connections == 0);
    }

    #[test_timeout::timeout]
    fn orphaned_partner_is_matched_with_waiting_connection() {
        let registry = Registry::new();
        let mut a = declared(&registry, Role::Sender);
        let b = declared(&registry, Role::Receiver);
        let mut c = declared(&registry, Role::Receiver);
        drain(&mut a);
        assert!(drain(&mut c).is_empty());

        let outcome = registry.with_table(|t| teardown(t, b.id));
        assert_eq!(
            outcome,
            TeardownOutcome::Removed {
                former_partner: Some(a.id),
                repaired_with: Some(c.id),
            }
        );
        assert_eq!(
            drain(&mut a),
            vec![
                ServerMessage::PartnerDisconnected,
                ServerMessage::PartnerConnected {
                    partner_type: Role::Receiver
                },
            ]
        );
        assert_eq!(
            drain(&mut c),
            vec![ServerMessage::PartnerConnected {
                partner_type: Role::Sender
            }]
        );
        registry.with_table(|t| t.assert_links_consistent());
    }

    #[test_timeout::timeout]
    fn full_call_scenario() {
        let registry = Registry::new();
        let mut a = declared(&registry, Role::Sender);
        assert!(drain(&mut a).is_empty());

        let mut b = declared(&registry, Role::Receiver);
        assert_eq!(
            drain(&mut a),
            vec![ServerMessage::PartnerConnected {
                partner_type: Role::Receiver
            }]
        );
        assert_eq!(
            drain(&mut b),
            vec![ServerMessage::PartnerConnected {
                partner_type: Role::Sender
            }]
        );

        let sdp = json!("v=0\r\ns=-\r\n");
        let outcome = registry.with_table(|t| relay(t, a.id, Signal::Offer(sdp.clone())));
        assert_eq!(outcome, RelayOutcome::Delivered { partner: b.id });
        assert_eq!(drain(&mut b), vec![ServerMessage::CreateOffer { sdp }]);

        registry.with_table(|t| teardown(t, b.id));
        assert_eq!(drain(&mut a), vec![ServerMessage::PartnerDisconnected]);
        assert_eq!(registry.partner_of(a.id), None);

        let mut c = declared(&registry, Role::Receiver);
        assert_eq!(registry.partner_of(a.id), Some(c.id));
        assert_eq!(registry.partner_of(c.id), Some(a.id));
        assert_eq!(
            drain(&mut c),
            vec![ServerMessage::PartnerConnected {
                partner_type: Role::Sender
            }]
        );
    }
}
