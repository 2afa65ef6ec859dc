use crate::connection::{ConnectionId, Role};
use crate::protocol::Signal;
use crate::registry::ConnectionTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered { partner: ConnectionId },
    /// Sender is not paired; the payload was dropped.
    NoPartner,
    /// Partner id pointed at a missing record; the link was cleared and the payload dropped.
    StalePartner { partner: ConnectionId },
    /// Partner's writer has already gone away; it is about to be torn down.
    PartnerUnreachable { partner: ConnectionId },
    /// Offer from a non-sender or answer from a non-receiver; nothing was forwarded.
    WrongDirection { role: Role },
    UnknownConnection,
}

/// Forwards `signal` from `from` to its partner without looking inside it.
pub fn relay(table: &mut ConnectionTable, from: ConnectionId, signal: Signal) -> RelayOutcome {
    let Some(origin) = table.get(from) else {
        return RelayOutcome::UnknownConnection;
    };
    if let Some(required) = signal.required_role() {
        if origin.role() != required {
            return RelayOutcome::WrongDirection {
                role: origin.role(),
            };
        }
    }
    let Some(partner_id) = origin.partner() else {
        return RelayOutcome::NoPartner;
    };

    match table.get(partner_id) {
        Some(partner) => {
            if partner.send(signal.into_server_message()) {
                RelayOutcome::Delivered {
                    partner: partner_id,
                }
            } else {
                RelayOutcome::PartnerUnreachable {
                    partner: partner_id,
                }
            }
        }
        None => {
            if let Some(origin) = table.get_mut(from) {
                origin.unlink();
            }
            RelayOutcome::StalePartner {
                partner: partner_id,
            }
        }
    }
}
