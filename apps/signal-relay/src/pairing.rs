//! Matchmaking between unpaired senders and receivers.
//!
//! Candidate lookup and linking happen on the same `&mut ConnectionTable`, so
//! two newcomers can never claim the same free candidate.

use crate::connection::{ConnectionId, Role};
use crate::error::RoleError;
use crate::protocol::ServerMessage;
use crate::registry::ConnectionTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingOutcome {
    Paired { partner: ConnectionId },
    /// No free opposite-role connection; this one is now a candidate.
    Waiting,
    AlreadyPaired { partner: ConnectionId },
}

/// Records `role` on `id` and tries to pair it.
pub fn declare_role(
    table: &mut ConnectionTable,
    id: ConnectionId,
    role: Role,
) -> Result<PairingOutcome, RoleError> {
    table
        .get_mut(id)
        .ok_or(RoleError::UnknownConnection(id))?
        .declare_role(role)?;
    try_pair(table, id)
}

/// Pairs `id` with the oldest free opposite-role connection, if there is one.
pub fn try_pair(table: &mut ConnectionTable, id: ConnectionId) -> Result<PairingOutcome, RoleError> {
    let connection = table.get(id).ok_or(RoleError::UnknownConnection(id))?;
    if let Some(partner) = connection.partner() {
        return Ok(PairingOutcome::AlreadyPaired { partner });
    }
    let Some(candidate) = table.find_pairing_candidate(connection.role(), id) else {
        return Ok(PairingOutcome::Waiting);
    };
    link(table, id, candidate);
    Ok(PairingOutcome::Paired { partner: candidate })
}

fn link(table: &mut ConnectionTable, a: ConnectionId, b: ConnectionId) {
    let role_a = table.get(a).map(|c| c.role()).unwrap_or_default();
    let role_b = table.get(b).map(|c| c.role()).unwrap_or_default();
    if let Some(conn) = table.get_mut(a) {
        conn.link(b);
        conn.send(ServerMessage::PartnerConnected {
            partner_type: role_b,
        });
    }
    if let Some(conn) = table.get_mut(b) {
        conn.link(a);
        conn.send(ServerMessage::PartnerConnected {
            partner_type: role_a,
        });
    }
}
