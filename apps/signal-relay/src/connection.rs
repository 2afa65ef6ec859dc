use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::RoleError;
use crate::protocol::ServerMessage;

/// Process-unique identifier assigned when a transport is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Negotiation role of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unset,
    Sender,
    Receiver,
}

impl Role {
    /// The role a partner must hold, or `None` while the role is still unset.
    pub fn opposite(self) -> Option<Role> {
        match self {
            Role::Unset => None,
            Role::Sender => Some(Role::Receiver),
            Role::Receiver => Some(Role::Sender),
        }
    }

    pub fn is_set(self) -> bool {
        self != Role::Unset
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Unset => "unset",
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue feeding a connection's writer task. Only that task touches the socket.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

/// Negotiation state for one live client socket.
///
/// `partner` is a non-owning back-reference: the registry keeps it symmetric,
/// so if `a.partner() == Some(b.id())` then `b.partner() == Some(a.id())`.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    role: Role,
    partner: Option<ConnectionId>,
    outbound: Outbound,
    admitted: u64,
}

impl Connection {
    pub fn new(id: ConnectionId, outbound: Outbound, admitted: u64) -> Self {
        Self {
            id,
            role: Role::Unset,
            partner: None,
            outbound,
            admitted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn partner(&self) -> Option<ConnectionId> {
        self.partner
    }

    /// Admission sequence number; lower means accepted earlier.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Sets the role. The role is write-once.
    pub fn declare_role(&mut self, role: Role) -> Result<(), RoleError> {
        if !role.is_set() {
            return Err(RoleError::Unset);
        }
        if self.role.is_set() {
            return Err(RoleError::AlreadyDeclared { current: self.role });
        }
        self.role = role;
        Ok(())
    }

    /// Whether this connection could be paired with a newcomer holding `role`.
    pub fn accepts_partner_role(&self, role: Role) -> bool {
        self.partner.is_none() && role.opposite() == Some(self.role)
    }

    pub(crate) fn link(&mut self, partner: ConnectionId) {
        self.partner = Some(partner);
    }

    pub(crate) fn unlink(&mut self) -> Option<ConnectionId> {
        self.partner.take()
    }

    /// Enqueues a message for the writer task. Returns `false` once the writer is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.send(message).is_ok()
    }
}
