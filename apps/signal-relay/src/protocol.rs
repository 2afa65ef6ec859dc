//! Wire vocabulary spoken over `/ws`.
//!
//! Frames are JSON objects tagged by `type`. The canonical spellings are
//! camelCase (`createOffer`, `createAnswer`, `iceCandidate`). Older browser
//! clients send and listen for `createoffer` / `createanswer`; those spellings
//! are kept as their own variants and reach the partner exactly as sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Role;
use crate::error::DecodeError;

/// Every `type` value a client may send, aliases included.
const CLIENT_TYPES: &[&str] = &[
    "sender",
    "receiver",
    "createOffer",
    "createoffer",
    "createAnswer",
    "createanswer",
    "iceCandidate",
];

/// Messages sent from a browser peer to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Declare the camera/microphone side.
    Sender,
    /// Declare the viewing side.
    Receiver,
    CreateOffer { sdp: Value },
    CreateAnswer { sdp: Value },
    IceCandidate { candidate: Value },
    #[serde(rename = "createoffer")]
    LegacyCreateOffer { sdp: Value },
    #[serde(rename = "createanswer")]
    LegacyCreateAnswer { sdp: Value },
}

/// Messages sent from the relay to a browser peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    PartnerConnected {
        #[serde(rename = "partnerType")]
        partner_type: Role,
    },
    PartnerDisconnected,
    CreateOffer {
        sdp: Value,
    },
    CreateAnswer {
        sdp: Value,
    },
    IceCandidate {
        candidate: Value,
    },
    #[serde(rename = "createoffer")]
    LegacyCreateOffer {
        sdp: Value,
    },
    #[serde(rename = "createanswer")]
    LegacyCreateAnswer {
        sdp: Value,
    },
}

/// An opaque signaling payload on its way to the partner.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    /// Offer sent as `createoffer`; forwarded with the same spelling.
    LegacyOffer(Value),
    /// Answer sent as `createanswer`; forwarded with the same spelling.
    LegacyAnswer(Value),
}

impl Signal {
    /// Wire `type` of the frame, as the client spelled it.
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "createOffer",
            Signal::Answer(_) => "createAnswer",
            Signal::IceCandidate(_) => "iceCandidate",
            Signal::LegacyOffer(_) => "createoffer",
            Signal::LegacyAnswer(_) => "createanswer",
        }
    }

    /// Role the originating connection must hold, or `None` if either side may send it.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Signal::Offer(_) | Signal::LegacyOffer(_) => Some(Role::Sender),
            Signal::Answer(_) | Signal::LegacyAnswer(_) => Some(Role::Receiver),
            Signal::IceCandidate(_) => None,
        }
    }

    pub fn into_server_message(self) -> ServerMessage {
        match self {
            Signal::Offer(sdp) => ServerMessage::CreateOffer { sdp },
            Signal::Answer(sdp) => ServerMessage::CreateAnswer { sdp },
            Signal::IceCandidate(candidate) => ServerMessage::IceCandidate { candidate },
            Signal::LegacyOffer(sdp) => ServerMessage::LegacyCreateOffer { sdp },
            Signal::LegacyAnswer(sdp) => ServerMessage::LegacyCreateAnswer { sdp },
        }
    }
}

/// What the connection handler should do with a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    DeclareRole(Role),
    Relay(Signal),
}

impl ClientMessage {
    /// Decodes one text frame. Nothing is mutated until this succeeds.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?;
        if !CLIENT_TYPES.contains(&kind) {
            return Err(DecodeError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(DecodeError::InvalidPayload)
    }

    /// Decodes a binary frame that carries UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
        Self::decode(text)
    }

    pub fn classify(self) -> Inbound {
        match self {
            ClientMessage::Sender => Inbound::DeclareRole(Role::Sender),
            ClientMessage::Receiver => Inbound::DeclareRole(Role::Receiver),
            ClientMessage::CreateOffer { sdp } => Inbound::Relay(Signal::Offer(sdp)),
            ClientMessage::CreateAnswer { sdp } => Inbound::Relay(Signal::Answer(sdp)),
            ClientMessage::IceCandidate { candidate } => {
                Inbound::Relay(Signal::IceCandidate(candidate))
            }
            ClientMessage::LegacyCreateOffer { sdp } => Inbound::Relay(Signal::LegacyOffer(sdp)),
            ClientMessage::LegacyCreateAnswer { sdp } => {
                Inbound::Relay(Signal::LegacyAnswer(sdp))
            }
        }
    }
}
