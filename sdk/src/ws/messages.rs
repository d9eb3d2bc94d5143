//! WebSocket message types.
//!
//! Defines the JSON commands, replies and pushes of the Centrifugo client
//! protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::TransportError;

/// Client-to-server command.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    /// Correlation identifier, echoed in the reply.
    pub id: u32,

    /// The request.
    #[serde(flatten)]
    pub method: Method,
}

/// Command requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Authenticate the connection.
    Connect {
        /// Connection token.
        token: String,
        /// Client name.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Join a channel.
    Subscribe {
        /// Channel name.
        channel: String,
    },
    /// Leave a channel.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },
    /// Publish into a channel.
    Publish {
        /// Channel name.
        channel: String,
        /// Payload.
        data: Value,
    },
    /// Replace the connection token.
    Refresh {
        /// New connection token.
        token: String,
    },
}

impl Method {
    /// Returns the protocol name of the request.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Publish { .. } => "publish",
            Self::Refresh { .. } => "refresh",
        }
    }
}

/// Server-to-client frame entry: a reply, a push, or a ping.
///
/// An entry with no field set is a server ping.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Reply {
    /// Command identifier; zero for pushes and pings.
    #[serde(default)]
    pub id: u32,

    /// Error reply.
    pub error: Option<ReplyError>,

    /// Asynchronous push.
    pub push: Option<Push>,

    /// Connect result.
    pub connect: Option<ConnectResult>,

    /// Refresh result.
    pub refresh: Option<RefreshResult>,

    /// Subscribe result.
    pub subscribe: Option<Value>,

    /// Unsubscribe result.
    pub unsubscribe: Option<Value>,

    /// Publish result.
    pub publish: Option<Value>,
}

impl Reply {
    /// Returns true if this entry is a server ping.
    #[must_use]
    pub fn is_ping(&self) -> bool {
        *self == Self::default()
    }
}

/// Error carried by a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyError {
    /// Error code.
    pub code: u32,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// True if retrying may succeed.
    #[serde(default)]
    pub temporary: bool,
}

/// Result of a connect command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectResult {
    /// Client identifier assigned by the server.
    #[serde(default)]
    pub client: String,
    /// Server version.
    #[serde(default)]
    pub version: String,
    /// True if the token expires.
    #[serde(default)]
    pub expires: bool,
    /// Seconds until the token expires.
    #[serde(default)]
    pub ttl: u64,
}

/// Result of a refresh command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RefreshResult {
    /// True if the new token expires.
    #[serde(default)]
    pub expires: bool,
    /// Seconds until the new token expires.
    #[serde(default)]
    pub ttl: u64,
}

/// Asynchronous server message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Push {
    /// Channel the push belongs to (empty for connection-level pushes).
    #[serde(default)]
    pub channel: String,

    /// Publication.
    #[serde(rename = "pub")]
    pub publication: Option<Publication>,

    /// Server-side unsubscribe.
    pub unsubscribe: Option<Unsubscribe>,

    /// Server-side disconnect.
    pub disconnect: Option<Disconnect>,
}

/// Publication push.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Publication {
    /// Payload.
    #[serde(default)]
    pub data: Value,
}

/// Unsubscribe push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Unsubscribe {
    /// Reason code.
    #[serde(default)]
    pub code: u32,
    /// Reason text.
    #[serde(default)]
    pub reason: String,
}

/// Disconnect push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Disconnect {
    /// Reason code.
    #[serde(default)]
    pub code: u32,
    /// Reason text.
    #[serde(default)]
    pub reason: String,
}

/// Returns true for disconnect codes after which the client must not
/// reconnect.
#[must_use]
pub fn is_terminal_code(code: u32) -> bool {
    (3500..4000).contains(&code) || (4500..5000).contains(&code)
}

/// Splits a text frame into entries. Servers batch entries separated by
/// newlines.
///
/// Each line decodes on its own; a malformed line yields
/// [`TransportError::Deserialization`] without affecting its neighbours.
pub fn decode_frame(text: &str) -> impl Iterator<Item = Result<Reply, TransportError>> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Reply>(line)
                .map_err(|e| TransportError::Deserialization(format!("{}: {}", e, line)))
        })
}
