//! Session types.
//!
//! A session is one mounted event page: which event it follows and which role
//! the viewer holds. Both are fixed for the session's lifetime.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Query parameter carrying the event identifier.
pub const EVENT_ID_PARAM: &str = "eventId";

/// Query parameter carrying the user type.
pub const USER_TYPE_PARAM: &str = "userType";

/// `userType` value that grants the host role.
pub const HOST_USER_TYPE: &str = "eventHost";

/// Opaque event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new event identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Access role of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular attendee.
    #[default]
    Viewer,
    /// Event host, additionally receives analytics.
    Host,
}

impl Role {
    /// Maps a `userType` page parameter to a role.
    ///
    /// Only [`HOST_USER_TYPE`] grants the host role; anything else is a viewer.
    #[must_use]
    pub fn from_user_type(user_type: Option<&str>) -> Self {
        match user_type {
            Some(HOST_USER_TYPE) => Self::Host,
            _ => Self::Viewer,
        }
    }

    /// Returns true if this is the host role.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => write!(f, "viewer"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// An event page session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    event_id: EventId,
    role: Role,
}

impl Session {
    /// Creates a new session.
    #[must_use]
    pub fn new(event_id: impl Into<EventId>, role: Role) -> Self {
        Self {
            event_id: event_id.into(),
            role,
        }
    }

    /// Builds a session from the hosting page URL.
    ///
    /// Reads the `eventId` and `userType` query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or `eventId` is missing.
    pub fn from_page_url(page_url: &str) -> Result<Self, SessionError> {
        let url = Url::parse(page_url).map_err(|e| SessionError::InvalidPageUrl(e.to_string()))?;

        let mut event_id = None;
        let mut user_type = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                EVENT_ID_PARAM => event_id = Some(value.into_owned()),
                USER_TYPE_PARAM => user_type = Some(value.into_owned()),
                _ => {}
            }
        }

        let event_id = event_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingParameter(EVENT_ID_PARAM))?;

        Ok(Self::new(
            EventId::new(event_id),
            Role::from_user_type(user_type.as_deref()),
        ))
    }

    /// Returns the event identifier.
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the channel names for this session's event.
    #[must_use]
    pub fn channels(&self) -> EventChannels {
        EventChannels::for_event(&self.event_id)
    }
}

/// Channel names derived from an event identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventChannels {
    /// Channel carrying individual reactions.
    pub primary: String,
    /// Host-only channel carrying reaction batches.
    pub analytics: String,
}

impl EventChannels {
    /// Derives the channel names for an event.
    #[must_use]
    pub fn for_event(event_id: &EventId) -> Self {
        let primary = format!("event-channel-{}", event_id);
        let analytics = format!("{}-host-analytics", primary);
        Self { primary, analytics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_user_type() {
        assert_eq!(Role::from_user_type(Some("eventHost")), Role::Host);
        assert_eq!(Role::from_user_type(Some("user")), Role::Viewer);
        assert_eq!(Role::from_user_type(Some("host")), Role::Viewer);
        assert_eq!(Role::from_user_type(None), Role::Viewer);
    }

    #[test]
    fn test_session_from_page_url_host() {
        let session =
            Session::from_page_url("http://localhost:3000/?eventId=42&userType=eventHost")
                .expect("session");
        assert_eq!(session.event_id().as_str(), "42");
        assert_eq!(session.role(), Role::Host);
    }

    #[test]
    fn test_session_from_page_url_defaults_to_viewer() {
        let session = Session::from_page_url("http://localhost:3000/event?eventId=abc")
            .expect("session");
        assert_eq!(session.role(), Role::Viewer);
    }

    #[test]
    fn test_session_from_page_url_missing_event() {
        let err = Session::from_page_url("http://localhost:3000/?userType=eventHost")
            .expect_err("missing event id");
        assert!(matches!(err, SessionError::MissingParameter("eventId")));

        let err = Session::from_page_url("http://localhost:3000/?eventId=")
            .expect_err("empty event id");
        assert!(matches!(err, SessionError::MissingParameter(_)));
    }

    #[test]
    fn test_session_from_page_url_invalid() {
        let err = Session::from_page_url("not a url").expect_err("invalid url");
        assert!(matches!(err, SessionError::InvalidPageUrl(_)));
    }

    #[test]
    fn test_event_channels() {
        let channels = Session::new("42", Role::Viewer).channels();
        assert_eq!(channels.primary, "event-channel-42");
        assert_eq!(channels.analytics, "event-channel-42-host-analytics");
    }
}
