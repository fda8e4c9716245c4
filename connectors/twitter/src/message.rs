//! Typed views of streaming API messages.
//!
//! Stream bodies deliver loosely shaped JSON. [`StreamMessage::classify`]
//! sorts a decoded value into the kinds a client usually cares about; anything
//! else is passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TwitterError, TwitterResult};

// ─────────────────────────────────────────────────────────────────────────────
// Shape predicates
// ─────────────────────────────────────────────────────────────────────────────

fn has_fields(value: &Value, fields: &[&str]) -> bool {
    value
        .as_object()
        .is_some_and(|obj| fields.iter().all(|f| obj.contains_key(*f)))
}

/// Whether `value` looks like a tweet.
#[must_use]
pub fn is_tweet(value: &Value) -> bool {
    has_fields(value, &["id_str", "text", "user"])
}

/// Whether `value` looks like a direct message.
#[must_use]
pub fn is_dm(value: &Value) -> bool {
    has_fields(value, &["id_str", "text", "sender", "recipient"])
}

/// Whether `value` looks like a user object.
#[must_use]
pub fn is_user(value: &Value) -> bool {
    has_fields(value, &["id_str", "screen_name"])
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types
// ─────────────────────────────────────────────────────────────────────────────

/// A user as embedded in tweets, DMs and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// User ID
    pub id_str: String,
    /// Handle without the `@`
    pub screen_name: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

impl UserRef {
    /// Parse a user object.
    ///
    /// # Errors
    ///
    /// [`TwitterError::MessageShape`] if `value` is not a user.
    pub fn from_value(value: Value) -> TwitterResult<Self> {
        if !is_user(&value) {
            return Err(shape_error("user", &value));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// User ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id_str
    }

    /// Screen name.
    #[must_use]
    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }
}

/// An `@mention` entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMention {
    /// Mentioned user's ID
    pub id_str: String,
    /// Mentioned user's screen name
    pub screen_name: String,
    /// Start and end offsets in the text
    #[serde(default)]
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Entities {
    #[serde(default)]
    user_mentions: Vec<UserMention>,
}

/// A status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    /// Tweet ID
    pub id_str: String,
    /// Tweet text
    pub text: String,
    /// Author
    pub user: UserRef,
    /// ID of the tweet this replies to
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,
    /// Screen name of the user this replies to
    #[serde(default)]
    pub in_reply_to_screen_name: Option<String>,
    #[serde(default)]
    entities: Entities,
}

impl Tweet {
    /// Parse a tweet.
    ///
    /// # Errors
    ///
    /// [`TwitterError::MessageShape`] if `value` is not a tweet.
    pub fn from_value(value: Value) -> TwitterResult<Self> {
        if !is_tweet(&value) {
            return Err(shape_error("tweet", &value));
        }
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id_str
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn user(&self) -> &UserRef {
        &self.user
    }

    #[must_use]
    pub fn user_mentions(&self) -> &[UserMention] {
        &self.entities.user_mentions
    }

    #[must_use]
    pub fn in_reply_to_id(&self) -> Option<&str> {
        self.in_reply_to_status_id_str.as_deref()
    }

    #[must_use]
    pub fn in_reply_to_screen_name(&self) -> Option<&str> {
        self.in_reply_to_screen_name.as_deref()
    }

    /// Whether this tweet replies to another.
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.in_reply_to_status_id_str.is_some()
    }
}

/// A direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    /// Message ID
    pub id_str: String,
    /// Message text
    pub text: String,
    /// Sending user
    pub sender: UserRef,
    /// Receiving user
    pub recipient: UserRef,
    #[serde(default)]
    entities: Entities,
}

impl DirectMessage {
    /// Parse a direct message, bare or wrapped in `{"direct_message": ...}`.
    ///
    /// # Errors
    ///
    /// [`TwitterError::MessageShape`] if `value` is not a direct message.
    pub fn from_value(value: Value) -> TwitterResult<Self> {
        let value = unwrap_direct_message(value);
        if !is_dm(&value) {
            return Err(shape_error("direct message", &value));
        }
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id_str
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn sender(&self) -> &UserRef {
        &self.sender
    }

    #[must_use]
    pub const fn recipient(&self) -> &UserRef {
        &self.recipient
    }

    #[must_use]
    pub fn user_mentions(&self) -> &[UserMention] {
        &self.entities.user_mentions
    }
}

/// A follow or unfollow event from the user stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    /// User who acted
    pub source: UserRef,
    /// User acted upon
    pub target: UserRef,
}

/// A classified stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Tweet(Tweet),
    DirectMessage(DirectMessage),
    Follow(UserEvent),
    Unfollow(UserEvent),
    /// The friend ID list sent at the start of a user stream.
    FriendsList(Vec<String>),
    /// Anything not recognised above.
    Other(Value),
}

impl StreamMessage {
    /// Classify a decoded stream message.
    ///
    /// Values that look like a known kind but fail to parse are returned as
    /// [`StreamMessage::Other`].
    #[must_use]
    pub fn classify(value: Value) -> Self {
        if value.get("direct_message").is_some() || is_dm(&value) {
            return DirectMessage::from_value(value.clone())
                .map_or(Self::Other(value), Self::DirectMessage);
        }

        if is_tweet(&value) {
            return Tweet::from_value(value.clone()).map_or(Self::Other(value), Self::Tweet);
        }

        match value.get("event").and_then(Value::as_str) {
            Some("follow") => {
                return serde_json::from_value(value.clone())
                    .map_or(Self::Other(value), Self::Follow);
            }
            Some("unfollow") => {
                return serde_json::from_value(value.clone())
                    .map_or(Self::Other(value), Self::Unfollow);
            }
            _ => {}
        }

        if let Some(friends) = value.get("friends_str") {
            return serde_json::from_value(friends.clone())
                .map_or(Self::Other(value), Self::FriendsList);
        }

        Self::Other(value)
    }

    /// Whether this is a tweet.
    #[must_use]
    pub const fn is_tweet(&self) -> bool {
        matches!(self, Self::Tweet(_))
    }

    /// Whether this is a direct message.
    #[must_use]
    pub const fn is_dm(&self) -> bool {
        matches!(self, Self::DirectMessage(_))
    }
}

fn unwrap_direct_message(value: Value) -> Value {
    match value {
        Value::Object(mut obj) if obj.contains_key("direct_message") => obj
            .remove("direct_message")
            .unwrap_or(Value::Object(obj)),
        other => other,
    }
}

fn shape_error(kind: &str, value: &Value) -> TwitterError {
    let mut shown = value.to_string();
    if shown.len() > 120 {
        let mut end = 120;
        while !shown.is_char_boundary(end) {
            end -= 1;
        }
        shown.truncate(end);
        shown.push_str("...");
    }
    TwitterError::MessageShape(format!("not a {kind}: {shown}"))
}
