//! Negotiation message types.
//!
//! These messages are exchanged between two peers while they decide which
//! usernames each of them may keep.
//!
//! ## Wire form
//!
//! Every message is a JSON object discriminated by its `type` field:
//!
//! ```text
//! {"type":"greeting","ids":{"alice":true,"bob":true},"timestamp":1700000000000000000}
//! {"type":"kick","id":"alice"}
//! {"type":"backoff"}
//! ```
//!
//! Decoding happens in two stages. The codec first parses a generic
//! [`serde_json::Value`], then [`Message::from_document`] interprets it by
//! its discriminator. Unknown types and documents with bad fields are
//! reported through [`Decoded`] instead of failing the stream.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator values carried in the `type` field.
pub mod kinds {
    pub const GREETING: &str = "greeting";
    pub const KICK: &str = "kick";
    pub const BACKOFF: &str = "backoff";
}

/// Size limits applied by the codec.
pub mod limits {
    /// Max bytes of a single inbound document.
    pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;
}

/// Negotiation messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Advertise the names this node is still interested in.
    Greeting(Greeting),

    /// Tell the peer to drop a name from its candidates.
    Kick(Kick),

    /// Tell the peer to pause and greet again later.
    Backoff,
}

/// Body of a greeting.
///
/// `ids` is either the sender's whole candidate set, or the single name the
/// sender has already claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// Names offered by the sender.
    #[serde(with = "id_set", default)]
    pub ids: BTreeSet<String>,
    /// The sender's logical timestamp for its current session.
    pub timestamp: i64,
}

/// Body of a kick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kick {
    /// The name the receiver must give up.
    pub id: String,
}

/// Outcome of interpreting one inbound document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A message of a known type.
    Message(Message),
    /// A well-formed document whose `type` this node does not know.
    Unrecognized(String),
    /// A document that could not be interpreted as any message.
    Malformed(String),
}

impl Message {
    /// Build a greeting.
    pub fn greeting<I, S>(ids: I, timestamp: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Message::Greeting(Greeting {
            ids: ids.into_iter().map(Into::into).collect(),
            timestamp,
        })
    }

    /// Build a kick for `id`.
    pub fn kick(id: impl Into<String>) -> Self {
        Message::Kick(Kick { id: id.into() })
    }

    /// The wire discriminator of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Greeting(_) => kinds::GREETING,
            Message::Kick(_) => kinds::KICK,
            Message::Backoff => kinds::BACKOFF,
        }
    }

    /// Interpret a generic document as a message.
    pub fn from_document(document: Value) -> Decoded {
        let kind = match document.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Decoded::Malformed(format!("non-string type field: {other}")),
            None => return Decoded::Malformed("missing type field".into()),
        };

        let result = match kind.as_str() {
            kinds::GREETING => Greeting::deserialize(document).map(Message::Greeting),
            kinds::KICK => Kick::deserialize(document).map(Message::Kick),
            kinds::BACKOFF => {
                if document.is_object() {
                    Ok(Message::Backoff)
                } else {
                    return Decoded::Malformed("backoff is not an object".into());
                }
            }
            _ => return Decoded::Unrecognized(kind),
        };

        match result {
            Ok(message) => Decoded::Message(message),
            Err(e) => Decoded::Malformed(format!("{kind}: {e}")),
        }
    }
}

/// A set of names encoded as a JSON object mapping each name to `true`.
///
/// Any value is accepted as the sentinel when decoding, and `null` decodes
/// as the empty set.
mod id_set {
    use std::collections::{BTreeMap, BTreeSet};

    use serde::de::IgnoredAny;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ids: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ids.len()))?;
        for id in ids {
            map.serialize_entry(id, &true)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        let map = Option::<BTreeMap<String, IgnoredAny>>::deserialize(deserializer)?;
        Ok(map.map(|m| m.into_keys().collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_greeting_wire_shape() {
        let msg = Message::greeting(["bob", "alice"], 42);
        let doc = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            doc,
            json!({"type": "greeting", "ids": {"alice": true, "bob": true}, "timestamp": 42})
        );
    }

    #[test]
    fn test_kick_and_backoff_wire_shape() {
        assert_eq!(
            serde_json::to_value(Message::kick("alice")).unwrap(),
            json!({"type": "kick", "id": "alice"})
        );
        assert_eq!(
            serde_json::to_value(Message::Backoff).unwrap(),
            json!({"type": "backoff"})
        );
    }

    #[test]
    fn test_greeting_accepts_any_sentinel() {
        let doc = json!({"type": "greeting", "ids": {"alice": {}, "bob": 1}, "timestamp": 7});
        assert_eq!(
            Message::from_document(doc),
            Decoded::Message(Message::greeting(["alice", "bob"], 7))
        );
    }

    #[test]
    fn test_greeting_null_ids_is_empty() {
        let doc = json!({"type": "greeting", "ids": null, "timestamp": 7});
        assert_eq!(
            Message::from_document(doc),
            Decoded::Message(Message::greeting(Vec::<String>::new(), 7))
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let doc = json!({"type": "kick", "id": "alice", "reason": "taken"});
        assert_eq!(
            Message::from_document(doc),
            Decoded::Message(Message::kick("alice"))
        );
    }

    #[test]
    fn test_unknown_type_is_unrecognized() {
        let doc = json!({"type": "ping", "nonce": 3});
        assert_eq!(Message::from_document(doc), Decoded::Unrecognized("ping".into()));
    }

    #[test]
    fn test_bad_fields_are_malformed() {
        let cases = [
            json!({"type": "kick"}),
            json!({"type": "kick", "id": 5}),
            json!({"type": "greeting", "ids": ["alice"], "timestamp": 1}),
            json!({"type": "greeting", "ids": {}, "timestamp": "soon"}),
            json!({"type": 3}),
            json!({"id": "alice"}),
            json!(["greeting"]),
        ];

        for doc in cases {
            assert!(
                matches!(Message::from_document(doc.clone()), Decoded::Malformed(_)),
                "expected malformed: {doc}"
            );
        }
    }

    #[test]
    fn test_kind() {
        assert_eq!(Message::greeting(["a"], 1).kind(), "greeting");
        assert_eq!(Message::kick("a").kind(), "kick");
        assert_eq!(Message::Backoff.kind(), "backoff");
    }
}
