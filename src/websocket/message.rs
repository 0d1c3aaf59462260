use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::UserIdentity;

/// Event fanned out to chat clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Join { user: UserIdentity },
    Left { user: UserIdentity },
    Chat { user: UserIdentity, text: String },
    Roster {
        user: UserIdentity,
        members: Vec<UserIdentity>,
    },
}

impl ChatEvent {
    pub fn join(user: UserIdentity) -> Self {
        Self::Join { user }
    }

    pub fn left(user: UserIdentity) -> Self {
        Self::Left { user }
    }

    /// Chat line with surrounding whitespace removed; `None` if nothing is left
    pub fn chat(user: UserIdentity, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self::Chat {
            user,
            text: text.to_string(),
        })
    }

    pub fn roster(user: UserIdentity, members: Vec<UserIdentity>) -> Self {
        Self::Roster { user, members }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Join { .. } => EventKind::Join,
            Self::Left { .. } => EventKind::Left,
            Self::Chat { .. } => EventKind::Chat,
            Self::Roster { .. } => EventKind::List,
        }
    }

    pub fn user(&self) -> &UserIdentity {
        match self {
            Self::Join { user }
            | Self::Left { user }
            | Self::Chat { user, .. }
            | Self::Roster { user, .. } => user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Join,
    Left,
    Chat,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeData {
    Text(String),
    Members(Vec<UserIdentity>),
}

/// Wire frame sent from the hub to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub user: UserIdentity,
    pub data: EnvelopeData,
}

impl Envelope {
    pub fn new(id: u64, event: &ChatEvent) -> Self {
        let data = match event {
            ChatEvent::Join { user } => EnvelopeData::Text(format!("{} joined.", user.name)),
            ChatEvent::Left { user } => EnvelopeData::Text(format!("{} is left.", user.name)),
            ChatEvent::Chat { text, .. } => EnvelopeData::Text(text.clone()),
            ChatEvent::Roster { members, .. } => EnvelopeData::Members(members.clone()),
        };

        Self {
            id,
            kind: event.kind(),
            user: event.user().clone(),
            data,
        }
    }

    /// Parse a frame received by a client
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Serialized envelope, shared by every connection it is pushed to
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub id: u64,
    pub text: Arc<str>,
}

/// Turns events into frames, stamping each with the next sequence id.
///
/// Ids start at 1 and increase by one per encoded event. The codec is not
/// synchronized; the hub serializes access to it.
#[derive(Debug, Default)]
pub struct EnvelopeCodec {
    last_id: u64,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id handed to the most recent event, 0 before the first
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn encode(&mut self, event: &ChatEvent) -> Result<EncodedFrame, serde_json::Error> {
        let id = self.last_id + 1;
        let frame = Self::encode_with_id(id, event)?;
        self.last_id = id;
        Ok(frame)
    }

    pub fn encode_with_id(id: u64, event: &ChatEvent) -> Result<EncodedFrame, serde_json::Error> {
        let text = serde_json::to_string(&Envelope::new(id, event))?;
        Ok(EncodedFrame {
            id,
            text: Arc::from(text),
        })
    }
}

/// Work item for a connection's writer task
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Text(EncodedFrame),
    Close { code: u16, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> UserIdentity {
        UserIdentity::new(1u64, "Alice", 1)
    }

    #[test]
    fn test_join_wire_shape() {
        let frame = EnvelopeCodec::encode_with_id(7, &ChatEvent::join(alice())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame.text).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "type": "join",
                "user": {"id": 1, "name": "Alice", "image": 1},
                "data": "Alice joined."
            })
        );
    }

    #[test]
    fn test_left_and_roster_data() {
        let left = Envelope::new(1, &ChatEvent::left(alice()));
        assert_eq!(left.kind, EventKind::Left);
        assert_eq!(left.data, EnvelopeData::Text("Alice is left.".to_string()));

        let bob = UserIdentity::new(2u64, "Bob", 2);
        let roster = Envelope::new(2, &ChatEvent::roster(alice(), vec![alice(), bob.clone()]));
        assert_eq!(roster.kind, EventKind::List);
        assert_eq!(roster.data, EnvelopeData::Members(vec![alice(), bob]));
    }

    #[test]
    fn test_chat_is_trimmed() {
        let event = ChatEvent::chat(alice(), "  hello there \n").unwrap();
        let envelope = Envelope::new(1, &event);
        assert_eq!(envelope.kind, EventKind::Chat);
        assert_eq!(envelope.data, EnvelopeData::Text("hello there".to_string()));
    }

    #[test]
    fn test_blank_chat_is_rejected() {
        assert!(ChatEvent::chat(alice(), "").is_none());
        assert!(ChatEvent::chat(alice(), "  \t\n ").is_none());
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut codec = EnvelopeCodec::new();
        assert_eq!(codec.last_id(), 0);

        let ids: Vec<u64> = (0..3)
            .map(|_| codec.encode(&ChatEvent::join(alice())).unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(codec.last_id(), 3);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let event = ChatEvent::chat(alice(), "hi").unwrap();
        let a = EnvelopeCodec::encode_with_id(42, &event).unwrap();
        let b = EnvelopeCodec::encode_with_id(42, &event).unwrap();
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn test_client_can_decode_frame() {
        let frame = EnvelopeCodec::encode_with_id(3, &ChatEvent::join(alice())).unwrap();
        let envelope = Envelope::from_json(&frame.text).unwrap();
        assert_eq!(envelope, Envelope::new(3, &ChatEvent::join(alice())));
    }
}
