use bytes::Bytes;
use std::fmt;

/// Broker-assigned identifier of a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId(s)
    }
}

/// An opaque payload, plus the id the broker stamped on it once accepted.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: Option<MessageId>,
    payload: Bytes,
}

impl Message {
    /// A message that has not been through the broker yet.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            payload: payload.into(),
        }
    }

    /// Returns a copy of this message as accepted by the broker.
    pub fn confirmed(&self, id: MessageId) -> Self {
        Self {
            id: Some(id),
            payload: self.payload.clone(),
        }
    }

    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload rendered as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_no_id() {
        let msg = Message::new("hello world!");
        assert!(msg.id().is_none());
        assert_eq!(msg.payload().as_ref(), b"hello world!");
    }

    #[test]
    fn confirmed_copy_keeps_payload() {
        let msg = Message::new(vec![0xff, b'a']);
        let confirmed = msg.confirmed(MessageId::from("42"));

        assert_eq!(confirmed.id().map(MessageId::as_str), Some("42"));
        assert_eq!(confirmed.payload(), msg.payload());
        assert!(msg.id().is_none());
        assert_eq!(confirmed.text(), "\u{fffd}a");
    }
}
