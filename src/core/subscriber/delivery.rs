use std::fmt;

use crate::core::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Ack,
    Nack,
}

type Reply = Box<dyn FnOnce(AckOutcome) + Send>;

/// Settles one delivery with the broker.
///
/// Consumed by `ack`, so a delivery is acknowledged at most once. Dropping an
/// unacknowledged handle is a nack and the broker will redeliver.
pub struct AckHandle {
    reply: Option<Reply>,
}

impl AckHandle {
    pub fn new<F>(reply: F) -> Self
    where
        F: FnOnce(AckOutcome) + Send + 'static,
    {
        Self {
            reply: Some(Box::new(reply)),
        }
    }

    pub fn ack(mut self) {
        self.settle(AckOutcome::Ack);
    }

    fn settle(&mut self, outcome: AckOutcome) {
        if let Some(reply) = self.reply.take() {
            reply(outcome);
        }
    }
}

impl Drop for AckHandle {
    fn drop(&mut self) {
        self.settle(AckOutcome::Nack);
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("settled", &self.reply.is_none())
            .finish()
    }
}

/// A received message together with the handle that settles it.
#[derive(Debug)]
pub struct Delivery {
    message: Message,
    attempt: u32,
    ack: AckHandle,
}

impl Delivery {
    pub fn new(message: Message, attempt: u32, ack: AckHandle) -> Self {
        Self {
            message,
            attempt,
            ack,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// 1 on first delivery, incremented on every redelivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn into_parts(self) -> (Message, AckHandle) {
        (self.message, self.ack)
    }

    pub fn ack(self) {
        self.ack.ack();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (AckHandle, Arc<Mutex<Vec<AckOutcome>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = AckHandle::new(move |outcome| sink.lock().unwrap().push(outcome));
        (handle, seen)
    }

    #[test]
    fn ack_settles_once() {
        let (handle, seen) = recording();
        Delivery::new(Message::new("x"), 1, handle).ack();
        assert_eq!(*seen.lock().unwrap(), vec![AckOutcome::Ack]);
    }

    #[test]
    fn dropping_unsettled_delivery_nacks() {
        let (handle, seen) = recording();
        drop(Delivery::new(Message::new("x"), 1, handle));
        assert_eq!(*seen.lock().unwrap(), vec![AckOutcome::Nack]);
    }
}
