//! Abstract channel used by elements and materials to serialize themselves.
//!
//! Objects pack a fixed-layout integer ID vector and a numeric data vector
//! and then ask their owned sub-objects to do the same. Receiving reads the
//! messages back in exactly the same order; every read states the length it
//! expects so that a layout disagreement between sender and receiver is
//! caught immediately.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A single packed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Id {
        db_tag: i32,
        commit_tag: i32,
        data: Vec<i32>,
    },
    Vector {
        db_tag: i32,
        commit_tag: i32,
        data: Vec<f64>,
    },
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Id { .. } => "id",
            Message::Vector { .. } => "vector",
        }
    }
}

/// Transport for `send_self`/`recv_self`.
pub trait Channel {
    /// Send an integer ID vector.
    fn send_id(&mut self, db_tag: i32, commit_tag: i32, data: &[i32]) -> Result<(), ChannelError>;

    /// Receive an integer ID vector of exactly `len` entries.
    fn recv_id(
        &mut self,
        db_tag: i32,
        commit_tag: i32,
        len: usize,
    ) -> Result<Vec<i32>, ChannelError>;

    /// Send a numeric data vector.
    fn send_vector(
        &mut self,
        db_tag: i32,
        commit_tag: i32,
        data: &[f64],
    ) -> Result<(), ChannelError>;

    /// Receive a numeric data vector of exactly `len` entries.
    fn recv_vector(
        &mut self,
        db_tag: i32,
        commit_tag: i32,
        len: usize,
    ) -> Result<Vec<f64>, ChannelError>;
}

/// FIFO channel held in memory.
///
/// Used for checkpoints (the queued messages are what gets written to disk)
/// and for copying objects between workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryChannel {
    messages: VecDeque<Message>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a channel from previously captured messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into(),
        }
    }

    /// Number of messages still queued.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drain the queued messages in send order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages.into()
    }

    fn pop(&mut self, expected: &'static str, db_tag: i32) -> Result<Message, ChannelError> {
        let message = self
            .messages
            .pop_front()
            .ok_or(ChannelError::Exhausted(expected))?;

        if message.kind() != expected {
            return Err(ChannelError::KindMismatch {
                expected,
                found: message.kind(),
            });
        }

        let found = match &message {
            Message::Id { db_tag, .. } | Message::Vector { db_tag, .. } => *db_tag,
        };
        if found != db_tag {
            return Err(ChannelError::TagMismatch {
                expected: db_tag,
                found,
            });
        }

        Ok(message)
    }
}

impl Channel for MemoryChannel {
    fn send_id(&mut self, db_tag: i32, commit_tag: i32, data: &[i32]) -> Result<(), ChannelError> {
        self.messages.push_back(Message::Id {
            db_tag,
            commit_tag,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn recv_id(
        &mut self,
        db_tag: i32,
        _commit_tag: i32,
        len: usize,
    ) -> Result<Vec<i32>, ChannelError> {
        match self.pop("id", db_tag)? {
            Message::Id { data, .. } if data.len() == len => Ok(data),
            Message::Id { data, .. } => Err(ChannelError::SizeMismatch {
                expected: len,
                actual: data.len(),
            }),
            Message::Vector { .. } => unreachable!("kind checked in pop"),
        }
    }

    fn send_vector(
        &mut self,
        db_tag: i32,
        commit_tag: i32,
        data: &[f64],
    ) -> Result<(), ChannelError> {
        self.messages.push_back(Message::Vector {
            db_tag,
            commit_tag,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn recv_vector(
        &mut self,
        db_tag: i32,
        _commit_tag: i32,
        len: usize,
    ) -> Result<Vec<f64>, ChannelError> {
        match self.pop("vector", db_tag)? {
            Message::Vector { data, .. } if data.len() == len => Ok(data),
            Message::Vector { data, .. } => Err(ChannelError::SizeMismatch {
                expected: len,
                actual: data.len(),
            }),
            Message::Id { .. } => unreachable!("kind checked in pop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_come_back_in_send_order() {
        let mut channel = MemoryChannel::new();
        channel.send_id(0, 1, &[7, 8]).unwrap();
        channel.send_vector(0, 1, &[1.5, -2.0, 3.25]).unwrap();
        assert_eq!(channel.len(), 2);

        assert_eq!(channel.recv_id(0, 1, 2).unwrap(), vec![7, 8]);
        assert_eq!(channel.recv_vector(0, 1, 3).unwrap(), vec![1.5, -2.0, 3.25]);
        assert!(channel.is_empty());
    }

    #[test]
    fn declared_length_must_match_payload() {
        let mut channel = MemoryChannel::new();
        channel.send_vector(0, 0, &[1.0, 2.0]).unwrap();

        let err = channel.recv_vector(0, 0, 3).unwrap_err();
        assert_eq!(
            err,
            ChannelError::SizeMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn kind_and_tag_are_checked() {
        let mut channel = MemoryChannel::new();
        channel.send_vector(0, 0, &[1.0]).unwrap();
        assert!(matches!(
            channel.recv_id(0, 0, 1),
            Err(ChannelError::KindMismatch { expected: "id", found: "vector" })
        ));

        channel.send_id(4, 0, &[1]).unwrap();
        assert_eq!(
            channel.recv_id(5, 0, 1).unwrap_err(),
            ChannelError::TagMismatch {
                expected: 5,
                found: 4
            }
        );
    }

    #[test]
    fn empty_channel_reports_exhaustion() {
        let mut channel = MemoryChannel::new();
        assert_eq!(
            channel.recv_vector(0, 0, 1).unwrap_err(),
            ChannelError::Exhausted("vector")
        );
    }
}
