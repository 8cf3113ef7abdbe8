use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channel::{MemoryChannel, Message};
use crate::error::{IoError, Result};

pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Converged analysis state written between load steps.
///
/// `messages` is the payload produced by `send_self` on every element, in
/// model order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub step: usize,
    pub time: f64,
    pub messages: Vec<Message>,
    pub metadata: BTreeMap<String, String>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            step: 0,
            time: 0.0,
            messages: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl Checkpoint {
    /// Capture everything queued on `channel`.
    pub fn from_channel(step: usize, time: f64, channel: MemoryChannel) -> Self {
        Self {
            step,
            time,
            messages: channel.into_messages(),
            ..Default::default()
        }
    }

    /// Reopen the payload for `recv_self`.
    pub fn into_channel(self) -> MemoryChannel {
        MemoryChannel::from_messages(self.messages)
    }
}

pub fn save_checkpoint(path: impl AsRef<Path>, checkpoint: &Checkpoint) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(checkpoint)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let bytes = fs::read(path)?;
    let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
    if checkpoint.schema_version != CHECKPOINT_SCHEMA_VERSION {
        return Err(IoError::SchemaVersion {
            expected: CHECKPOINT_SCHEMA_VERSION,
            found: checkpoint.schema_version,
        });
    }
    Ok(checkpoint)
}
