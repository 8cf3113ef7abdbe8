//! I/O support for the nonlinear element core.
//!
//! This crate provides:
//! - **Channel** abstraction used by `send_self`/`recv_self`
//! - **In-memory channel** for copies between workers
//! - **JSON checkpoint** persistence/loading of channel payloads

pub mod channel;
mod checkpoint;
pub mod error;

pub use channel::{Channel, MemoryChannel, Message};
pub use checkpoint::{CHECKPOINT_SCHEMA_VERSION, Checkpoint, load_checkpoint, save_checkpoint};
pub use error::{ChannelError, IoError, Result};
