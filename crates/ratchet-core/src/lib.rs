//! Double Ratchet Core
//!
//! Per-conversation key evolution for asynchronous encrypted messaging. The
//! engine derives a fresh key for every message from a symmetric chain and
//! re-keys the chains with a Diffie-Hellman step whenever the peer shows up
//! with a new public key.
//!
//! # Architecture
//!
//! ```text
//!            caller
//!              │  ConversationId, MessageHeader
//!              ▼
//!       ┌──────────────┐   KeyRepository    ┌──────────────────┐
//!       │ RatchetEngine │ ─────────────────► │ X25519 + HKDF    │
//!       └──────────────┘                     └──────────────────┘
//!              │  LocalDatasource
//!              ▼
//!   Conversation snapshots + skipped message keys
//! ```
//!
//! Every engine call reads a fresh [`Conversation`] snapshot, transforms it
//! and writes it back. Nothing is cached between calls, so correctness under
//! concurrency reduces to one rule: at most one in-flight call per
//! [`ConversationId`]. [`ConversationLocks`] is a ready-made way to enforce it.
//!
//! # Ratchet Policy
//!
//! - Sending always advances the sending chain; it never performs a
//!   Diffie-Hellman step.
//! - Receiving a header with an unseen public key starts a new epoch: the
//!   receive chain is re-derived from the root key, and the sending side rolls
//!   to a fresh key pair so the next send publishes a new public key.
//! - Keys for skipped messages are cached under
//!   `"{conversationId} - {messageNumber}"` and popped exactly once.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod conversation;
pub mod engine;
pub mod env;
pub mod error;
pub mod header;
pub mod locks;
pub mod storage;
pub mod system_env;

pub use config::EngineConfig;
pub use conversation::{Conversation, ConversationId, ConversationState};
pub use engine::{RatchetEngine, message_key_id};
pub use env::Environment;
pub use error::RatchetError;
pub use header::{InvitationData, MessageHeader, SendMessageData};
pub use locks::ConversationLocks;
pub use storage::{ChaoticStorage, LocalDatasource, MemoryStorage, RedbStorage, StorageError};
pub use system_env::SystemEnv;
