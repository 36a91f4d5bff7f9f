//! Provider webhook ingestion.
//!
//! The HTTP transport is external; it verifies the signature over the raw
//! body with [`verify_signature`], parses with [`parse_event`], and hands
//! the envelope to [`WebhookRouter::handle`]. Signature failures are
//! rejected before any handler dispatch.

pub mod event;
pub mod signature;

pub use event::{EventKind, WebhookEvent, WebhookRouter, parse_event};
pub use signature::{compute_signature, verify_signature};
