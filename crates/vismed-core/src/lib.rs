// Event Relay Abstraction
//
// This crate provides the in-process relay behind the Vismed backend:
// payload shaping, narrow dedup, subscriber fan-out, and the pending buffer
// replayed to the next subscriber that connects.
//
// Key design decisions:
// - Relay state is one owned EventRelay instance shared by Arc, not globals
// - Payloads are opaque serde_json::Value documents (no enforced schema)
// - Each subscriber owns an unbounded channel; Subscription implements
//   Stream and deregisters itself exactly once when dropped
// - Dedup only consults the pending buffer, never payloads already
//   delivered to connected subscribers

pub mod error;
pub mod payload;
pub mod relay;

// Re-exports for convenience
pub use error::{RelayError, Result};
pub use payload::{dedup_signature, normalize, output_text, SIGNATURE_CHARS};
pub use relay::{EventRelay, PublishOutcome, Subscription};
