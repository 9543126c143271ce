//! Translation between the LKE SSE dialect and the `OpenAI` format.
//!
//! The core of the bridge: parses upstream event blocks, repairs mis-encoded
//! text, diffs reasoning snapshots, selects the authoritative reply, and
//! builds the outbound chunks/responses. Everything here is pure (no I/O).

pub mod lke_types;
pub mod openai_types;
pub mod repair;
pub mod request;
pub mod sse;
pub mod streaming;
