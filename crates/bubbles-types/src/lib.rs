//! Shared type definitions for the Bubbles live-grid client.
//!
//! This crate holds the value types that cross the wire from the bubble
//! server and the domain types the client keeps in its entity store.
//! Nothing here performs I/O.
//!
//! # Modules
//!
//! - [`bubble`] -- Grid positions, rarity categories, and bubble state
//! - [`message`] -- Stream frames, the info summary, and the activity payload

pub mod bubble;
pub mod message;

// Re-export all public types at crate root for convenience.
pub use bubble::{BubbleId, BubbleState, EntityUpdate, Position, Rarity};
pub use message::{ActivityResponse, BubblePayload, InfoSummary, MessageError, StreamMessage};
