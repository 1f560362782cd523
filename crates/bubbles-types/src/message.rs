//! Frames received from the bubble server.
//!
//! Every stream frame is a JSON object with an `info` summary and an
//! optional `bubble` payload:
//!
//! ```json
//! {
//!   "info": { "seed": "42", "total_bubbles": 7, "grid_size": 20 },
//!   "bubble": {
//!     "id": "b1", "pos": { "row": 1, "column": 2 },
//!     "rarity": "dark", "is_invisible": false, "is_finish": false
//!   }
//! }
//! ```
//!
//! A frame without a usable bubble (absent, `null`, or with an empty id) is
//! a configuration frame. Fields the server may omit are defaulted so that
//! a terse finished update such as `{"id": "b1", "is_finish": true}` still
//! decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bubble::{BubbleId, BubbleState, EntityUpdate, Position, Rarity};

/// Errors raised while interpreting a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// A live (non-finished) bubble payload arrived without a position.
    #[error("bubble {id} has no position")]
    MissingPosition {
        /// Identifier of the offending bubble.
        id: String,
    },
}

/// Summary of the server-side session attached to every frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InfoSummary {
    /// Seed of the server's procedural generator. Any JSON value.
    #[serde(default)]
    pub seed: serde_json::Value,
    /// Number of bubbles alive on the server.
    #[serde(default)]
    pub total_bubbles: u64,
    /// Side length of the square grid, present on configuration frames.
    #[serde(default)]
    pub grid_size: Option<u32>,
}

impl InfoSummary {
    /// One-line status readout, e.g. `seed: 42 | total bubbles: 7`.
    ///
    /// String seeds are printed without quotes; other JSON values are
    /// printed in their JSON form.
    pub fn readout(&self) -> String {
        let seed = match &self.seed {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("seed: {seed} | total bubbles: {}", self.total_bubbles)
    }
}

/// Raw bubble payload as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BubblePayload {
    /// Bubble identifier; empty on configuration frames.
    #[serde(default)]
    pub id: String,
    /// Current cell; may be omitted on finished updates.
    #[serde(default)]
    pub pos: Option<Position>,
    /// Presentation category, `common` when omitted.
    #[serde(default)]
    pub rarity: Rarity,
    /// Whether the bubble is drawn as invisible.
    #[serde(default)]
    pub is_invisible: bool,
    /// Whether the bubble has ceased to exist.
    #[serde(default)]
    pub is_finish: bool,
}

/// One decoded stream frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Server session summary.
    #[serde(default)]
    pub info: Option<InfoSummary>,
    /// Bubble payload, absent on configuration frames.
    #[serde(default)]
    pub bubble: Option<BubblePayload>,
}

impl StreamMessage {
    /// Decode a frame from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the text is not a
    /// valid frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The entity update carried by this frame, if any.
    ///
    /// Returns `Ok(None)` for configuration frames (no bubble, or a bubble
    /// with an empty id).
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::MissingPosition`] for a live bubble payload
    /// without a `pos`.
    pub fn entity_update(&self) -> Result<Option<EntityUpdate>, MessageError> {
        let Some(payload) = self.bubble.as_ref().filter(|b| !b.id.is_empty()) else {
            return Ok(None);
        };
        let id = BubbleId::new(payload.id.clone());
        if payload.is_finish {
            return Ok(Some(EntityUpdate::Finish(id)));
        }
        let position = payload.pos.ok_or_else(|| MessageError::MissingPosition {
            id: payload.id.clone(),
        })?;
        Ok(Some(EntityUpdate::Upsert(BubbleState {
            id,
            position,
            rarity: payload.rarity.clone(),
            is_invisible: payload.is_invisible,
        })))
    }
}

/// Response body of `GET api/activity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Time of the last server activity, in milliseconds since the Unix epoch.
    pub last_activity: i64,
}

impl ActivityResponse {
    /// The activity time as a UTC timestamp.
    ///
    /// Returns `None` if the millisecond value is out of chrono's range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_activity)
    }
}
