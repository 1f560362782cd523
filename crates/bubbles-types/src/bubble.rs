//! Bubble domain types.
//!
//! A bubble is a short-lived entity that sits in one grid cell at a time.
//! The server reports each bubble's position, rarity, and visibility; the
//! client mirrors the latest report in its entity store.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate on the square grid.
///
/// Rows grow downwards and columns grow to the right, both starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based row index.
    pub row: u32,
    /// Zero-based column index.
    pub column: u32,
}

impl Position {
    /// Create a position from a row and a column.
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Whether this position lies inside a `size x size` grid.
    pub const fn is_within(self, size: u32) -> bool {
        self.row < size && self.column < size
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

// ---------------------------------------------------------------------------
// Rarity
// ---------------------------------------------------------------------------

/// Presentation category of a bubble.
///
/// The server currently emits `common`, `light`, and `dark`. Any other
/// value is kept verbatim so newer servers can introduce categories
/// without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rarity {
    /// The ordinary bubble.
    #[default]
    Common,
    /// A light bubble; clears dark bubbles from the cell it enters.
    Light,
    /// A dark bubble; converts common bubbles it meets.
    Dark,
    /// A category this client does not know about.
    Other(String),
}

impl Rarity {
    /// The wire name of this category.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Common => "common",
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Other(name) => name,
        }
    }

    /// Presentation class list for a bubble node of this rarity.
    ///
    /// Every node carries the base `bubble` class plus a
    /// `bubble-<rarity>` class.
    pub fn presentation_class(&self) -> String {
        format!("bubble bubble-{}", self.as_str())
    }
}

impl From<String> for Rarity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "common" => Self::Common,
            "light" => Self::Light,
            "dark" => Self::Dark,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Rarity {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<Rarity> for String {
    fn from(rarity: Rarity) -> Self {
        match rarity {
            Rarity::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl core::fmt::Display for Rarity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bubble identity and state
// ---------------------------------------------------------------------------

/// Opaque identifier of a bubble, unique among live bubbles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BubbleId(pub String);

impl BubbleId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty (the server's "no bubble" marker).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for BubbleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BubbleId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Last known state of one live bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubbleState {
    /// Stable identifier.
    pub id: BubbleId,
    /// Current grid cell.
    pub position: Position,
    /// Presentation category.
    pub rarity: Rarity,
    /// Whether the bubble is currently drawn as invisible.
    pub is_invisible: bool,
}

/// One incoming change for a single bubble.
///
/// The server's `is_finish` flag becomes the [`Finish`](Self::Finish)
/// variant, so a finished marker can never end up in stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityUpdate {
    /// Create the bubble or replace its state.
    Upsert(BubbleState),
    /// The bubble no longer exists.
    Finish(BubbleId),
}

impl EntityUpdate {
    /// Identifier of the bubble this update targets.
    pub const fn id(&self) -> &BubbleId {
        match self {
            Self::Upsert(state) => &state.id,
            Self::Finish(id) => id,
        }
    }
}
