//! Integer identifiers for page entities and the counters that mint them.
//!
//! Ids are never reused within a session: counters only grow, and a
//! restored snapshot raises them past every id it contains.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifies a panel; shown to the user through its 1-based page index instead.
    PanelId
);
entity_id!(
    /// Identifies a row of the page.
    RowId
);
entity_id!(
    /// Identifies a speech, thought, or SFX bubble.
    BubbleId
);
entity_id!(
    /// Identifies an overlay (effect image) layer.
    OverlayId
);

// ─── Counters ────────────────────────────────────────────────────────────

/// Monotonic id counters. Each `next_*` call returns a fresh id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdCounters {
    pub panel: u32,
    pub row: u32,
    pub bubble: u32,
    pub overlay: u32,
}

impl IdCounters {
    pub fn next_panel(&mut self) -> PanelId {
        self.panel += 1;
        PanelId(self.panel)
    }

    pub fn next_row(&mut self) -> RowId {
        self.row += 1;
        RowId(self.row)
    }

    pub fn next_bubble(&mut self) -> BubbleId {
        self.bubble += 1;
        BubbleId(self.bubble)
    }

    pub fn next_overlay(&mut self) -> OverlayId {
        self.overlay += 1;
        OverlayId(self.overlay)
    }

    /// Raise every counter to at least the matching field of `seen`.
    ///
    /// Used after a restore so that stale saved counters cannot hand out
    /// an id that already exists on the page.
    pub fn raise_to(&mut self, seen: &IdCounters) {
        self.panel = self.panel.max(seen.panel);
        self.row = self.row.max(seen.row);
        self.bubble = self.bubble.max(seen.bubble);
        self.overlay = self.overlay.max(seen.overlay);
    }
}

// ─── Layer ids ───────────────────────────────────────────────────────────

/// Addresses one layer of a panel's stack.
///
/// The string form (`img-3`, `overlay-7`, `bubble-12`) is what the UI and
/// the snapshot use; it round-trips through `Display` / `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerId {
    Image(PanelId),
    Overlay(OverlayId),
    Bubble(BubbleId),
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerId::Image(id) => write!(f, "img-{id}"),
            LayerId::Overlay(id) => write!(f, "overlay-{id}"),
            LayerId::Bubble(id) => write!(f, "bubble-{id}"),
        }
    }
}

impl FromStr for LayerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, num) = s
            .rsplit_once('-')
            .ok_or_else(|| format!("malformed layer id `{s}`"))?;
        let n: u32 = num
            .parse()
            .map_err(|_| format!("malformed layer id `{s}`"))?;
        match prefix {
            "img" => Ok(LayerId::Image(PanelId(n))),
            "overlay" => Ok(LayerId::Overlay(OverlayId(n))),
            "bubble" => Ok(LayerId::Bubble(BubbleId(n))),
            _ => Err(format!("unknown layer kind `{prefix}`")),
        }
    }
}

impl Serialize for LayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
