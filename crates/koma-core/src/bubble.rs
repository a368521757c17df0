//! Speech, thought, and SFX bubbles.
//!
//! Bubble geometry is stored as percentages of the owning panel's box and
//! turned into pixels only against a concrete box, so the same bubble lands
//! in the same relative spot in the live view and in an export of any size.

use crate::color::Color;
use crate::id::BubbleId;
use crate::model::PixelBox;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Smallest pixel size a pointer resize may shrink a bubble to.
pub const MIN_BUBBLE_WIDTH: f32 = 60.0;
pub const MIN_BUBBLE_HEIGHT: f32 = 32.0;

// ─── Style enums ─────────────────────────────────────────────────────────

macro_rules! keyword_enum {
    ($name:ident { $($variant:ident => $kw:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $kw),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($kw => Ok($name::$variant),)+
                    _ => Err(format!(concat!("unknown ", stringify!($name), " `{}`"), s)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleKind {
    #[default]
    Speech,
    Thought,
    Sfx,
}

keyword_enum!(BubbleKind {
    Speech => "speech",
    Thought => "thought",
    Sfx => "sfx",
});

/// Where the tail points. Thought bubbles render it as a trail of dots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TailDir {
    #[default]
    BottomLeft,
    BottomCenter,
    BottomRight,
    TopLeft,
    TopCenter,
    TopRight,
    Left,
    Right,
    None,
}

keyword_enum!(TailDir {
    BottomLeft => "bottom-left",
    BottomCenter => "bottom-center",
    BottomRight => "bottom-right",
    TopLeft => "top-left",
    TopCenter => "top-center",
    TopRight => "top-right",
    Left => "left",
    Right => "right",
    None => "none",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleShape {
    #[default]
    Oval,
    Rectangle,
    Parallelogram,
    Cloud,
    Spike,
}

keyword_enum!(BubbleShape {
    Oval => "oval",
    Rectangle => "rectangle",
    Parallelogram => "parallelogram",
    Cloud => "cloud",
    Spike => "spike",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Double,
    None,
}

keyword_enum!(BorderStyle {
    Solid => "solid",
    Dashed => "dashed",
    Dotted => "dotted",
    Double => "double",
    None => "none",
});

impl BorderStyle {
    /// Dash pattern (on, off) in pixels, or `None` for a continuous line.
    pub fn dashes(&self) -> Option<[f64; 2]> {
        match self {
            BorderStyle::Dashed => Some([6.0, 4.0]),
            BorderStyle::Dotted => Some([2.0, 3.0]),
            _ => None,
        }
    }
}

// ─── Bubble ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bubble {
    pub id: BubbleId,
    #[serde(rename = "type")]
    pub kind: BubbleKind,
    pub text: String,
    pub x_pct: f32,
    pub y_pct: f32,
    pub w_pct: f32,
    pub h_pct: f32,
    pub font_size: f32,
    pub tail: TailDir,
    pub fill_color: Color,
    pub text_color: Color,
    pub stroke_color: Color,
    pub shape: BubbleShape,
    pub border_style: BorderStyle,
}

impl Bubble {
    /// A bubble seeded with the defaults for its kind.
    pub fn new(id: BubbleId, kind: BubbleKind) -> Self {
        let thought = kind == BubbleKind::Thought;
        let sfx = kind == BubbleKind::Sfx;
        Self {
            id,
            kind,
            text: match kind {
                BubbleKind::Speech => "Text",
                BubbleKind::Thought => "...",
                BubbleKind::Sfx => "POW!",
            }
            .to_string(),
            x_pct: 20.0,
            y_pct: 20.0,
            w_pct: 20.0,
            h_pct: 10.0,
            font_size: if sfx { 24.0 } else { 13.0 },
            tail: if sfx { TailDir::None } else { TailDir::BottomLeft },
            fill_color: if sfx {
                Color::rgb(0xff, 0xee, 0x00)
            } else {
                Color::WHITE
            },
            text_color: Color::BLACK,
            stroke_color: if thought {
                Color::rgb(0x44, 0x44, 0x44)
            } else {
                Color::BLACK
            },
            shape: if thought {
                BubbleShape::Cloud
            } else {
                BubbleShape::Oval
            },
            border_style: if thought {
                BorderStyle::Dashed
            } else {
                BorderStyle::Solid
            },
        }
    }

    /// Page-space pixel box against the panel's pixel box.
    pub fn pixel_rect(&self, panel: &PixelBox) -> PixelBox {
        let local = self.local_rect(panel.width, panel.height);
        PixelBox::new(panel.x + local.x, panel.y + local.y, local.width, local.height)
    }

    /// Pixel box relative to the panel's top-left corner.
    pub fn local_rect(&self, panel_width: f32, panel_height: f32) -> PixelBox {
        PixelBox::new(
            self.x_pct / 100.0 * panel_width,
            self.y_pct / 100.0 * panel_height,
            self.w_pct / 100.0 * panel_width,
            self.h_pct / 100.0 * panel_height,
        )
    }

    /// Store a panel-relative pixel box back as percentages.
    /// Ignored for a degenerate panel.
    pub fn set_local_rect(&mut self, rect: PixelBox, panel_width: f32, panel_height: f32) {
        if panel_width <= 0.0 || panel_height <= 0.0 {
            return;
        }
        self.x_pct = rect.x / panel_width * 100.0;
        self.y_pct = rect.y / panel_height * 100.0;
        self.w_pct = rect.width / panel_width * 100.0;
        self.h_pct = rect.height / panel_height * 100.0;
    }

    /// Move so the box that was at `start` is offset by `(dx, dy)`,
    /// keeping it inside the panel.
    pub fn drag_from(&mut self, start: PixelBox, dx: f32, dy: f32, panel_width: f32, panel_height: f32) {
        let x = (start.x + dx).min(panel_width - start.width).max(0.0);
        let y = (start.y + dy).min(panel_height - start.height).max(0.0);
        self.set_local_rect(
            PixelBox::new(x, y, start.width, start.height),
            panel_width,
            panel_height,
        );
    }

    /// Grow or shrink the box that was `start` by `(dx, dy)`. The far edges
    /// stop at the panel; the size never drops below the minimum.
    pub fn resize_from(&mut self, start: PixelBox, dx: f32, dy: f32, panel_width: f32, panel_height: f32) {
        let w = (start.width + dx)
            .min(panel_width - start.x)
            .max(MIN_BUBBLE_WIDTH);
        let h = (start.height + dy)
            .min(panel_height - start.y)
            .max(MIN_BUBBLE_HEIGHT);
        self.set_local_rect(
            PixelBox::new(start.x, start.y, w, h),
            panel_width,
            panel_height,
        );
    }

    /// Whether the bubble's box lies within the panel (0–100 % on both axes).
    pub fn fits_panel(&self) -> bool {
        const EPS: f32 = 0.01;
        self.x_pct >= -EPS
            && self.y_pct >= -EPS
            && self.x_pct + self.w_pct <= 100.0 + EPS
            && self.y_pct + self.h_pct <= 100.0 + EPS
    }
}
