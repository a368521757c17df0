//! Per-panel layer stack.
//!
//! `Panel::layers` is the only store of a panel's bubbles and overlays.
//! Flat bubble and overlay lists are read-only projections produced by
//! [`Panel::views`]. Exactly one image layer exists and it always holds the
//! lowest z-index (0); every other layer sits at z ≥ 1.

use crate::bubble::Bubble;
use crate::error::EditError;
use crate::id::{BubbleId, LayerId, OverlayId};
use crate::model::{BlendMode, Layer, LayerContent, Overlay, Panel};
use serde::Serialize;

/// Flat, z-ordered projections of a panel's overlays and bubbles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerViews<'a> {
    pub overlays: Vec<&'a Overlay>,
    pub bubbles: Vec<&'a Bubble>,
}

impl Panel {
    /// Repair the stack so it satisfies the layer invariants, then sort it
    /// by z-index. Calling this on a valid stack changes nothing.
    pub fn initialize_layers(&mut self) {
        let mut seen_image = false;
        let before = self.layers.len();
        self.layers.retain(|l| {
            if l.is_image() {
                if seen_image {
                    return false;
                }
                seen_image = true;
            }
            true
        });
        if self.layers.len() != before {
            log::warn!("panel {}: dropped duplicate image layers", self.id);
        }
        if !seen_image {
            self.layers.insert(
                0,
                Layer {
                    z_index: 0,
                    content: LayerContent::Image,
                },
            );
        }

        let lowest = self
            .layers
            .iter()
            .filter(|l| !l.is_image())
            .map(|l| l.z_index)
            .min();
        let shift = match lowest {
            Some(z) if z < 1 => 1 - z,
            _ => 0,
        };
        for layer in &mut self.layers {
            if layer.is_image() {
                layer.z_index = 0;
            } else {
                layer.z_index += shift;
            }
        }
        self.sort_layers();
    }

    fn sort_layers(&mut self) {
        self.layers.sort_by_key(|l| l.z_index);
    }

    /// Highest z-index in the stack.
    pub fn top_z(&self) -> i32 {
        self.layers.iter().map(|l| l.z_index).max().unwrap_or(0)
    }

    /// Layer ids bottom to top.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id(self.id)).collect()
    }

    fn layer_index(&self, id: LayerId) -> Result<usize, EditError> {
        self.layers
            .iter()
            .position(|l| l.id(self.id) == id)
            .ok_or(EditError::LayerNotFound(id))
    }

    fn push_layer(&mut self, content: LayerContent) {
        self.initialize_layers();
        let z_index = self.top_z() + 1;
        self.layers.push(Layer { z_index, content });
    }

    // ─── Entities ────────────────────────────────────────────────────────

    /// Add an overlay on top of the stack.
    pub fn push_overlay(&mut self, overlay: Overlay) {
        self.push_layer(LayerContent::Overlay(overlay));
    }

    /// Add a bubble on top of the stack.
    pub fn push_bubble(&mut self, bubble: Bubble) {
        self.push_layer(LayerContent::Bubble(bubble));
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Result<Overlay, EditError> {
        let idx = self
            .layer_index(LayerId::Overlay(id))
            .map_err(|_| EditError::OverlayNotFound(id))?;
        match self.layers.remove(idx).content {
            LayerContent::Overlay(o) => Ok(o),
            _ => Err(EditError::OverlayNotFound(id)),
        }
    }

    pub fn remove_bubble(&mut self, id: BubbleId) -> Result<Bubble, EditError> {
        let idx = self
            .layer_index(LayerId::Bubble(id))
            .map_err(|_| EditError::BubbleNotFound(id))?;
        match self.layers.remove(idx).content {
            LayerContent::Bubble(b) => Ok(b),
            _ => Err(EditError::BubbleNotFound(id)),
        }
    }

    pub fn overlays(&self) -> impl Iterator<Item = &Overlay> {
        self.layers.iter().filter_map(|l| match &l.content {
            LayerContent::Overlay(o) => Some(o),
            _ => None,
        })
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.layers.iter().filter_map(|l| match &l.content {
            LayerContent::Bubble(b) => Some(b),
            _ => None,
        })
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays().find(|o| o.id == id)
    }

    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.layers.iter_mut().find_map(|l| match &mut l.content {
            LayerContent::Overlay(o) if o.id == id => Some(o),
            _ => None,
        })
    }

    pub fn bubble(&self, id: BubbleId) -> Option<&Bubble> {
        self.bubbles().find(|b| b.id == id)
    }

    pub fn bubble_mut(&mut self, id: BubbleId) -> Option<&mut Bubble> {
        self.layers.iter_mut().find_map(|l| match &mut l.content {
            LayerContent::Bubble(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    /// Set an overlay's opacity, clamped to 0.0–1.0.
    pub fn set_overlay_opacity(&mut self, id: OverlayId, opacity: f32) -> Result<(), EditError> {
        if opacity.is_nan() {
            return Err(EditError::InvalidValue {
                field: "opacity",
                value: opacity,
            });
        }
        let overlay = self
            .overlay_mut(id)
            .ok_or(EditError::OverlayNotFound(id))?;
        overlay.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_overlay_blend_mode(&mut self, id: OverlayId, mode: BlendMode) -> Result<(), EditError> {
        let overlay = self
            .overlay_mut(id)
            .ok_or(EditError::OverlayNotFound(id))?;
        overlay.blend_mode = mode;
        Ok(())
    }

    /// Derived flat lists, bottom to top.
    pub fn views(&self) -> LayerViews<'_> {
        LayerViews {
            overlays: self.overlays().collect(),
            bubbles: self.bubbles().collect(),
        }
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    /// Swap places with the layer directly above. Returns `Ok(false)` when
    /// the layer is already on top.
    pub fn move_layer_up(&mut self, id: LayerId) -> Result<bool, EditError> {
        self.initialize_layers();
        let idx = self.layer_index(id)?;
        if self.layers[idx].is_image() {
            return Err(EditError::ImageLayerFixed);
        }
        if idx + 1 >= self.layers.len() {
            return Ok(false);
        }
        self.swap_layers(idx, idx + 1);
        Ok(true)
    }

    /// Swap places with the layer directly below. Returns `Ok(false)` when
    /// the layer below is the image layer.
    pub fn move_layer_down(&mut self, id: LayerId) -> Result<bool, EditError> {
        self.initialize_layers();
        let idx = self.layer_index(id)?;
        if self.layers[idx].is_image() {
            return Err(EditError::ImageLayerFixed);
        }
        if idx == 0 || self.layers[idx - 1].is_image() {
            return Ok(false);
        }
        self.swap_layers(idx - 1, idx);
        Ok(true)
    }

    /// Exchange z-indices of two adjacent layers. Equal z-indices are
    /// disambiguated by exchanging positions as well.
    fn swap_layers(&mut self, lower: usize, upper: usize) {
        let (a, b) = (self.layers[lower].z_index, self.layers[upper].z_index);
        self.layers[lower].z_index = b;
        self.layers[upper].z_index = a;
        if a == b {
            self.layers.swap(lower, upper);
        }
        self.sort_layers();
    }

    /// Assign a z-index directly. Values below 1 are raised to 1 so the
    /// layer stays above the image.
    pub fn set_layer_z(&mut self, id: LayerId, z_index: i32) -> Result<(), EditError> {
        self.initialize_layers();
        let idx = self.layer_index(id)?;
        if self.layers[idx].is_image() {
            return Err(EditError::ImageLayerFixed);
        }
        self.layers[idx].z_index = z_index.max(1);
        self.sort_layers();
        Ok(())
    }

    /// Move the overlay at `from` to `to`, counting overlays bottom to top.
    /// Overlays trade the z slots they already occupy; bubbles in between
    /// keep theirs.
    pub fn reorder_overlay(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        self.initialize_layers();
        let slots: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| matches!(l.content, LayerContent::Overlay(_)))
            .map(|(i, _)| i)
            .collect();
        let len = slots.len();
        for index in [from, to] {
            if index >= len {
                return Err(EditError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }

        let z_slots: Vec<i32> = slots.iter().map(|&i| self.layers[i].z_index).collect();
        let mut contents: Vec<LayerContent> = slots
            .iter()
            .map(|&i| std::mem::replace(&mut self.layers[i].content, LayerContent::Image))
            .collect();
        let moved = contents.remove(from);
        contents.insert(to, moved);

        for ((slot, z_index), content) in slots.iter().zip(z_slots).zip(contents) {
            self.layers[*slot] = Layer { z_index, content };
        }
        self.sort_layers();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubble::BubbleKind;
    use crate::id::PanelId;

    fn panel_with_stack() -> Panel {
        let mut p = Panel::new(PanelId(1), "a.png");
        p.push_overlay(Overlay::new(OverlayId(1), "fx1.png"));
        p.push_bubble(Bubble::new(BubbleId(1), BubbleKind::Speech));
        p.push_overlay(Overlay::new(OverlayId(2), "fx2.png"));
        p
    }

    #[test]
    fn pushes_land_on_top() {
        let p = panel_with_stack();
        assert_eq!(
            p.layer_ids(),
            vec![
                LayerId::Image(PanelId(1)),
                LayerId::Overlay(OverlayId(1)),
                LayerId::Bubble(BubbleId(1)),
                LayerId::Overlay(OverlayId(2)),
            ]
        );
        assert_eq!(p.top_z(), 3);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut p = panel_with_stack();
        p.initialize_layers();
        let once = p.layers.clone();
        p.initialize_layers();
        assert_eq!(p.layers, once);
    }

    #[test]
    fn initialize_repairs_broken_stacks() {
        let mut p = panel_with_stack();
        p.layers.retain(|l| !l.is_image());
        p.layers[0].z_index = -3;
        p.layers.push(Layer {
            z_index: 9,
            content: LayerContent::Image,
        });
        p.layers.push(Layer {
            z_index: 10,
            content: LayerContent::Image,
        });
        p.initialize_layers();
        assert_eq!(p.layers.iter().filter(|l| l.is_image()).count(), 1);
        assert!(p.layers[0].is_image());
        assert_eq!(p.layers[0].z_index, 0);
        assert!(p.layers[1..].iter().all(|l| l.z_index >= 1));
    }

    #[test]
    fn move_down_stops_above_image() {
        let mut p = panel_with_stack();
        let before = p.layers.clone();
        let moved = p.move_layer_down(LayerId::Overlay(OverlayId(1))).unwrap();
        assert!(!moved);
        assert_eq!(p.layers, before);
    }

    #[test]
    fn move_up_and_down_swap_neighbours() {
        let mut p = panel_with_stack();
        assert!(p.move_layer_up(LayerId::Overlay(OverlayId(1))).unwrap());
        assert_eq!(p.layer_ids()[2], LayerId::Overlay(OverlayId(1)));
        assert!(!p.move_layer_up(LayerId::Overlay(OverlayId(2))).unwrap());
        assert!(p.move_layer_down(LayerId::Overlay(OverlayId(2))).unwrap());
        assert_eq!(p.layer_ids()[3], LayerId::Overlay(OverlayId(1)));
    }

    #[test]
    fn image_layer_is_fixed() {
        let mut p = panel_with_stack();
        let img = LayerId::Image(PanelId(1));
        assert_eq!(p.move_layer_up(img), Err(EditError::ImageLayerFixed));
        assert_eq!(p.set_layer_z(img, 5), Err(EditError::ImageLayerFixed));
    }

    #[test]
    fn equal_z_still_swaps() {
        let mut p = panel_with_stack();
        for l in p.layers.iter_mut().skip(1) {
            l.z_index = 1;
        }
        assert!(p.move_layer_up(LayerId::Overlay(OverlayId(1))).unwrap());
        assert_eq!(p.layer_ids()[2], LayerId::Overlay(OverlayId(1)));
    }

    #[test]
    fn set_layer_z_clamps_above_image() {
        let mut p = panel_with_stack();
        p.set_layer_z(LayerId::Overlay(OverlayId(2)), -4).unwrap();
        assert!(p.layers[0].is_image());
        let ov = p
            .layers
            .iter()
            .find(|l| l.id(p.id) == LayerId::Overlay(OverlayId(2)))
            .unwrap();
        assert_eq!(ov.z_index, 1);
    }

    #[test]
    fn reorder_overlays_keeps_bubble_slot() {
        let mut p = panel_with_stack();
        p.reorder_overlay(1, 0).unwrap();
        assert_eq!(
            p.layer_ids(),
            vec![
                LayerId::Image(PanelId(1)),
                LayerId::Overlay(OverlayId(2)),
                LayerId::Bubble(BubbleId(1)),
                LayerId::Overlay(OverlayId(1)),
            ]
        );
        assert_eq!(
            p.reorder_overlay(0, 2),
            Err(EditError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn opacity_clamps() {
        let mut p = panel_with_stack();
        p.set_overlay_opacity(OverlayId(1), 1.7).unwrap();
        assert_eq!(p.overlay(OverlayId(1)).unwrap().opacity, 1.0);
        p.set_overlay_opacity(OverlayId(1), -0.2).unwrap();
        assert_eq!(p.overlay(OverlayId(1)).unwrap().opacity, 0.0);
        assert!(p.set_overlay_opacity(OverlayId(1), f32::NAN).is_err());
        assert_eq!(
            p.set_overlay_opacity(OverlayId(9), 0.5),
            Err(EditError::OverlayNotFound(OverlayId(9)))
        );
    }

    #[test]
    fn views_project_by_kind() {
        let mut p = panel_with_stack();
        let views = p.views();
        assert_eq!(views.overlays.len(), 2);
        assert_eq!(views.bubbles.len(), 1);
        p.remove_bubble(BubbleId(1)).unwrap();
        assert!(p.views().bubbles.is_empty());
        assert_eq!(p.layers.len(), 3);
        assert!(p.remove_bubble(BubbleId(1)).is_err());
    }
}
