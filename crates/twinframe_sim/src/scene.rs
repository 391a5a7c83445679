//! Rectangle scene with ray picking.
//!
//! Positions are physical pixels. A ray cast at a point hits every item
//! whose rectangle contains it; hits come back nearest first.

use serde::{Deserialize, Serialize};
use twinframe_shared::PickItem;

/// One pickable rectangle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneItem {
    /// Identifier reported in picks.
    pub item: PickItem,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Distance from the camera; smaller is nearer.
    #[serde(default)]
    pub depth: f32,
    /// Horizontal speed in pixels per second while auto-animating.
    #[serde(default)]
    pub drift: f32,
}

impl SceneItem {
    /// Whether `point` lies inside the rectangle (right and bottom edges
    /// excluded).
    #[inline]
    #[must_use]
    pub fn contains(&self, point: (f32, f32)) -> bool {
        point.0 >= self.x && point.0 < self.x + self.width && point.1 >= self.y && point.1 < self.y + self.height
    }
}

/// The module's scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    items: Vec<SceneItem>,
    elapsed: f32,
}

impl Scene {
    /// Creates a scene from its items.
    #[must_use]
    pub fn new(items: Vec<SceneItem>) -> Self {
        Self { items, elapsed: 0.0 }
    }

    /// Four rectangles: two overlapping near the origin, one with an item
    /// id above 32 bits, and one drifting in the far corner.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(demo_items())
    }

    /// The items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[SceneItem] {
        &self.items
    }

    /// Seconds of animation applied so far.
    #[inline]
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Casts a ray at `point`. Returns hits nearest first.
    #[must_use]
    pub fn ray_pick(&self, point: (f32, f32)) -> Vec<PickItem> {
        let mut hits: Vec<&SceneItem> = self.items.iter().filter(|item| item.contains(point)).collect();
        hits.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        hits.into_iter().map(|item| item.item).collect()
    }

    /// Moves one item by `offset`. Returns false if it is not in the scene.
    pub fn translate(&mut self, item: PickItem, offset: (f32, f32)) -> bool {
        match self.items.iter_mut().find(|entry| entry.item == item) {
            Some(entry) => {
                entry.x += offset.0;
                entry.y += offset.1;
                true
            }
            None => false,
        }
    }

    /// Advances drifting items by `dt` seconds.
    pub fn animate(&mut self, dt: f32) {
        self.elapsed += dt;
        for item in &mut self.items {
            item.x += item.drift * dt;
        }
    }
}

/// Items of [`Scene::demo`].
#[must_use]
pub fn demo_items() -> Vec<SceneItem> {
    let rect = |bits: u64, x: f32, y: f32, size: f32, depth: f32, drift: f32| SceneItem {
        item: PickItem::new(bits),
        x,
        y,
        width: size,
        height: size,
        depth,
        drift,
    };
    vec![
        rect(7, 0.0, 0.0, 100.0, 1.0, 0.0),
        rect(12, 50.0, 50.0, 100.0, 0.5, 0.0),
        rect((1 << 32) | 13, 300.0, 300.0, 80.0, 2.0, 0.0),
        rect(21, 600.0, 400.0, 50.0, 3.0, 30.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_nearest_first() {
        let scene = Scene::demo();
        assert_eq!(scene.ray_pick((20.0, 40.0)), vec![PickItem::new(7)]);
        assert_eq!(
            scene.ray_pick((75.0, 75.0)),
            vec![PickItem::new(12), PickItem::new(7)]
        );
        assert!(scene.ray_pick((500.0, 10.0)).is_empty());
    }

    #[test]
    fn test_translate_moves_hit_box() {
        let mut scene = Scene::demo();
        assert!(scene.translate(PickItem::new(7), (200.0, 0.0)));
        assert!(scene.ray_pick((20.0, 40.0)).is_empty());
        assert_eq!(scene.ray_pick((220.0, 40.0)), vec![PickItem::new(7)]);
        assert!(!scene.translate(PickItem::new(99), (1.0, 1.0)));
    }

    #[test]
    fn test_animate_only_moves_drifting_items() {
        let mut scene = Scene::demo();
        scene.animate(1.0);
        assert_eq!(scene.items()[0].x, 0.0);
        assert_eq!(scene.items()[3].x, 630.0);
    }
}
