//! Ring-buffered per-frame window stack snapshots and cross-frame layer
//! identity tracking.

use std::collections::HashMap;

use crate::command::CommandList;
use crate::geometry::Region;
use crate::layer::{Layer, LayerKey};
use crate::window_model::WindowModel;

/// One frame's snapshot: the window stack plus the command stream built from
/// it. `commands` is populated by [`crate::command_builder::CommandBuilder`],
/// not by `append_layout`.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub screen_size: (u32, u32),
    pub root_image_generation: u64,
    pub layers: Vec<Layer>,
    pub commands: CommandList,
}

impl Layout {
    pub fn number_of_commands(&self) -> usize {
        self.commands.len()
    }

    /// Invariant check from §3: the per-layer command counts plus the
    /// background pass must equal the total.
    pub fn check_command_count_invariant(&self) -> bool {
        let layer_total: usize = self.layers.iter().map(|l| l.number_of_commands).sum();
        layer_total + self.commands.first_layer_start == self.commands.len()
    }
}

/// A ring buffer of `max_buffer_age + 1` [`Layout`]s plus a hash index from
/// [`LayerKey`] to that layer's rank in the current layout, maintained
/// incrementally via `prev_rank`/`next_rank` fixups after every append.
pub struct LayoutManager {
    layouts: Vec<Layout>,
    max_buffer_age: usize,
    current: usize,
    /// Maps a layer key present in the *current* layout to its rank.
    index: HashMap<LayerKey, usize>,
}

impl LayoutManager {
    pub fn new(max_buffer_age: usize) -> Self {
        let capacity = max_buffer_age + 1;
        Self {
            layouts: (0..capacity).map(|_| Layout::default()).collect(),
            max_buffer_age,
            current: 0,
            index: HashMap::new(),
        }
    }

    pub fn max_buffer_age(&self) -> usize {
        self.max_buffer_age
    }

    fn slot(&self, age: usize) -> usize {
        let len = self.layouts.len();
        (self.current + len - age) % len
    }

    /// Layout `age` frames ago (`age == 0` is the most recent). Panics
    /// (programmer error, per §7) if `age > max_buffer_age`.
    pub fn layout(&self, age: usize) -> &Layout {
        debug_assert!(
            age <= self.max_buffer_age,
            "layout age {age} exceeds max_buffer_age {}",
            self.max_buffer_age
        );
        &self.layouts[self.slot(age)]
    }

    fn layout_mut(&mut self, age: usize) -> &mut Layout {
        debug_assert!(age <= self.max_buffer_age);
        let slot = self.slot(age);
        &mut self.layouts[slot]
    }

    /// Mutable access to the most recent layout, used by the renderer to
    /// write back the command list [`crate::command_builder::CommandBuilder::build`]
    /// produces from that layout's layers.
    pub fn current_layout_mut(&mut self) -> &mut Layout {
        &mut self.layouts[self.current]
    }

    /// Snapshots `wm`'s current stacking order into a fresh layout, wiring up
    /// `prev_rank`/`next_rank` links against the previous layout via the
    /// cross-frame index. See §4.2.
    pub fn append_layout(&mut self, wm: &dyn WindowModel) {
        let screen_size = wm.screen_size();
        let root_generation = wm.root_image_generation();
        let screen_rect = crate::geometry::Rect::new(0, 0, screen_size.0, screen_size.1);

        let mut new_layers = Vec::new();
        for window in wm.stacking_order() {
            if !window.is_visible(screen_rect) {
                continue;
            }
            let mut layer = build_layer(window);
            if let Some(&prev_idx) = self.index.get(&layer.key) {
                let prev_layout = self.layout_mut(1);
                if let Some(prev_layer) = prev_layout.layers.get_mut(prev_idx) {
                    prev_layer.next_rank = new_layers.len() as i32;
                    layer.prev_rank = prev_idx as i32;
                }
            }
            new_layers.push(layer);
        }

        self.current = (self.current + 1) % self.layouts.len();
        let slot = self.current;
        self.layouts[slot].screen_size = screen_size;
        self.layouts[slot].root_image_generation = root_generation;
        self.layouts[slot].layers = new_layers;
        self.layouts[slot].commands.clear();

        self.rebuild_index();
    }

    /// Walks the index and drops entries whose layer's `next_rank` broke
    /// (window disappeared), remaps survivors to their `next_rank`, and adds
    /// entries for layers that just appeared, per §4.2.
    fn rebuild_index(&mut self) {
        self.index.clear();
        for (rank, layer) in self.layouts[self.current].layers.iter().enumerate() {
            self.index.insert(layer.key, rank);
        }
    }

    /// Follows `prev_rank` links backward through `age` layouts. Returns
    /// `-1` if the chain breaks before reaching `age` steps.
    pub fn layer_prev_rank(&self, age: usize, index: usize) -> i32 {
        let mut rank = index as i32;
        for step in 0..age {
            if rank < 0 {
                return -1;
            }
            let layout = self.layout(step);
            match layout.layers.get(rank as usize) {
                Some(layer) => rank = layer.prev_rank,
                None => return -1,
            }
        }
        rank
    }

    /// Follows `next_rank` links forward through `age` layouts, starting from
    /// the layout `age` frames ago.
    pub fn layer_next_rank(&self, age: usize, index: usize) -> i32 {
        let mut rank = index as i32;
        for step in (1..=age).rev() {
            if rank < 0 {
                return -1;
            }
            let layout = self.layout(step);
            match layout.layers.get(rank as usize) {
                Some(layer) => rank = layer.next_rank,
                None => return -1,
            }
        }
        rank
    }

    /// Unions the `damaged` region of layer `index` in the current layout and
    /// its `age-1` predecessors into `out`. The predecessor chain must be
    /// intact for `age` steps; callers that cannot guarantee this should fall
    /// back to full-screen damage instead of calling this.
    pub fn collect_window_damage(&self, index: usize, age: usize, out: &mut Region) {
        let mut rank = index as i32;
        for step in 0..age {
            if rank < 0 {
                return;
            }
            let layout = self.layout(step);
            let layer = match layout.layers.get(rank as usize) {
                Some(l) => l,
                None => return,
            };
            out.union(&layer.damaged);
            rank = layer.prev_rank;
        }
    }
}

fn build_layer(window: &crate::window_model::WindowInfo) -> Layer {
    Layer {
        key: window.key,
        window_origin: (window.geometry.x, window.geometry.y),
        window_size: (window.geometry.width, window.geometry.height),
        frame_extents: window.frame_extents,
        shadow_origin: (
            window.geometry.x + window.shadow.dx,
            window.geometry.y + window.shadow.dy,
        ),
        shadow_size: (window.shadow.width, window.shadow.height),
        crop: window.crop,
        scale: window.scale,
        shadow_scale: window.shadow_scale,
        opacity: window.opacity,
        frame_opacity: window.frame_opacity,
        blur_opacity: window.blur_opacity,
        shadow_opacity: window.shadow_opacity,
        dim: window.dim,
        corner_radius: window.corner_radius,
        border_width: window.border_width,
        color_inverted: window.color_inverted,
        max_brightness: window.max_brightness,
        flags: window.flags,
        bounding_shape: window.bounding_shape.clone(),
        monitor: window.monitor,
        content_image: window.content_image,
        mask_image: window.mask_image,
        shadow_image: window.shadow_image,
        saved_image: window.saved_image,
        saved_blend: window.saved_blend,
        prev_rank: -1,
        next_rank: -1,
        damaged: window.damage.clone(),
        number_of_commands: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FixtureWindowModel;

    #[test]
    fn append_layout_links_same_window_across_frames() {
        let mut lm = LayoutManager::new(2);
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 100, 100, 200, 200);
        lm.append_layout(&wm);
        lm.append_layout(&wm);

        assert_eq!(lm.layout(0).layers.len(), 1);
        let layer = &lm.layout(0).layers[0];
        assert_eq!(layer.prev_rank, 0);
        assert_eq!(lm.layout(1).layers[0].next_rank, 0);
    }

    #[test]
    fn disappearing_window_breaks_the_chain() {
        let mut lm = LayoutManager::new(2);
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 100, 100, 200, 200);
        lm.append_layout(&wm);
        wm.remove_window(1);
        lm.append_layout(&wm);

        assert_eq!(lm.layout(0).layers.len(), 0);
        assert_eq!(lm.layout(1).layers[0].next_rank, -1);
    }

    #[test]
    fn layer_prev_rank_follows_chain_back() {
        let mut lm = LayoutManager::new(2);
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 0, 0, 10, 10);
        lm.append_layout(&wm);
        lm.append_layout(&wm);
        lm.append_layout(&wm);

        assert_eq!(lm.layer_prev_rank(2, 0), 0);
    }

    #[test]
    fn collect_window_damage_unions_predecessor_chain() {
        let mut lm = LayoutManager::new(2);
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 0, 0, 10, 10);
        lm.append_layout(&wm);
        wm.damage_window(1, crate::geometry::Rect::new(0, 0, 5, 5));
        lm.append_layout(&wm);

        let mut out = Region::empty();
        lm.collect_window_damage(0, 1, &mut out);
        assert!(!out.is_empty());
    }
}
