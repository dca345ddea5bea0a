//! A single window's rendering state within one [`crate::layout::Layout`].

use crate::backend::ImageHandle;
use crate::geometry::{Rect, Region};
use crate::window_model::{WindowFlags, WindowId};

/// Stable cross-frame identity plus the rank linkage the layout manager
/// maintains between consecutive frames. Two layers with equal `key` across
/// adjacent layouts are considered the same window for damage/alignment
/// purposes.
pub type LayerKey = WindowId;

/// One window's full visual and geometric state for one frame, as produced by
/// [`crate::layout::LayoutManager::append_layout`] and consumed by
/// [`crate::command_builder::CommandBuilder`].
#[derive(Debug, Clone)]
pub struct Layer {
    pub key: LayerKey,

    pub window_origin: (i32, i32),
    pub window_size: (u32, u32),
    /// `(left, right, top, bottom)` inset of the frame/border from the
    /// window's outer edges, used to carve the frame region out of the body.
    pub frame_extents: (i32, i32, i32, i32),
    pub shadow_origin: (i32, i32),
    pub shadow_size: (u32, u32),
    pub crop: Option<Rect>,
    pub scale: (f64, f64),
    pub shadow_scale: (f64, f64),

    pub opacity: f64,
    pub frame_opacity: f64,
    pub blur_opacity: f64,
    pub shadow_opacity: f64,
    pub dim: f64,
    pub corner_radius: f64,
    pub border_width: i32,
    pub color_inverted: bool,
    pub max_brightness: f64,

    pub flags: WindowFlags,

    pub bounding_shape: Region,
    pub monitor: Option<usize>,

    pub content_image: Option<ImageHandle>,
    pub mask_image: Option<ImageHandle>,
    pub shadow_image: Option<ImageHandle>,
    pub saved_image: Option<ImageHandle>,
    pub saved_blend: f64,

    /// Rank of this layer's counterpart in the previous layout, or `-1`.
    pub prev_rank: i32,
    /// Rank of this layer's counterpart in the next layout, or `-1`.
    pub next_rank: i32,

    /// Per-frame damage contributed by this window, in screen coordinates.
    pub damaged: Region,

    /// Filled in by the command builder once commands for this layer have
    /// been emitted.
    pub number_of_commands: usize,
}

impl Layer {
    pub fn window_rect(&self) -> Rect {
        Rect::new(
            self.window_origin.0,
            self.window_origin.1,
            self.window_size.0,
            self.window_size.1,
        )
    }

    pub fn shadow_rect(&self) -> Rect {
        Rect::new(
            self.shadow_origin.0,
            self.shadow_origin.1,
            self.shadow_size.0,
            self.shadow_size.1,
        )
    }

    /// The window's frame/border area: its outer rect minus the inset
    /// client rect described by `frame_extents`.
    pub fn frame_region(&self) -> Region {
        let outer = self.window_rect();
        let (left, right, top, bottom) = self.frame_extents;
        let inner_width = (outer.width as i32 - left - right).max(0) as u32;
        let inner_height = (outer.height as i32 - top - bottom).max(0) as u32;
        let inner = Rect::new(outer.x + left, outer.y + top, inner_width, inner_height);
        Region::from_rect(outer).subtract_rect(inner)
    }

    pub fn has_shadow(&self) -> bool {
        self.flags.contains(WindowFlags::SHADOW) && self.shadow_opacity > 0.0
    }

    pub fn has_blur(&self) -> bool {
        self.flags.contains(WindowFlags::BLUR_BACKGROUND) && self.blur_opacity > 0.0
    }
}
