//! The `WindowModel` capability: per-frame window stacking state the core
//! reads to build a [`crate::layer::Layer`] per visible window.
//!
//! The embedding application owns window lifecycle, X property tracking, and
//! image allocation; this crate only reads a per-frame snapshot through this
//! trait.

use crate::backend::ImageHandle;
use crate::geometry::{Rect, Region};

bitflags::bitflags! {
    /// Per-window behavior flags read by the command builder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowFlags: u32 {
        const SHADOW = 1 << 0;
        const BLUR_BACKGROUND = 1 << 1;
        const FULL_SHADOW = 1 << 2;
        const CLIP_SHADOW_ABOVE = 1 << 3;
        const TRANSPARENT_CLIPPING = 1 << 4;
        /// Forces a blended (non-opaque) composite regardless of opacity.
        const FORCE_BLEND = 1 << 5;
        /// Window mode is `WMODE_TRANS`: the body itself has transparent
        /// pixels even at opacity 1.
        const WMODE_TRANS = 1 << 6;
        /// Window mode is `WMODE_FRAME_TRANS`: only the frame is translucent.
        const WMODE_FRAME_TRANS = 1 << 7;
    }
}

/// Stable cross-frame identity for a window. `generation` is bumped whenever
/// an `id` is recycled by the window manager, so a stale [`crate::layer::Layer`]
/// referencing an old generation never aliases a new window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId {
    pub id: u64,
    pub generation: u32,
}

/// Shadow geometry offset/size relative to the window origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShadowGeometry {
    pub dx: i32,
    pub dy: i32,
    pub width: u32,
    pub height: u32,
}

/// One window's full per-frame state, as read from the window model during
/// [`crate::layout::LayoutManager::append_layout`].
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub key: WindowId,
    pub mapped: bool,

    pub geometry: Rect,
    pub border_width: i32,
    pub frame_extents: (i32, i32, i32, i32),

    pub opacity: f64,
    pub frame_opacity: f64,
    pub blur_opacity: f64,
    pub shadow_opacity: f64,
    pub dim: f64,

    pub shadow: ShadowGeometry,
    pub corner_radius: f64,
    pub max_brightness: f64,
    pub color_inverted: bool,

    pub bounding_shape: Region,
    pub damage: Region,
    pub monitor: Option<usize>,

    pub content_image: Option<ImageHandle>,
    pub mask_image: Option<ImageHandle>,
    pub shadow_image: Option<ImageHandle>,
    pub saved_image: Option<ImageHandle>,
    pub saved_blend: f64,

    pub scale: (f64, f64),
    pub shadow_scale: (f64, f64),
    pub crop: Option<Rect>,

    pub flags: WindowFlags,
}

impl WindowInfo {
    /// Visibility per §4.2 step 1: mapped, has a content image, has some
    /// visible opacity, and its scaled geometry intersects the screen and its
    /// crop.
    pub fn is_visible(&self, screen: Rect) -> bool {
        if !self.mapped || self.content_image.is_none() {
            return false;
        }
        if self.opacity <= 0.0 && self.blur_opacity <= 0.0 {
            return false;
        }
        let scaled = self
            .geometry
            .scale_around_origin(self.scale.0, self.scale.1, self.geometry.x, self.geometry.y);
        if !scaled.intersects(&screen) {
            return false;
        }
        if let Some(crop) = self.crop {
            if !scaled.intersects(&crop) {
                return false;
            }
        }
        true
    }

    pub fn shadow_rect(&self) -> Rect {
        Rect::new(
            self.geometry.x + self.shadow.dx,
            self.geometry.y + self.shadow.dy,
            self.shadow.width,
            self.shadow.height,
        )
    }
}

/// The window stacking capability consumed by [`crate::layout::LayoutManager`].
pub trait WindowModel {
    /// Current screen (root window) size.
    fn screen_size(&self) -> (u32, u32);

    /// Monotone counter bumped whenever the root image is replaced (e.g. a
    /// resolution change); the damage engine treats any change as a reason
    /// to mark the full screen damaged.
    fn root_image_generation(&self) -> u64;

    /// Stacking order, bottom to top.
    fn stacking_order(&self) -> &[WindowInfo];

    fn monitor_region(&self, monitor: usize) -> Option<Region>;
}
