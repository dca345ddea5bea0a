//! The `Backend` capability: the drawing surface the rendering core targets.
//!
//! A backend is supplied by the embedding application (GPU or software,
//! X11-bound or a test double). This module only defines the contract;
//! concrete backends, the X connection, and the event loop live outside this
//! crate entirely.

use crate::command::Command;
use crate::error::Result;
use crate::geometry::Region;

/// Opaque handle to an image owned by a backend. Equality/ordering are
/// identity comparisons only — handles carry no meaning outside the backend
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

/// Opaque handle to a blur context created by [`Backend::create_blur_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlurContextHandle(pub u64);

/// Image pixel format requested from `new_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Standard 8-bit-per-channel RGBA.
    Pixmap,
    /// Higher bit depth, used for dithered / HDR-ish intermediate targets.
    PixmapHigh,
    /// 1-bit (or 8-bit alpha-only) mask image.
    Mask,
}

/// Blur algorithm requested from `create_blur_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurMethod {
    None,
    Kernel,
    Gaussian,
    Box,
    DualKawase,
}

bitflags::bitflags! {
    /// Backend capability/behavior flags reported by [`Backend::quirks`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Quirks: u32 {
        /// Hardware blur is unavailable or prohibitively slow; the shadow
        /// kernel services should use the summed-area software path instead
        /// of the blurred-mask path.
        const SLOW_BLUR = 1 << 0;
    }
}

/// RGBA color, each channel in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// A 2-D pixel size. Both components are expected to be positive when passed
/// to `new_image`; a backend is free to reject degenerate requests with a
/// null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Arguments shared by `blit`/`blur` calls beyond the target region: where to
/// sample from, and under what mask.
#[derive(Debug, Clone)]
pub struct BlitArgs {
    pub source_image: ImageHandle,
    pub source_mask: Option<ImageHandle>,
    pub opacity: f64,
    pub dim: f64,
    pub corner_radius: f64,
    pub border_width: i32,
    pub scale: (f64, f64),
    pub color_inverted: bool,
    pub max_brightness: f64,
}

#[derive(Debug, Clone)]
pub struct BlurArgs {
    pub blur_context: BlurContextHandle,
    pub source_image: ImageHandle,
    pub source_mask: Option<ImageHandle>,
    pub opacity: f64,
}

/// The drawing surface capability consumed by [`crate::renderer::Renderer`].
///
/// Every operation is synchronous from the core's point of view: the core
/// issues calls in program order and expects the backend to preserve that
/// order against each target image (§5 of the design). A backend may be
/// backed by a GPU command queue, software rasterizer, or (for tests) an
/// in-memory recorder — see [`crate::testkit`].
pub trait Backend {
    /// Allocates a new image. Returns `None` on allocation failure (the core
    /// maps this to [`crate::error::RenderError::ImageAllocationFailed`]).
    fn new_image(&mut self, format: ImageFormat, size: Size) -> Option<ImageHandle>;

    fn clear(&mut self, image: ImageHandle, color: Color);

    fn blit(&mut self, dst: ImageHandle, origin: (i32, i32), mask: &Region, args: &BlitArgs);

    fn blur(&mut self, dst: ImageHandle, origin: (i32, i32), mask: &Region, args: &BlurArgs);

    fn fill(&mut self, dst: ImageHandle, color: Color, region: &Region);

    fn copy_area(&mut self, dst: ImageHandle, src: ImageHandle, region: &Region);

    /// Like `copy_area`, but applies dithering when downshifting from
    /// `PIXMAP_HIGH` to `PIXMAP`.
    fn copy_area_quantize(&mut self, dst: ImageHandle, src: ImageHandle, region: &Region);

    fn release_image(&mut self, image: ImageHandle);

    /// Frames since the back buffer returned by [`Backend::back_buffer`] last
    /// held valid contents. `0` if unknown, `-1` if invalid (forces a full
    /// redraw).
    fn buffer_age(&self) -> i32;

    fn back_buffer(&self) -> ImageHandle;

    /// Executes the given command stream against `target`. Returns `false`
    /// on execution failure.
    fn execute(&mut self, target: ImageHandle, commands: &[Command]) -> bool;

    /// Presents the back buffer. `region` restricts the swap to a sub-area
    /// when the backend supports partial presentation.
    fn present(&mut self, region: Option<&Region>);

    fn create_blur_context(&mut self, method: BlurMethod, format: ImageFormat) -> BlurContextHandle;

    /// The pixel radius a blur context expands damage by on each side.
    fn get_blur_size(&self, ctx: BlurContextHandle) -> (u32, u32);

    fn quirks(&self) -> Quirks;

    /// Largest image dimension the backend can service in a single request
    /// (e.g. an X server's maximum request length translated to pixels).
    /// The software shadow path checks its padded canvas against this before
    /// building, reporting [`crate::error::RenderError::ShadowKernelOverflow`]
    /// rather than handing the backend an allocation it cannot satisfy.
    fn max_request_image_size(&self) -> u32;

    /// Uploads a CPU-rendered 8-bit alpha mask into `image`, replacing its
    /// contents. Used by the summed-area software shadow path to hand its
    /// buffer to backend-owned storage instead of drawing it via blits.
    fn upload_alpha_mask(&mut self, image: ImageHandle, mask: &image::GrayImage);

    /// Non-blocking: asks the backend to trigger its X-sync fence, if one is
    /// in use this frame. A no-op for backends without fence support.
    fn trigger_sync_fence(&mut self) {}

    /// Blocks until the fence triggered by [`Backend::trigger_sync_fence`]
    /// signals, or until the backend detects the connection is gone. Returns
    /// `false` on connection loss. Backends without fence support return
    /// `true` unconditionally.
    fn await_sync_fence(&mut self) -> bool {
        true
    }

    /// Marks both back buffers' ages as invalid (`-1`), forcing a full
    /// redraw next frame. Called after a fence await reports connection
    /// loss.
    fn invalidate_buffer_ages(&mut self) {}
}

/// Convenience wrapper translating a `None` allocation into a [`Result`].
pub fn require_image(
    handle: Option<ImageHandle>,
    format: ImageFormat,
    size: Size,
) -> Result<ImageHandle> {
    handle.ok_or(crate::error::RenderError::ImageAllocationFailed {
        format,
        size: (size.width, size.height),
    })
}
