//! Frame-by-frame orchestration: owns intermediate images, drives the
//! command builder and damage engine, and invokes the backend.

use crate::backend::{
    Backend, BlurContextHandle, BlurMethod, Color, ImageFormat, ImageHandle, Size,
};
use crate::command::CommandOp;
use crate::command_builder::{BuildFlags, CommandBuilder};
use crate::damage::DamageEngine;
use crate::error::{RenderError, Result};
use crate::geometry::Region;
use crate::kernel::{gaussian_kernel_std_for_size, Kernel};
use crate::layer::Layer;
use crate::layout::LayoutManager;
use crate::shadow;
use crate::window_model::{WindowFlags, WindowModel};

/// Typed, validated construction parameters for a [`Renderer`], built with
/// [`RendererConfigBuilder`] rather than threaded through positional
/// arguments at every call site.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub shadow_radius: u32,
    pub shadow_color: Color,
    pub dithered_present: bool,
    pub use_damage: bool,
    pub max_buffer_age: usize,
    pub monitor_repaint: bool,
    pub force_blend: bool,
    pub blur_frame: bool,
    pub trace: bool,
}

impl RendererConfig {
    pub fn builder() -> RendererConfigBuilder {
        RendererConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct RendererConfigBuilder {
    shadow_radius: Option<u32>,
    shadow_color: Option<Color>,
    dithered_present: bool,
    use_damage: bool,
    max_buffer_age: Option<usize>,
    monitor_repaint: bool,
    force_blend: bool,
    blur_frame: bool,
    trace: bool,
}

impl RendererConfigBuilder {
    pub fn shadow_radius(mut self, radius: u32) -> Self {
        self.shadow_radius = Some(radius);
        self
    }

    pub fn shadow_color(mut self, color: Color) -> Self {
        self.shadow_color = Some(color);
        self
    }

    pub fn dithered_present(mut self, enabled: bool) -> Self {
        self.dithered_present = enabled;
        self
    }

    pub fn use_damage(mut self, enabled: bool) -> Self {
        self.use_damage = enabled;
        self
    }

    pub fn max_buffer_age(mut self, age: usize) -> Self {
        self.max_buffer_age = Some(age);
        self
    }

    pub fn monitor_repaint(mut self, enabled: bool) -> Self {
        self.monitor_repaint = enabled;
        self
    }

    pub fn force_blend(mut self, enabled: bool) -> Self {
        self.force_blend = enabled;
        self
    }

    pub fn blur_frame(mut self, enabled: bool) -> Self {
        self.blur_frame = enabled;
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn build(self) -> RendererConfig {
        RendererConfig {
            shadow_radius: self.shadow_radius.unwrap_or(20),
            shadow_color: self.shadow_color.unwrap_or(Color::new(0.0, 0.0, 0.0, 0.5)),
            dithered_present: self.dithered_present,
            use_damage: self.use_damage,
            max_buffer_age: self.max_buffer_age.unwrap_or(5),
            monitor_repaint: self.monitor_repaint,
            force_blend: self.force_blend,
            blur_frame: self.blur_frame,
            trace: self.trace,
        }
    }
}

/// Owns the intermediate canvas and kernel state shared across frames, and
/// drives one full render per [`Renderer::render`] call.
pub struct Renderer {
    config: RendererConfig,
    back_image: Option<ImageHandle>,
    screen_size: (u32, u32),
    white_image: Option<ImageHandle>,
    black_image: Option<ImageHandle>,
    shadow_kernel: Kernel,
    blur_context: BlurContextHandle,
    frame_index: usize,
}

impl Renderer {
    pub fn new(backend: &mut dyn Backend, config: RendererConfig) -> Self {
        let shadow_kernel_size = 2 * config.shadow_radius + 1;
        let shadow_kernel = gaussian_kernel_std_for_size(shadow_kernel_size | 1, 0.5 / 256.0);
        let blur_context = backend.create_blur_context(BlurMethod::Gaussian, ImageFormat::Pixmap);

        Self {
            config,
            back_image: None,
            screen_size: (0, 0),
            white_image: None,
            black_image: None,
            shadow_kernel,
            blur_context,
            frame_index: 0,
        }
    }

    fn ensure_back_image(&mut self, backend: &mut dyn Backend, size: (u32, u32)) -> Result<()> {
        if self.screen_size == size && self.back_image.is_some() {
            return Ok(());
        }
        if let Some(old) = self.back_image.take() {
            backend.release_image(old);
        }
        let handle = backend
            .new_image(ImageFormat::Pixmap, Size::new(size.0, size.1))
            .ok_or(RenderError::ImageAllocationFailed {
                format: ImageFormat::Pixmap,
                size,
            })?;
        backend.clear(handle, Color::TRANSPARENT);
        self.back_image = Some(handle);
        self.screen_size = size;
        Ok(())
    }

    fn ensure_reference_images(&mut self, backend: &mut dyn Backend) -> Result<()> {
        if self.white_image.is_none() {
            let handle = backend
                .new_image(ImageFormat::Pixmap, Size::new(1, 1))
                .ok_or(RenderError::ImageAllocationFailed {
                    format: ImageFormat::Pixmap,
                    size: (1, 1),
                })?;
            backend.clear(handle, Color::new(1.0, 1.0, 1.0, 1.0));
            self.white_image = Some(handle);
        }
        if self.black_image.is_none() {
            let handle = backend
                .new_image(ImageFormat::Pixmap, Size::new(1, 1))
                .ok_or(RenderError::ImageAllocationFailed {
                    format: ImageFormat::Pixmap,
                    size: (1, 1),
                })?;
            backend.clear(handle, Color::new(0.0, 0.0, 0.0, 1.0));
            self.black_image = Some(handle);
        }
        Ok(())
    }

    /// The "lazy mask" of §4.5: a 1-bit alpha image of the window's bounding
    /// shape, generated on first need by clearing a MASK image to transparent
    /// and copy-area'ing `white_image` through the shape.
    fn ensure_window_mask(&mut self, backend: &mut dyn Backend, layer: &mut Layer) -> Result<ImageHandle> {
        if let Some(mask) = layer.mask_image {
            return Ok(mask);
        }
        let bounds = layer.window_rect();
        let handle = backend
            .new_image(ImageFormat::Mask, Size::new(bounds.width, bounds.height))
            .ok_or(RenderError::ImageAllocationFailed {
                format: ImageFormat::Mask,
                size: (bounds.width, bounds.height),
            })?;
        backend.clear(handle, Color::TRANSPARENT);
        let local_shape = layer.bounding_shape.translate(-bounds.x, -bounds.y);
        let white = self.white_image.expect("ensure_reference_images ran first");
        backend.copy_area(handle, white, &local_shape);
        layer.mask_image = Some(handle);
        Ok(handle)
    }

    /// The "lazy shadow" of §4.5, dispatched per §4.1 quirks. On a kernel
    /// overflow the window is treated as shadow-less for this frame (logged,
    /// not propagated) rather than aborting the whole render.
    fn ensure_shadow_image(&mut self, backend: &mut dyn Backend, layer: &mut Layer) -> Result<()> {
        if !layer.has_shadow() || layer.shadow_image.is_some() {
            return Ok(());
        }
        let mask = self.ensure_window_mask(backend, layer)?;
        match shadow::build_shadow_image(
            backend,
            mask,
            layer.window_size,
            self.config.shadow_radius,
            self.config.shadow_color,
            layer.corner_radius,
            self.blur_context,
        ) {
            Ok((handle, offset)) => {
                layer.shadow_image = Some(handle);
                layer.shadow_origin = (layer.window_origin.0 + offset.0, layer.window_origin.1 + offset.1);
                layer.shadow_size = (
                    layer.window_size.0.saturating_add((-offset.0) as u32 * 2),
                    layer.window_size.1.saturating_add((-offset.1) as u32 * 2),
                );
            }
            Err(RenderError::ShadowKernelOverflow { requested, limit }) => {
                log::warn!(
                    "shadow kernel of size {requested} exceeds backend limit {limit}; \
                     window {:?} is shadow-less this frame",
                    layer.key
                );
                layer.flags.remove(WindowFlags::SHADOW);
            }
            Err(other) => return Err(other),
        }
        Ok(())
    }

    /// Renders one frame, per §4.5's twelve-step sequence. Returns `false`
    /// (without presenting) on a recoverable failure, per §7's policy that
    /// abandoning a frame must leave all region structures and refcounts
    /// balanced.
    pub fn render(
        &mut self,
        backend: &mut dyn Backend,
        root_image: Option<ImageHandle>,
        layout_manager: &mut LayoutManager,
        builder: &mut CommandBuilder,
        wm: &dyn WindowModel,
        use_fence: bool,
    ) -> Result<bool> {
        let screen_size = wm.screen_size();

        if use_fence {
            backend.trigger_sync_fence();
        }

        if self.ensure_back_image(backend, screen_size).is_err() {
            return Ok(false);
        }
        self.ensure_reference_images(backend)?;

        layout_manager.append_layout(wm);

        {
            let layout = layout_manager.current_layout_mut();
            for layer in layout.layers.iter_mut() {
                self.ensure_shadow_image(backend, layer)?;
            }
        }

        let flags = BuildFlags {
            force_blend: self.config.force_blend,
            blur_frame: self.config.blur_frame,
            trace: self.config.trace,
        };

        let screen_size_u = layout_manager.layout(0).screen_size;
        let mut layers = std::mem::take(&mut layout_manager.current_layout_mut().layers);
        let mut command_list = builder.build(&mut layers, screen_size_u, flags);
        {
            let layout = layout_manager.current_layout_mut();
            layout.layers = layers;
        }

        let root = root_image.unwrap_or(self.black_image.expect("ensured above"));
        if let Some(background) = command_list.commands.get_mut(0) {
            if let CommandOp::CopyArea(copy) = &mut background.op {
                copy.source_image = root;
            }
        }
        layout_manager.current_layout_mut().commands = command_list;

        let buffer_age = backend.buffer_age();
        let damage_engine = DamageEngine::new();
        let blur_size = backend.get_blur_size(self.blur_context);

        let damage = if self.config.use_damage
            && buffer_age >= 1
            && (buffer_age as usize) <= layout_manager.max_buffer_age()
        {
            damage_engine.compute(layout_manager, buffer_age as usize, blur_size)
        } else {
            // age == 0 (unknown), negative (invalid), or beyond max_buffer_age:
            // fall back to a full-screen redraw per §4.5 step 4.
            Region::from_rect(crate::geometry::Rect::new(0, 0, screen_size.0, screen_size.1))
        };

        {
            let layout = layout_manager.current_layout_mut();
            damage_engine.cull(&mut layout.commands, &damage, blur_size);
        }

        let back_image = self.back_image.expect("ensured above");

        if use_fence && !backend.await_sync_fence() {
            backend.invalidate_buffer_ages();
            layout_manager.current_layout_mut().commands.culled.clear();
            return Err(RenderError::ConnectionLost);
        }

        let executed = backend.execute(back_image, &layout_manager.current_layout_mut().commands.commands);
        if !executed {
            layout_manager
                .current_layout_mut()
                .commands
                .culled
                .clear();
            return Err(RenderError::BackendExecutionFailed);
        }

        if self.config.monitor_repaint {
            log::debug!("monitor repaint: tainting {} damage rects", damage.rects().len());
        }

        let back_buffer = backend.back_buffer();
        backend.copy_area_quantize(back_buffer, back_image, &damage);
        backend.present(Some(&damage));

        damage_engine.uncull(&mut layout_manager.current_layout_mut().commands);
        self.frame_index = (self.frame_index + 1) % (layout_manager.max_buffer_age().max(1));

        Ok(true)
    }

    pub fn shadow_kernel(&self) -> &Kernel {
        &self.shadow_kernel
    }
}
