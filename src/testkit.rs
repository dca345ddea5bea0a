//! In-memory [`Backend`] and [`WindowModel`] fakes for exercising the
//! rendering core without a real X11 connection. Available under the
//! `testkit` feature for downstream integration tests, and used unqualified
//! by this crate's own `#[cfg(test)]` modules.

use std::collections::HashMap;

use crate::backend::{
    Backend, BlitArgs, BlurArgs, BlurContextHandle, BlurMethod, Color, ImageFormat, ImageHandle,
    Quirks, Size,
};
use crate::command::Command;
use crate::geometry::{Rect, Region};
use crate::window_model::{ShadowGeometry, WindowFlags, WindowId, WindowInfo, WindowModel};

/// A backend that performs no real drawing but records every call it
/// receives, and issues monotonically increasing opaque handles. Useful for
/// asserting on the shape of the command stream a scenario produces.
pub struct RecordingBackend {
    screen_size: (u32, u32),
    next_handle: u64,
    buffer_age: i32,
    quirks: Quirks,
    fail_next_execute: bool,
    fail_next_fence: bool,
    max_request_image_size: u32,
    pub calls: Vec<String>,
    back_buffer: ImageHandle,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: (width, height),
            next_handle: 1,
            buffer_age: 0,
            quirks: Quirks::empty(),
            fail_next_execute: false,
            fail_next_fence: false,
            max_request_image_size: u32::MAX,
            calls: Vec::new(),
            back_buffer: ImageHandle(0),
        }
    }

    pub fn set_buffer_age(&mut self, age: i32) {
        self.buffer_age = age;
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    pub fn fail_next_execute(&mut self) {
        self.fail_next_execute = true;
    }

    pub fn fail_next_fence(&mut self) {
        self.fail_next_fence = true;
    }

    pub fn set_max_request_image_size(&mut self, limit: u32) {
        self.max_request_image_size = limit;
    }

    fn fresh_handle(&mut self) -> ImageHandle {
        let handle = ImageHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl Backend for RecordingBackend {
    fn new_image(&mut self, format: ImageFormat, size: Size) -> Option<ImageHandle> {
        self.calls.push(format!("new_image({format:?}, {size:?})"));
        if size.width == 0 || size.height == 0 {
            return None;
        }
        Some(self.fresh_handle())
    }

    fn clear(&mut self, image: ImageHandle, _color: Color) {
        self.calls.push(format!("clear({image:?})"));
    }

    fn blit(&mut self, dst: ImageHandle, _origin: (i32, i32), _mask: &Region, _args: &BlitArgs) {
        self.calls.push(format!("blit({dst:?})"));
    }

    fn blur(&mut self, dst: ImageHandle, _origin: (i32, i32), _mask: &Region, _args: &BlurArgs) {
        self.calls.push(format!("blur({dst:?})"));
    }

    fn fill(&mut self, dst: ImageHandle, _color: Color, _region: &Region) {
        self.calls.push(format!("fill({dst:?})"));
    }

    fn copy_area(&mut self, dst: ImageHandle, src: ImageHandle, _region: &Region) {
        self.calls.push(format!("copy_area({dst:?}, {src:?})"));
    }

    fn copy_area_quantize(&mut self, dst: ImageHandle, src: ImageHandle, _region: &Region) {
        self.calls
            .push(format!("copy_area_quantize({dst:?}, {src:?})"));
    }

    fn release_image(&mut self, image: ImageHandle) {
        self.calls.push(format!("release_image({image:?})"));
    }

    fn buffer_age(&self) -> i32 {
        self.buffer_age
    }

    fn back_buffer(&self) -> ImageHandle {
        self.back_buffer
    }

    fn execute(&mut self, target: ImageHandle, commands: &[Command]) -> bool {
        self.calls
            .push(format!("execute({target:?}, {} cmds)", commands.len()));
        if self.fail_next_execute {
            self.fail_next_execute = false;
            return false;
        }
        true
    }

    fn present(&mut self, _region: Option<&Region>) {
        self.calls.push("present".into());
    }

    fn create_blur_context(&mut self, _method: BlurMethod, _format: ImageFormat) -> BlurContextHandle {
        BlurContextHandle(1)
    }

    fn get_blur_size(&self, _ctx: BlurContextHandle) -> (u32, u32) {
        (0, 0)
    }

    fn quirks(&self) -> Quirks {
        self.quirks
    }

    fn max_request_image_size(&self) -> u32 {
        self.max_request_image_size
    }

    fn upload_alpha_mask(&mut self, image: ImageHandle, mask: &image::GrayImage) {
        self.calls
            .push(format!("upload_alpha_mask({image:?}, {}x{})", mask.width(), mask.height()));
    }

    fn trigger_sync_fence(&mut self) {
        self.calls.push("trigger_sync_fence".into());
    }

    fn await_sync_fence(&mut self) -> bool {
        self.calls.push("await_sync_fence".into());
        if self.fail_next_fence {
            self.fail_next_fence = false;
            return false;
        }
        true
    }

    fn invalidate_buffer_ages(&mut self) {
        self.calls.push("invalidate_buffer_ages".into());
        self.buffer_age = -1;
    }
}

/// A builder for a fixed window stack, used to drive [`LayoutManager`] and
/// [`CommandBuilder`] without a live window manager.
///
/// [`LayoutManager`]: crate::layout::LayoutManager
/// [`CommandBuilder`]: crate::command_builder::CommandBuilder
pub struct FixtureWindowModel {
    screen_size: (u32, u32),
    root_generation: u64,
    windows: Vec<WindowInfo>,
    by_id: HashMap<u64, usize>,
    next_content_handle: u64,
}

impl FixtureWindowModel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: (width, height),
            root_generation: 1,
            windows: Vec::new(),
            by_id: HashMap::new(),
            next_content_handle: 1000,
        }
    }

    pub fn bump_root_generation(&mut self) {
        self.root_generation += 1;
    }

    pub fn add_window(&mut self, id: u64, x: i32, y: i32, width: u32, height: u32) {
        let content_handle = ImageHandle(self.next_content_handle);
        self.next_content_handle += 1;
        let rect = Rect::new(x, y, width, height);
        let info = WindowInfo {
            key: WindowId { id, generation: 0 },
            mapped: true,
            geometry: rect,
            border_width: 0,
            frame_extents: (0, 0, 0, 0),
            opacity: 1.0,
            frame_opacity: 1.0,
            blur_opacity: 0.0,
            shadow_opacity: 0.0,
            dim: 0.0,
            shadow: ShadowGeometry::default(),
            corner_radius: 0.0,
            max_brightness: 1.0,
            color_inverted: false,
            bounding_shape: Region::from_rect(rect),
            damage: Region::empty(),
            monitor: None,
            content_image: Some(content_handle),
            mask_image: None,
            shadow_image: None,
            saved_image: None,
            saved_blend: 0.0,
            scale: (1.0, 1.0),
            shadow_scale: (1.0, 1.0),
            crop: None,
            flags: WindowFlags::empty(),
        };
        self.by_id.insert(id, self.windows.len());
        self.windows.push(info);
    }

    pub fn remove_window(&mut self, id: u64) {
        if let Some(idx) = self.by_id.remove(&id) {
            self.windows.remove(idx);
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        for (idx, window) in self.windows.iter().enumerate() {
            self.by_id.insert(window.key.id, idx);
        }
    }

    fn window_mut(&mut self, id: u64) -> &mut WindowInfo {
        let idx = self.by_id[&id];
        &mut self.windows[idx]
    }

    pub fn move_window(&mut self, id: u64, x: i32, y: i32) {
        let window = self.window_mut(id);
        window.geometry.x = x;
        window.geometry.y = y;
        window.bounding_shape = Region::from_rect(window.geometry);
    }

    pub fn set_opacity(&mut self, id: u64, opacity: f64) {
        self.window_mut(id).opacity = opacity;
    }

    pub fn set_blur(&mut self, id: u64, blur_opacity: f64) {
        let window = self.window_mut(id);
        window.blur_opacity = blur_opacity;
        window.flags |= WindowFlags::BLUR_BACKGROUND;
    }

    pub fn enable_shadow(&mut self, id: u64, dx: i32, dy: i32, width: u32, height: u32, opacity: f64) {
        let window = self.window_mut(id);
        window.flags |= WindowFlags::SHADOW;
        window.shadow_opacity = opacity;
        window.shadow = ShadowGeometry {
            dx,
            dy,
            width,
            height,
        };
    }

    pub fn set_frame(&mut self, id: u64, frame_opacity: f64, extents: (i32, i32, i32, i32)) {
        let window = self.window_mut(id);
        window.frame_opacity = frame_opacity;
        window.frame_extents = extents;
    }

    pub fn set_full_shadow(&mut self, id: u64, full: bool) {
        let window = self.window_mut(id);
        if full {
            window.flags |= WindowFlags::FULL_SHADOW;
        } else {
            window.flags.remove(WindowFlags::FULL_SHADOW);
        }
    }

    pub fn damage_window(&mut self, id: u64, rect: Rect) {
        self.window_mut(id).damage.union_rect(rect);
    }

    pub fn clear_damage(&mut self, id: u64) {
        self.window_mut(id).damage.clear();
    }
}

impl WindowModel for FixtureWindowModel {
    fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    fn root_image_generation(&self) -> u64 {
        self.root_generation
    }

    fn stacking_order(&self) -> &[WindowInfo] {
        &self.windows
    }

    fn monitor_region(&self, _monitor: usize) -> Option<Region> {
        None
    }
}
