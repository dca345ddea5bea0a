//! Translates a [`crate::layout::Layout`]'s layers into an ordered command
//! stream: body blits, shadow, blur per layer, bottom-up, followed by the
//! transparent-clipping and shadow-clipping-above passes.

use crate::backend::{BlurContextHandle, Color};
use crate::command::{
    BlitCommand, BlurCommand, Command, CommandList, CommandListPool, CommandOp, CopyAreaCommand,
    MaskRef, Source,
};
use crate::geometry::{Rect, Region};
use crate::layer::Layer;
use crate::window_model::WindowFlags;

/// Flags threaded through `build` from the renderer, mirroring the
/// `command_builder_build(cb, layout, flags...)` call in §6.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildFlags {
    pub force_blend: bool,
    pub blur_frame: bool,
    pub trace: bool,
}

pub struct CommandBuilder {
    pool: CommandListPool,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self {
            pool: CommandListPool::default(),
        }
    }

    pub fn free_list(&mut self, list: CommandList) {
        self.pool.release(list);
    }

    /// Builds the command stream for `layers` against `screen_size`,
    /// returning the populated [`CommandList`] and the per-layer command
    /// counts written back into `layers[i].number_of_commands`.
    pub fn build(
        &mut self,
        layers: &mut [Layer],
        screen_size: (u32, u32),
        flags: BuildFlags,
    ) -> CommandList {
        let mut list = self.pool.acquire(layers.len() * 3 + 1);

        list.push(Command {
            origin: (0, 0),
            target_mask: Region::from_rect(Rect::new(0, 0, screen_size.0, screen_size.1)),
            opaque_region: Region::from_rect(Rect::new(0, 0, screen_size.0, screen_size.1)),
            op: CommandOp::CopyArea(CopyAreaCommand {
                source_image: crate::backend::ImageHandle(0),
            }),
        });
        list.first_layer_start = 1;

        for layer in layers.iter_mut() {
            let before = list.len();
            emit_layer(&mut list, layer, flags);
            layer.number_of_commands = list.len() - before;
        }

        apply_transparent_clipping(&mut list, layers);
        apply_shadow_clipping_above(&mut list, layers, flags);

        if flags.trace {
            log::trace!("command plan ({} commands): {:?}", list.len(), list.commands);
        }

        list
    }
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn corner_notch_region(bounds: Rect, corner_radius: f64) -> Region {
    // Approximate the four rounded-corner notches as square cut-outs of side
    // `corner_radius`; exact circular notches are a backend rasterization
    // detail, not a region-arithmetic one.
    if corner_radius <= 0.0 {
        return Region::empty();
    }
    let r = corner_radius.ceil() as u32;
    let mut notches = Region::empty();
    notches.union_rect(Rect::new(bounds.left(), bounds.top(), r, r));
    notches.union_rect(Rect::new(bounds.right() - r as i32, bounds.top(), r, r));
    notches.union_rect(Rect::new(bounds.left(), bounds.bottom() - r as i32, r, r));
    notches.union_rect(Rect::new(
        bounds.right() - r as i32,
        bounds.bottom() - r as i32,
        r,
        r,
    ));
    notches
}

fn scale_region(region: &Region, scale: (f64, f64), origin: (i32, i32)) -> Region {
    if scale == (1.0, 1.0) {
        return region.clone();
    }
    Region::from_rects(
        region
            .rects()
            .iter()
            .map(|r| r.scale_around_origin(scale.0, scale.1, origin.0, origin.1)),
    )
}

fn emit_layer(list: &mut CommandList, layer: &Layer, flags: BuildFlags) {
    // Emitted back-to-front within the layer: blur, then shadow, then body,
    // pushed in that array order so that execution (front-to-back within the
    // push order) paints body first, then shadow, then blur on top -- the
    // builder pushes in reverse of visual stacking per §4.3's "emit in this
    // order... (backwards into the array so that within a layer they appear
    // top-down in execution order)".
    emit_blur(list, layer, flags);
    emit_shadow(list, layer);
    emit_body(list, layer);
}

fn emit_body(list: &mut CommandList, layer: &Layer) {
    let window_rect = layer.window_rect();
    // frame_opacity < 1 means the frame is not fully covered by the body
    // blit; frame_opacity strictly inside (0,1) additionally needs a frame
    // blit of its own (frame_opacity == 0 means the frame is invisible and
    // nothing paints it at all).
    let frame_excluded = layer.frame_opacity < 1.0;
    let frame_transparent = layer.frame_opacity > 0.0 && layer.frame_opacity < 1.0;

    let mut full_mask = layer.bounding_shape.clone();
    if full_mask.is_empty() {
        full_mask = Region::from_rect(window_rect);
    }
    if let Some(crop) = layer.crop {
        full_mask = full_mask.intersect_rect(crop);
    }

    let frame_region = layer.frame_region().intersect(&full_mask);
    let target_mask = if frame_excluded {
        full_mask.subtract(&frame_region)
    } else {
        full_mask
    };

    let is_solid = !layer.flags.intersects(
        WindowFlags::WMODE_TRANS | WindowFlags::WMODE_FRAME_TRANS | WindowFlags::FORCE_BLEND,
    );
    let mut opaque_region = if is_solid && layer.opacity >= 1.0 {
        target_mask.clone()
    } else {
        Region::empty()
    };
    if layer.corner_radius > 0.0 && !opaque_region.is_empty() {
        opaque_region = opaque_region.subtract(&corner_notch_region(window_rect, layer.corner_radius));
    }

    let scaled_target = scale_region(&target_mask, layer.scale, layer.window_origin);
    let scaled_opaque = scale_region(&opaque_region, layer.scale, layer.window_origin);

    let opacity_effective = layer.opacity * (1.0 - layer.saved_blend);

    if layer.saved_blend > 0.0 && layer.saved_image.is_some() {
        let crossfade_opacity = if opacity_effective < 1.0 {
            layer.opacity * layer.saved_blend / (1.0 - opacity_effective).max(f64::EPSILON)
        } else {
            layer.opacity * layer.saved_blend
        };
        list.push(Command {
            origin: layer.window_origin,
            target_mask: scaled_target.clone(),
            opaque_region: Region::empty(),
            op: CommandOp::Blit(BlitCommand {
                source: Source::WindowSaved,
                source_image: layer.saved_image.unwrap(),
                source_mask: None,
                opacity: crossfade_opacity,
                dim: layer.dim,
                corner_radius: layer.corner_radius,
                border_width: layer.border_width,
                scale: layer.scale,
                effective_size: layer.window_size,
                color_inverted: layer.color_inverted,
                max_brightness: layer.max_brightness,
            }),
        });
    }

    if frame_transparent {
        let scaled_frame = scale_region(&frame_region, layer.scale, layer.window_origin);
        list.push(Command {
            origin: layer.window_origin,
            target_mask: scaled_frame,
            opaque_region: Region::empty(),
            op: CommandOp::Blit(BlitCommand {
                source: Source::Window,
                source_image: layer.content_image.unwrap_or(crate::backend::ImageHandle(0)),
                source_mask: None,
                opacity: layer.frame_opacity * layer.opacity,
                dim: layer.dim,
                corner_radius: layer.corner_radius,
                border_width: layer.border_width,
                scale: layer.scale,
                effective_size: layer.window_size,
                color_inverted: layer.color_inverted,
                max_brightness: layer.max_brightness,
            }),
        });
    }

    list.push(Command {
        origin: layer.window_origin,
        target_mask: scaled_target,
        opaque_region: scaled_opaque,
        op: CommandOp::Blit(BlitCommand {
            source: Source::Window,
            source_image: layer.content_image.unwrap_or(crate::backend::ImageHandle(0)),
            source_mask: None,
            opacity: opacity_effective,
            dim: layer.dim,
            corner_radius: layer.corner_radius,
            border_width: layer.border_width,
            scale: layer.scale,
            effective_size: layer.window_size,
            color_inverted: layer.color_inverted,
            max_brightness: layer.max_brightness,
        }),
    });
}

fn emit_shadow(list: &mut CommandList, layer: &Layer) {
    if !layer.has_shadow() {
        return;
    }
    let shadow_rect = layer.shadow_rect();
    let mut target_mask = Region::from_rect(shadow_rect);

    if !layer.flags.contains(WindowFlags::FULL_SHADOW) {
        let window_rect = layer.window_rect();
        let mut subtraction = Region::from_rect(window_rect);
        if layer.corner_radius > 0.0 {
            // The window's rounded corners are not opaque, so the shadow
            // should still show through them: narrow the subtracted area by
            // the corner notches.
            subtraction = subtraction.subtract(&corner_notch_region(window_rect, layer.corner_radius));
        }
        target_mask = target_mask.subtract(&subtraction);
    }

    let target_mask = scale_region(&target_mask, layer.shadow_scale, layer.shadow_origin);

    let source_mask = Some(MaskRef {
        region: Region::from_rect(layer.window_rect()),
        inverted: true,
        corner_radius: layer.corner_radius,
    });

    list.push(Command {
        origin: layer.shadow_origin,
        target_mask,
        opaque_region: Region::empty(),
        op: CommandOp::Blit(BlitCommand {
            source: Source::Shadow,
            source_image: layer.shadow_image.unwrap_or(crate::backend::ImageHandle(0)),
            source_mask,
            opacity: layer.shadow_opacity,
            dim: 0.0,
            corner_radius: 0.0,
            border_width: 0,
            scale: layer.shadow_scale,
            effective_size: layer.shadow_size,
            color_inverted: false,
            max_brightness: 1.0,
        }),
    });
}

fn emit_blur(list: &mut CommandList, layer: &Layer, flags: BuildFlags) {
    if !layer.has_blur() {
        return;
    }

    let window_rect = layer.window_rect();
    let is_translucent = flags.force_blend
        || layer.flags.contains(WindowFlags::WMODE_TRANS)
        || layer.opacity < 1.0;

    let target_mask = if is_translucent {
        let mut region = layer.bounding_shape.clone();
        if region.is_empty() {
            region = Region::from_rect(window_rect);
        }
        region
    } else if flags.blur_frame && layer.flags.contains(WindowFlags::WMODE_FRAME_TRANS) {
        Region::from_rect(window_rect)
    } else {
        return;
    };

    let target_mask = if let Some(crop) = layer.crop {
        target_mask.intersect_rect(crop)
    } else {
        target_mask
    };
    let target_mask = scale_region(&target_mask, layer.scale, layer.window_origin);

    let source_mask = if layer.corner_radius > 0.0 {
        Some(MaskRef {
            region: Region::from_rect(window_rect),
            inverted: false,
            corner_radius: layer.corner_radius,
        })
    } else {
        None
    };

    list.push(Command {
        origin: layer.window_origin,
        target_mask,
        opaque_region: Region::empty(),
        op: CommandOp::Blur(BlurCommand {
            source_image: layer.content_image.unwrap_or(crate::backend::ImageHandle(0)),
            blur_context: BlurContextHandle(0),
            opacity: layer.blur_opacity,
            source_mask,
        }),
    });
}

/// Top-down scan: at each layer boundary with `transparent_clipping`, union
/// its visible shape into a running "already opaque above" region, then
/// subtract that region from every command's `target_mask` (and, for BLIT,
/// `opaque_region`) from the top down.
fn apply_transparent_clipping(list: &mut CommandList, layers: &[Layer]) {
    let mut opaque_above = Region::empty();
    let mut command_index = list.len();

    for layer in layers.iter().rev() {
        let layer_start = command_index - layer.number_of_commands;
        for idx in (layer_start..command_index).rev() {
            let command = &mut list.commands[idx];
            command.target_mask = command.target_mask.subtract(&opaque_above);
            if command.is_blit() {
                command.opaque_region = command.opaque_region.subtract(&opaque_above);
            }
        }
        if layer.flags.contains(WindowFlags::TRANSPARENT_CLIPPING) {
            let mut shape = layer.bounding_shape.clone();
            if shape.is_empty() {
                shape = Region::from_rect(layer.window_rect());
            }
            opaque_above.union(&shape);
        }
        command_index = layer_start;
    }
}

/// Bottom-up scan: maintains the region covered by `clip_shadow_above`
/// layers seen so far; subtracts it from BLURs and shadow BLITs above, and
/// grows it with non-shadow BLITs from clip_shadow_above layers.
fn apply_shadow_clipping_above(list: &mut CommandList, layers: &[Layer], _flags: BuildFlags) {
    let mut clipped_above = Region::empty();
    let mut command_index = list.first_layer_start;

    for layer in layers.iter() {
        let layer_end = command_index + layer.number_of_commands;
        for idx in command_index..layer_end {
            let is_shadow = matches!(
                &list.commands[idx].op,
                CommandOp::Blit(b) if b.source == Source::Shadow
            );
            let command = &mut list.commands[idx];
            if command.is_blur() || is_shadow {
                command.target_mask = command.target_mask.subtract(&clipped_above);
            }
        }
        if layer.flags.contains(WindowFlags::CLIP_SHADOW_ABOVE) {
            for idx in command_index..layer_end {
                let command = &list.commands[idx];
                let is_non_shadow_blit = matches!(
                    &command.op,
                    CommandOp::Blit(b) if b.source != Source::Shadow
                );
                if is_non_shadow_blit {
                    clipped_above.union(&command.target_mask);
                }
            }
        }
        command_index = layer_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::FixtureWindowModel;
    use crate::window_model::WindowModel;

    fn single_layer(x: i32, y: i32, w: u32, h: u32) -> Layer {
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, x, y, w, h);
        let window = &wm.stacking_order()[0];
        crate::layer::Layer {
            key: window.key,
            window_origin: (window.geometry.x, window.geometry.y),
            window_size: (window.geometry.width, window.geometry.height),
            frame_extents: window.frame_extents,
            shadow_origin: (
                window.geometry.x + window.shadow.dx,
                window.geometry.y + window.shadow.dy,
            ),
            shadow_size: (window.shadow.width, window.shadow.height),
            crop: None,
            scale: (1.0, 1.0),
            shadow_scale: (1.0, 1.0),
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

    #[test]
    fn opaque_window_body_emits_one_blit_with_full_opaque_region() {
        let mut layers = vec![single_layer(100, 100, 200, 200)];
        let mut builder = CommandBuilder::new();
        let list = builder.build(&mut layers, (800, 600), BuildFlags::default());

        assert_eq!(layers[0].number_of_commands, 1);
        let body = list.commands.last().unwrap();
        let blit = body.as_blit().unwrap();
        assert_eq!(blit.source, Source::Window);
        assert!(!body.opaque_region.is_empty());
    }

    #[test]
    fn translucent_window_has_empty_opaque_region() {
        let mut layer = single_layer(100, 100, 200, 200);
        layer.opacity = 0.5;
        let mut layers = vec![layer];
        let mut builder = CommandBuilder::new();
        let list = builder.build(&mut layers, (800, 600), BuildFlags::default());

        let body = list.commands.last().unwrap();
        assert!(body.opaque_region.is_empty());
    }

    #[test]
    fn shadow_target_mask_excludes_window_body() {
        let mut layer = single_layer(100, 100, 200, 200);
        layer.flags |= WindowFlags::SHADOW;
        layer.shadow_opacity = 1.0;
        layer.shadow_origin = (80, 80);
        layer.shadow_size = (240, 240);
        let mut layers = vec![layer];
        let mut builder = CommandBuilder::new();
        let list = builder.build(&mut layers, (800, 600), BuildFlags::default());

        let shadow_cmd = list
            .commands
            .iter()
            .find(|c| matches!(&c.op, CommandOp::Blit(b) if b.source == Source::Shadow))
            .unwrap();
        let area: u64 = shadow_cmd
            .target_mask
            .rects()
            .iter()
            .map(|r| r.width as u64 * r.height as u64)
            .sum();
        assert_eq!(area, 240 * 240 - 200 * 200);
    }

    #[test]
    fn background_copy_area_is_first_command() {
        let mut layers = vec![single_layer(100, 100, 200, 200)];
        let mut builder = CommandBuilder::new();
        let list = builder.build(&mut layers, (800, 600), BuildFlags::default());
        assert!(list.commands[0].is_copy_area());
        assert_eq!(list.first_layer_start, 1);
    }

    #[test]
    fn transparent_frame_is_excluded_from_body_and_painted_once() {
        let mut layer = single_layer(100, 100, 200, 200);
        layer.frame_extents = (0, 0, 20, 0); // a 20px title bar along the top
        layer.frame_opacity = 0.5;
        let mut layers = vec![layer];
        let mut builder = CommandBuilder::new();
        let list = builder.build(&mut layers, (800, 600), BuildFlags::default());

        let layer_commands = &list.commands[list.first_layer_start..];
        let frame_blit = layer_commands
            .iter()
            .find(|c| {
                c.as_blit()
                    .map(|b| (b.opacity - 0.5 * 1.0).abs() < 1e-9)
                    .unwrap_or(false)
            })
            .expect("frame blit emitted");
        let frame_area: u64 = frame_blit
            .target_mask
            .rects()
            .iter()
            .map(|r| r.width as u64 * r.height as u64)
            .sum();
        assert_eq!(frame_area, 200 * 20);

        let body = layer_commands.last().unwrap();
        let body_area: u64 = body
            .target_mask
            .rects()
            .iter()
            .map(|r| r.width as u64 * r.height as u64)
            .sum();
        assert_eq!(body_area, 200 * 200 - 200 * 20);
    }
}
