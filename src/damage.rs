//! Computes the minimal screen region that differs between two layouts, and
//! narrows commands' target masks to that damage.

use crate::command::{Command, CommandList, CommandOp, Source};
use crate::geometry::Region;
use crate::layer::Layer;
use crate::layout::{Layout, LayoutManager};

#[derive(Debug, Default)]
pub struct DamageEngine;

impl DamageEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes the damage between `lm.layout(0)` (current) and `lm.layout(age)`
    /// (past), per §4.4. `blur_size` is the expansion radius blur contexts
    /// diffuse damage by.
    pub fn compute(&self, lm: &LayoutManager, age: usize, blur_size: (u32, u32)) -> Region {
        let curr = lm.layout(0);
        let past = lm.layout(age);

        if curr.screen_size != past.screen_size
            || curr.root_image_generation != past.root_image_generation
        {
            return full_screen(curr.screen_size);
        }

        align_and_accumulate(lm, curr, past, age, blur_size)
    }

    /// Narrows every command's post-cull mask to its intersection with
    /// `damage`, maintaining the `visible` region top-down per §4.4 Culling.
    /// Results are written into `list.culled`; `uncull` undoes this by
    /// clearing that array.
    pub fn cull(&self, list: &mut CommandList, damage: &Region, blur_size: (u32, u32)) {
        list.culled.reset_for(list.commands.len());
        let mut visible = damage.clone();

        for (idx, command) in list.commands.iter().enumerate() {
            let post_cull = command.target_mask.intersect(&visible);
            list.culled.set(idx, post_cull.clone());

            match &command.op {
                CommandOp::Blit(_) => {
                    visible.subtract_in_place(&command.opaque_region);
                }
                CommandOp::CopyArea(_) => {
                    visible.subtract_in_place(&command.target_mask);
                }
                CommandOp::Blur(_) => {
                    let halo = post_cull.intersect(&command.target_mask);
                    let expanded = halo.expanded(blur_size.0 as i32, blur_size.1 as i32);
                    visible.union(&expanded);
                }
                CommandOp::Fill(_) => {}
            }
        }
    }

    /// Restores every command's effective mask to its pre-cull `target_mask`
    /// by clearing the parallel culled-mask array.
    pub fn uncull(&self, list: &mut CommandList) {
        list.culled.clear();
    }
}

fn full_screen(size: (u32, u32)) -> Region {
    Region::from_rect(crate::geometry::Rect::new(0, 0, size.0, size.1))
}

/// Greedy linear-time approximate LCS alignment between `curr.layers` and
/// `past.layers`, using the `prev_rank`/`next_rank` chains already
/// maintained by the layout manager. One-sided safe: it may over-damage
/// (treat a matchable layer as inserted/removed) but never under-damages.
fn align_and_accumulate(
    lm: &LayoutManager,
    curr: &Layout,
    past: &Layout,
    age: usize,
    blur_size: (u32, u32),
) -> Region {
    let mut damage = Region::empty();
    let mut i = 0usize; // index into curr.layers
    let mut j = 0usize; // index into past.layers

    while i < curr.layers.len() || j < past.layers.len() {
        if i >= curr.layers.len() {
            damage.union(&layer_union_mask(past, j));
            j += 1;
            continue;
        }
        if j >= past.layers.len() {
            damage.union(&layer_union_mask(curr, i));
            i += 1;
            continue;
        }

        if curr.layers[i].key == past.layers[j].key {
            compare_matched_layers(
                lm,
                curr,
                past,
                i,
                j,
                age,
                blur_size,
                &mut damage,
            );
            i += 1;
            j += 1;
            continue;
        }

        // Find the nearest counterpart on each side; advance whichever side
        // skips fewer layers before reaching a match.
        let skip_curr = find_forward_match(&curr.layers[i..], &past.layers[j]);
        let skip_past = find_forward_match(&past.layers[j..], &curr.layers[i]);

        match (skip_curr, skip_past) {
            (Some(sc), Some(sp)) if sp < sc => {
                for k in 0..sp {
                    damage.union(&layer_union_mask(past, j + k));
                }
                j += sp;
            }
            (Some(sc), _) => {
                for k in 0..sc {
                    damage.union(&layer_union_mask(curr, i + k));
                }
                i += sc;
            }
            (None, Some(sp)) => {
                for k in 0..sp {
                    damage.union(&layer_union_mask(past, j + k));
                }
                j += sp;
            }
            (None, None) => {
                // neither side reappears nearby: both are unilaterally gone
                damage.union(&layer_union_mask(curr, i));
                damage.union(&layer_union_mask(past, j));
                i += 1;
                j += 1;
            }
        }
    }

    damage
}

fn find_forward_match(haystack: &[Layer], needle: &Layer) -> Option<usize> {
    haystack.iter().position(|l| l.key == needle.key)
}

fn layer_union_mask(layout: &Layout, index: usize) -> Region {
    let layer = &layout.layers[index];
    let start: usize = layout.layers[..index]
        .iter()
        .map(|l| l.number_of_commands)
        .sum::<usize>()
        + layout.commands.first_layer_start;
    let end = start + layer.number_of_commands;
    let mut region = Region::empty();
    for command in &layout.commands.commands[start..end] {
        region.union(&command.target_mask);
    }
    region
}

#[allow(clippy::too_many_arguments)]
fn compare_matched_layers(
    lm: &LayoutManager,
    curr: &Layout,
    past: &Layout,
    i: usize,
    j: usize,
    age: usize,
    blur_size: (u32, u32),
    damage: &mut Region,
) {
    let curr_layer = &curr.layers[i];
    let past_layer = &past.layers[j];

    let geometry_changed = curr_layer.window_origin != past_layer.window_origin
        || curr_layer.window_size != past_layer.window_size
        || curr_layer.scale != past_layer.scale
        || curr_layer.shadow_origin != past_layer.shadow_origin
        || curr_layer.shadow_size != past_layer.shadow_size
        || curr_layer.shadow_scale != past_layer.shadow_scale
        || curr_layer.saved_blend != past_layer.saved_blend
        || curr_layer.number_of_commands != past_layer.number_of_commands;

    if geometry_changed {
        damage.union(&layer_union_mask(curr, i));
        damage.union(&layer_union_mask(past, j));
        return;
    }

    let curr_start: usize = curr.layers[..i]
        .iter()
        .map(|l| l.number_of_commands)
        .sum::<usize>()
        + curr.commands.first_layer_start;
    let past_start: usize = past.layers[..j]
        .iter()
        .map(|l| l.number_of_commands)
        .sum::<usize>()
        + past.commands.first_layer_start;

    for k in 0..curr_layer.number_of_commands {
        let curr_cmd = &curr.commands.commands[curr_start + k];
        let past_cmd = &past.commands.commands[past_start + k];

        if command_op_differs(curr_cmd, past_cmd) {
            damage.union(&curr_cmd.target_mask);
            damage.union(&past_cmd.target_mask);
            continue;
        }

        match (&curr_cmd.op, &past_cmd.op) {
            (CommandOp::Blit(c), CommandOp::Blit(p)) => {
                if blit_global_args_changed(c, p) {
                    damage.union(&curr_cmd.target_mask);
                    damage.union(&past_cmd.target_mask);
                    continue;
                }
                damage.subtract_in_place(&curr_cmd.opaque_region);
                let sym_diff = curr_cmd
                    .target_mask
                    .subtract(&past_cmd.target_mask)
                    .unioned(&past_cmd.target_mask.subtract(&curr_cmd.target_mask));
                damage.union(&sym_diff);

                if c.source == Source::Window {
                    let mut window_damage = Region::empty();
                    lm.collect_window_damage(i, age, &mut window_damage);
                    let confined = window_damage
                        .intersect(&curr_cmd.target_mask)
                        .intersect(&past_cmd.target_mask);
                    damage.union(&confined);
                }
            }
            (CommandOp::Blur(c), CommandOp::Blur(p)) => {
                if c.opacity != p.opacity {
                    damage.union(&curr_cmd.target_mask);
                    damage.union(&past_cmd.target_mask);
                } else {
                    let sym_diff = curr_cmd
                        .target_mask
                        .subtract(&past_cmd.target_mask)
                        .unioned(&past_cmd.target_mask.subtract(&curr_cmd.target_mask));
                    damage.union(&sym_diff);
                    let expanded = sym_diff
                        .intersect(&curr_cmd.target_mask)
                        .expanded(blur_size.0 as i32, blur_size.1 as i32);
                    damage.union(&expanded);
                }
            }
            _ => {
                damage.union(&curr_cmd.target_mask);
                damage.union(&past_cmd.target_mask);
            }
        }
    }
}

fn command_op_differs(a: &Command, b: &Command) -> bool {
    match (&a.op, &b.op) {
        (CommandOp::Blit(x), CommandOp::Blit(y)) => x.source != y.source,
        (CommandOp::Blur(_), CommandOp::Blur(_)) => false,
        (CommandOp::Fill(_), CommandOp::Fill(_)) => false,
        (CommandOp::CopyArea(_), CommandOp::CopyArea(_)) => false,
        _ => true,
    }
}

fn blit_global_args_changed(
    a: &crate::command::BlitCommand,
    b: &crate::command::BlitCommand,
) -> bool {
    if a.dim != b.dim
        || a.opacity != b.opacity
        || a.corner_radius != b.corner_radius
        || a.max_brightness != b.max_brightness
        || a.color_inverted != b.color_inverted
    {
        return true;
    }
    if a.corner_radius > 0.0 && (a.border_width != b.border_width || a.effective_size != b.effective_size) {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_builder::{BuildFlags, CommandBuilder};
    use crate::testkit::FixtureWindowModel;

    fn render_two_frames(mutate: impl FnOnce(&mut FixtureWindowModel)) -> (LayoutManager, DamageEngine) {
        let mut lm = LayoutManager::new(2);
        let mut builder = CommandBuilder::new();
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 100, 100, 200, 200);

        lm.append_layout(&wm);
        build_top_layout(&mut lm, &mut builder);

        mutate(&mut wm);

        lm.append_layout(&wm);
        build_top_layout(&mut lm, &mut builder);

        (lm, DamageEngine::new())
    }

    fn build_top_layout(lm: &mut LayoutManager, builder: &mut CommandBuilder) {
        let screen_size = lm.layout(0).screen_size;
        let mut layers = std::mem::take(&mut lm.current_layout_mut().layers);
        let list = builder.build(&mut layers, screen_size, BuildFlags::default());
        let layout = lm.current_layout_mut();
        layout.layers = layers;
        layout.commands = list;
    }

    #[test]
    fn identical_frames_have_no_damage() {
        let (lm, engine) = render_two_frames(|_| {});
        let damage = engine.compute(&lm, 1, (0, 0));
        assert!(damage.is_empty());
    }

    #[test]
    fn moving_window_damages_union_of_old_and_new_rects() {
        let (lm, engine) = render_two_frames(|wm| {
            wm.move_window(1, 300, 100);
        });
        let damage = engine.compute(&lm, 1, (0, 0));
        let old_rect = crate::geometry::Rect::new(100, 100, 200, 200);
        let new_rect = crate::geometry::Rect::new(300, 100, 200, 200);
        assert!(damage.rects().iter().any(|r| r.intersects(&old_rect)));
        assert!(damage.rects().iter().any(|r| r.intersects(&new_rect)));
    }

    #[test]
    fn opacity_change_damages_window_area() {
        let (lm, engine) = render_two_frames(|wm| {
            wm.set_opacity(1, 0.5);
        });
        let damage = engine.compute(&lm, 1, (0, 0));
        assert!(!damage.is_empty());
    }

    #[test]
    fn blur_halo_expands_symmetric_difference() {
        let mut lm = LayoutManager::new(2);
        let mut builder = CommandBuilder::new();
        let mut wm = FixtureWindowModel::new(800, 600);
        wm.add_window(1, 100, 100, 200, 200);
        wm.set_blur(1, 0.8);

        lm.append_layout(&wm);
        build_top_layout(&mut lm, &mut builder);

        wm.damage_window(1, crate::geometry::Rect::new(140, 140, 10, 10));
        lm.append_layout(&wm);
        build_top_layout(&mut lm, &mut builder);

        let engine = DamageEngine::new();
        let damage = engine.compute(&lm, 1, (10, 10));
        assert!(!damage.is_empty());
    }

    #[test]
    fn cull_then_uncull_restores_effective_mask() {
        let (mut lm, engine) = render_two_frames(|wm| {
            wm.move_window(1, 300, 100);
        });
        let damage = engine.compute(&lm, 1, (0, 0));
        let layout = lm.current_layout_mut();
        let before: Vec<_> = layout
            .commands
            .commands
            .iter()
            .map(|c| c.target_mask.clone())
            .collect();

        engine.cull(&mut layout.commands, &damage, (0, 0));
        engine.uncull(&mut layout.commands);

        for (idx, expected) in before.iter().enumerate() {
            let effective = layout.commands.culled.effective(idx, &layout.commands.commands);
            assert_eq!(effective.rects(), expected.rects());
        }
    }
}
