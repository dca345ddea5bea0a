//! The six end-to-end rendering scenarios, driving the layout manager,
//! command builder, damage engine, and renderer against the in-memory
//! testkit fakes instead of a real X backend.

use comp_render_core::command_builder::{BuildFlags, CommandBuilder};
use comp_render_core::damage::DamageEngine;
use comp_render_core::geometry::Rect;
use comp_render_core::layout::LayoutManager;
use comp_render_core::testkit::{FixtureWindowModel, RecordingBackend};
use comp_render_core::window_model::WindowModel;

fn build_frame(lm: &mut LayoutManager, builder: &mut CommandBuilder, wm: &FixtureWindowModel, flags: BuildFlags) {
    lm.append_layout(wm);
    let screen_size = lm.layout(0).screen_size;
    let mut layers = std::mem::take(&mut lm.current_layout_mut().layers);
    let list = builder.build(&mut layers, screen_size, flags);
    let layout = lm.current_layout_mut();
    layout.layers = layers;
    layout.commands = list;
}

#[test]
fn scenario_1_single_opaque_window_no_damage() {
    let mut lm = LayoutManager::new(2);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);

    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let engine = DamageEngine::new();
    let damage = engine.compute(&lm, 1, (0, 0));
    assert!(damage.is_empty());
}

#[test]
fn scenario_2_window_moves() {
    let mut lm = LayoutManager::new(2);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    wm.move_window(1, 300, 100);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let engine = DamageEngine::new();
    let damage = engine.compute(&lm, 1, (0, 0));

    let old_rect = Rect::new(100, 100, 200, 200);
    let new_rect = Rect::new(300, 100, 200, 200);
    let expected_area = old_rect.bounding(&new_rect);
    assert!(!damage.intersect_rect(old_rect).is_empty());
    assert!(!damage.intersect_rect(new_rect).is_empty());
    // damage should not spill outside the union of the two window rects
    for rect in damage.rects() {
        assert!(expected_area.intersect(rect).map(|i| i == *rect).unwrap_or(false));
    }
}

#[test]
fn scenario_3_opacity_change() {
    let mut lm = LayoutManager::new(2);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    wm.set_opacity(1, 0.5);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let engine = DamageEngine::new();
    let damage = engine.compute(&lm, 1, (0, 0));
    let window_rect = Rect::new(100, 100, 200, 200);
    assert!(!damage.intersect_rect(window_rect).is_empty());

    let layer = &lm.layout(0).layers[0];
    let start = lm.layout(0).commands.first_layer_start;
    let body = &lm.layout(0).commands.commands[start + layer.number_of_commands - 1];
    assert!(body.opaque_region.is_empty());
}

#[test]
fn scenario_4_shadow_without_full_shadow() {
    let mut lm = LayoutManager::new(1);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);
    wm.enable_shadow(1, -20, -20, 240, 240, 1.0);

    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let list = &lm.layout(0).commands;
    let shadow_cmd = list
        .commands
        .iter()
        .find(|c| {
            matches!(&c.op, comp_render_core::command::CommandOp::Blit(b)
                if b.source == comp_render_core::command::Source::Shadow)
        })
        .expect("shadow command emitted");

    let expected = comp_render_core::geometry::Region::from_rect(Rect::new(80, 80, 240, 240))
        .subtract_rect(Rect::new(100, 100, 200, 200));
    let expected_area: u64 = expected
        .rects()
        .iter()
        .map(|r| r.width as u64 * r.height as u64)
        .sum();
    let actual_area: u64 = shadow_cmd
        .target_mask
        .rects()
        .iter()
        .map(|r| r.width as u64 * r.height as u64)
        .sum();
    assert_eq!(actual_area, expected_area);
}

#[test]
fn scenario_5_blur_halo_expands_damage() {
    let mut lm = LayoutManager::new(2);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);
    wm.set_opacity(1, 0.8);
    wm.set_blur(1, 0.8);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    wm.damage_window(1, Rect::new(145, 145, 10, 10));
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let engine = DamageEngine::new();
    let damage = engine.compute(&lm, 1, (10, 10));

    // the 10x10 inner damage, expanded by (10,10) on each side, should cover
    // at least a 30x30 square centered on the original damage.
    let expanded = Rect::new(135, 135, 30, 30);
    let covered: u64 = damage
        .intersect_rect(expanded)
        .rects()
        .iter()
        .map(|r| r.width as u64 * r.height as u64)
        .sum();
    assert!(covered > 0);
}

#[test]
fn scenario_6_summed_area_shadow_interior_and_corner() {
    use comp_render_core::kernel::Kernel;
    use comp_render_core::shadow::render_alpha_mask;

    let mut kernel = Kernel::gaussian(5);
    kernel.preprocess();

    let alpha = render_alpha_mask(&kernel, 100, 100, 5, 0.5);

    let interior = alpha.get_pixel(55, 55).0[0];
    assert_eq!(interior, (0.5 * 255.0_f64).round() as u8);

    // The corner of the padded canvas overlaps only the kernel's own
    // corner cell (rsum[0,0]) of the window silhouette.
    let corner_coverage = kernel.sum_kernel_normalized(0, 0, 1, 1);
    let expected_corner = (corner_coverage * 0.5 * 255.0).round() as u8;
    assert_eq!(alpha.get_pixel(0, 0).0[0], expected_corner);
}

#[test]
fn root_generation_change_forces_full_screen_damage() {
    let mut lm = LayoutManager::new(1);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    wm.bump_root_generation();
    build_frame(&mut lm, &mut builder, &wm, BuildFlags::default());

    let engine = DamageEngine::new();
    let damage = engine.compute(&lm, 1, (0, 0));
    let screen = Rect::new(0, 0, 800, 600);
    let area: u64 = damage.rects().iter().map(|r| r.width as u64 * r.height as u64).sum();
    assert_eq!(area, screen.width as u64 * screen.height as u64);
}

#[test]
fn recording_backend_drives_a_full_render_frame() {
    use comp_render_core::renderer::{Renderer, RendererConfig};

    let mut backend = RecordingBackend::new(800, 600);
    let mut lm = LayoutManager::new(2);
    let mut builder = CommandBuilder::new();
    let mut wm = FixtureWindowModel::new(800, 600);
    wm.add_window(1, 100, 100, 200, 200);

    let config = RendererConfig::builder().use_damage(true).max_buffer_age(2).build();
    let mut renderer = Renderer::new(&mut backend, config);

    backend.set_buffer_age(0);
    let ok = renderer
        .render(&mut backend, None, &mut lm, &mut builder, &wm, false)
        .unwrap();
    assert!(ok);
    assert!(backend.calls.iter().any(|c| c.starts_with("execute")));
    assert!(backend.calls.iter().any(|c| c == "present"));
}
