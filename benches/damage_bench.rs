use comp_render_core::command_builder::{BuildFlags, CommandBuilder};
use comp_render_core::damage::DamageEngine;
use comp_render_core::layout::LayoutManager;
use comp_render_core::testkit::FixtureWindowModel;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn build_frame(lm: &mut LayoutManager, builder: &mut CommandBuilder, wm: &FixtureWindowModel) {
    lm.append_layout(wm);
    let screen_size = lm.layout(0).screen_size;
    let mut layers = std::mem::take(&mut lm.current_layout_mut().layers);
    let list = builder.build(&mut layers, screen_size, BuildFlags::default());
    let layout = lm.current_layout_mut();
    layout.layers = layers;
    layout.commands = list;
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("damage_alignment");
    for window_count in [8usize, 32, 128] {
        group.bench_with_input(
            BenchmarkId::from_parameter(window_count),
            &window_count,
            |b, &window_count| {
                let mut lm = LayoutManager::new(2);
                let mut builder = CommandBuilder::new();
                let mut wm = FixtureWindowModel::new(1920, 1080);
                for i in 0..window_count {
                    wm.add_window(i as u64, (i as i32 * 15) % 1800, (i as i32 * 11) % 1000, 200, 200);
                }
                build_frame(&mut lm, &mut builder, &wm);
                wm.move_window(0, 400, 400);
                build_frame(&mut lm, &mut builder, &wm);

                let engine = DamageEngine::new();
                b.iter(|| {
                    let damage = engine.compute(&lm, 1, (0, 0));
                    black_box(damage);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_alignment);
criterion_main!(benches);
