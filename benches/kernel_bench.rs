use comp_render_core::kernel::{gaussian_kernel_std_for_size, Kernel};
use comp_render_core::shadow::render_alpha_mask;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_preprocess");
    for radius in [4u32, 8, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            b.iter(|| {
                let mut kernel = Kernel::gaussian(radius);
                kernel.preprocess();
                black_box(kernel);
            });
        });
    }
    group.finish();
}

fn bench_shadow_alpha(c: &mut Criterion) {
    let mut group = c.benchmark_group("shadow_alpha_mask");
    for radius in [4u32, 8, 16, 32] {
        let kernel = gaussian_kernel_std_for_size(2 * radius + 1, 0.5 / 256.0);
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            b.iter(|| {
                let alpha = render_alpha_mask(&kernel, 200, 200, radius, 0.8);
                black_box(alpha);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_shadow_alpha);
criterion_main!(benches);
