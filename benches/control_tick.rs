//! Benchmarks for the per-tick hot paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flightcore::config::import_toml;
use flightcore::fusion::{euler_rates, AirData, WindEstimator};
use flightcore::{ControlPipeline, FlightCore, PropertyTree, Telemetry};
use std::fmt::Write;

const DT: f64 = 0.02;

/// `stages` components alternating between the four algorithms, chained
/// so each reads what the previous one wrote.
fn chain_config(stages: usize) -> String {
    let mut out = String::new();
    for i in 0..stages {
        let input = if i == 0 {
            "/sensors/x".to_string()
        } else {
            format!("/bench/s{}", i - 1)
        };
        let body = match i % 4 {
            0 => "module = \"pid_vel_component\"\n",
            1 => "module = \"pid_component\"\n",
            2 => "module = \"predict_simple\"\nseconds = 1.0\nfilter_gain = 0.5\n",
            _ => "module = \"filter\"\ntype = \"moving-average\"\nsamples = 10\n",
        };
        let _ = write!(
            out,
            "[[autopilot.component]]\n{}name = \"s{}\"\n\
             [autopilot.component.enable]\nprop = \"/bench/lock\"\nvalue = \"on\"\n\
             [autopilot.component.input]\nprop = \"{}\"\n\
             [autopilot.component.reference]\nvalue = \"1.0\"\n\
             [autopilot.component.output]\nprop = \"/bench/s{}\"\n\
             [autopilot.component.config]\nKp = 0.5\nTi = 2.0\nTd = 0.1\nu_min = -1.0\nu_max = 1.0\n\n",
            body, i, input, i
        );
    }
    out
}

fn bench_pipeline_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_update");

    for stages in [4, 16, 64].iter() {
        let mut tree = PropertyTree::new();
        import_toml(&mut tree, "/config", &chain_config(*stages)).unwrap();
        tree.set_at("/bench", "lock", "on").unwrap();
        let mut pipeline = ControlPipeline::new();
        pipeline.build(&mut tree).unwrap();
        let x = tree.resolve("/sensors/x").unwrap();

        group.throughput(Throughput::Elements(*stages as u64));
        group.bench_with_input(BenchmarkId::new("stages", stages), stages, |b, _| {
            let mut i = 0u64;
            b.iter(|| {
                tree.set_f64(x, (i as f64 * 0.01).sin());
                pipeline.update(&mut tree, black_box(DT));
                i = i.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_derived(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived");

    group.bench_function("euler_rates", |b| {
        b.iter(|| black_box(euler_rates(black_box(20.0), black_box(5.0), 0.1, 0.02, -0.05)));
    });

    group.bench_function("wind_update", |b| {
        let mut wind = WindEstimator::new();
        let air = AirData {
            airspeed_kt: 30.0,
            heading_deg: 80.0,
            vn_ms: 2.0,
            ve_ms: 14.0,
        };
        b.iter(|| black_box(wind.update(black_box(air), DT)));
    });

    group.finish();
}

fn bench_core_tick(c: &mut Criterion) {
    let config = format!(
        "[[filters.filter]]\nmodule = \"mirror\"\nenable = true\nsource = \"/sensors/ins\"\n\n{}",
        chain_config(16)
    );
    let mut tree = PropertyTree::new();
    import_toml(&mut tree, "/config", &config).unwrap();
    tree.set_at("/bench", "lock", "on").unwrap();
    tree.set_at("/task", "is_airborne", true).unwrap();
    tree.set_at("/sensors/airdata", "airspeed_kt", 28.0).unwrap();
    let mut core = FlightCore::new(tree, Telemetry::null()).unwrap();

    let imu = core.tree_mut().resolve("/sensors/imu/timestamp").unwrap();
    let ins = core.tree_mut().resolve("/sensors/ins/timestamp").unwrap();

    c.bench_function("flight_core_tick", |b| {
        let mut t = 0.0;
        b.iter(|| {
            t += DT;
            let tree = core.tree_mut();
            tree.set_f64(imu, t);
            tree.set_f64(ins, t);
            black_box(core.tick(DT))
        });
    });
}

criterion_group!(benches, bench_pipeline_update, bench_derived, bench_core_tick);
criterion_main!(benches);
