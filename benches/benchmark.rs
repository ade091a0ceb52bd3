//! Recommend using with
//! `RUSTFLAGS="-C target-cpu=x86-64-v2" cargo bench`
//! and that end users compile their applications in this way. That enables
//! SSE4.2 support which should be a safe default for the matrix heavy pose
//! evaluation.
//!
//! The chain skeleton is deeper than most real characters so traversal cost
//! dominates over setup.

use armature::{
    animation::{
        pose::{self, PoseInput},
        sampler, Animation, Channel, ClipBuilder, Interpolation,
    },
    skeleton::{JointDesc, Skeleton, SkeletonBuilder},
    skin, SkinningMatrices,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra_glm as glm;

const COUNT: usize = 100;
const MUL: f32 = 1.0_f32 / (COUNT as f32);
const JOINTS: usize = 64;
const KEYS: usize = 30;

fn chain() -> Skeleton {
    let mut builder = SkeletonBuilder::new("chain");
    for i in 0..JOINTS {
        let parent = i.checked_sub(1);
        builder.push(
            JointDesc::new(format!("joint{i}"), parent)
                .translation(glm::vec3(0.0, 0.25, 0.0)),
        );
    }
    builder.build().unwrap()
}

fn key_times() -> Vec<f32> {
    (0..KEYS).map(|i| i as f32 / 30.0).collect()
}

fn wave(skeleton: &Skeleton, name: &str, amount: f32) -> Animation {
    let times = key_times();
    let mut clip = ClipBuilder::new(name);
    for joint in skeleton.joints() {
        let rotations = times
            .iter()
            .map(|t| {
                glm::quat_angle_axis(
                    (t * 6.0).sin() * amount,
                    &glm::vec3(0.0, 0.0, 1.0),
                )
            })
            .collect();
        let channel =
            Channel::new(Interpolation::Linear, times.clone(), rotations)
                .unwrap();
        clip = clip.rotation(&joint.name, channel);
    }
    clip.fill_bind_pose().build(skeleton).unwrap()
}

fn evaluate_single(c: &mut Criterion) {
    let skeleton = chain();
    let clip = wave(&skeleton, "sway", 0.2);
    let mut world = SkinningMatrices::with_count(JOINTS);
    let input = black_box(PoseInput::Single {
        clip: &clip,
        time: 0.37,
    });

    c.bench_function(
        "evaluate single", //
        |b| b.iter(|| pose::evaluate(&skeleton, &input, &mut world)),
    );
}

fn evaluate_blend(c: &mut Criterion) {
    let skeleton = chain();
    let from = wave(&skeleton, "sway", 0.2);
    let to = wave(&skeleton, "thrash", 0.9);
    let mut world = SkinningMatrices::with_count(JOINTS);
    let input = black_box(PoseInput::Blend {
        from: &from,
        from_time: 0.37,
        to: &to,
        to_time: 0.81,
        factor: 0.4,
    });

    c.bench_function(
        "evaluate blend", //
        |b| b.iter(|| pose::evaluate(&skeleton, &input, &mut world)),
    );
}

fn export_palette(c: &mut Criterion) {
    let skeleton = chain();
    let mut world = SkinningMatrices::new();
    pose::bind_pose(&skeleton, &mut world).unwrap();
    let mut palette = SkinningMatrices::new();

    c.bench_function(
        "export palette", //
        |b| b.iter(|| skin::export(&skeleton, &world, &mut palette)),
    );
}

fn slerp(c: &mut Criterion) {
    let q1 = black_box(glm::quat_angle_axis(
        0.376_f32,
        &glm::vec3(0.0_f32, 0.0_f32, 1.0_f32),
    ));
    let q2 = black_box(glm::quat_angle_axis(
        2.512_f32,
        &glm::vec3(0.0_f32, 1.0_f32, 0.0_f32),
    ));
    c.bench_function(
        "slerp", //
        |b| {
            b.iter(|| {
                for i in 0..=COUNT {
                    let _ = sampler::slerp(&q1, &q2, (i as f32) * MUL);
                }
            })
        },
    );
}

fn find_bracket(c: &mut Criterion) {
    let times = black_box(key_times());
    let last = times[KEYS - 1];
    c.bench_function(
        "find bracket", //
        |b| {
            b.iter(|| {
                for i in 0..=COUNT {
                    let _ = sampler::find_bracket(
                        &times,
                        (i as f32) * MUL * last,
                    );
                }
            })
        },
    );
}

criterion_group!(
    benches,
    evaluate_single,
    evaluate_blend,
    export_palette,
    slerp,
    find_bracket
);
criterion_main!(benches);
