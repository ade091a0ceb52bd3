pub mod blend;
pub mod pose;
pub mod sampler;
mod track;
mod types;

// Re-exports
pub use {
    blend::{AnimationTask, BlendBracket, ClipState, TaskMode},
    pose::{LocalTransform, PoseInput},
    sampler::Keyable,
    track::AnimationTrack,
    types::{Animation, AnimationFrame, Channel, ClipBuilder, Interpolation},
};
