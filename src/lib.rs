//! Skeletal animation core
//!
//! Builds joint hierarchies with bind poses, samples keyframed clips, blends
//! clips along one axis and produces per-joint skinning matrices for a
//! renderer. Nothing here depends on a graphics API.
//!
//! A typical frame:
//! 1. `Animator::play` or `Animator::tick` advances clocks and evaluates
//!    each character's pose.
//! 2. `Animator::export_to_render` gives the skinning matrices, indexed by
//!    the joint order of the source file.
//! 3. `Animator::bone_location` gives a joint's model space matrix for
//!    attaching objects.

pub mod animation;
pub mod animator;
pub mod arm_error;
pub mod config;
pub mod import;
pub mod skeleton;
pub mod skin;
pub mod types;
pub mod util;

// Re-exports
pub use {
    animator::{Animator, CharacterSkin},
    arm_error::{ArmError, ContentError},
    config::CharacterConfig,
    skin::SkinningMatrices,
    types::{CharacterId, ClipId, JointRef, SkinId, TaskId},
};
