use super::{
    sampler::{lerp, sample, slerp},
    types::{Animation, AnimationFrame},
};
use crate::{
    arm_error::ArmError,
    skeleton::{Joint, Skeleton},
    skin::SkinningMatrices,
    util,
};
use log::error;
use nalgebra_glm as glm;

/// What to evaluate a pose from
#[derive(Clone, Copy, Debug)]
pub enum PoseInput<'a> {
    /// One clip at one time
    Single { clip: &'a Animation, time: f32 },
    /// Two clips, each at its own time, blended by `factor` in `[0, 1]`.
    /// The sampled transforms are blended, not the keyframes.
    Blend {
        from: &'a Animation,
        from_time: f32,
        to: &'a Animation,
        to_time: f32,
        factor: f32,
    },
    /// The skeleton's bind pose
    BindPose,
}

/// Translation, rotation and scale of one joint relative to its parent
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTransform {
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl LocalTransform {
    /// The joint's bind pose
    #[must_use]
    pub const fn bind(joint: &Joint) -> Self {
        Self {
            translation: joint.translation,
            rotation: joint.rotation,
            scale: joint.scale,
        }
    }

    /// Samples a frame at `time`. Channels without keys use the bind pose.
    #[must_use]
    pub fn sample(frame: &AnimationFrame, joint: &Joint, time: f32) -> Self {
        Self {
            translation: sample(&frame.translation, time, joint.translation),
            rotation: sample(&frame.rotation, time, joint.rotation),
            scale: sample(&frame.scale, time, joint.scale),
        }
    }

    /// Blends towards `other`. Translation and scale are interpolated
    /// linearly and rotation spherically.
    #[must_use]
    pub fn blend(&self, other: &Self, factor: f32) -> Self {
        Self {
            translation: lerp(&self.translation, &other.translation, factor),
            rotation: slerp(&self.rotation, &other.rotation, factor),
            scale: lerp(&self.scale, &other.scale, factor),
        }
    }

    /// Composes `T * R * S`
    #[must_use]
    pub fn to_matrix(&self) -> glm::Mat4 {
        util::compose(&self.translation, &self.rotation, &self.scale)
    }
}

/// Looks up the frame for a joint, which must exist
fn frame_for<'a>(
    clip: &'a Animation,
    joint: &Joint,
    index: usize,
) -> Result<&'a AnimationFrame, ArmError> {
    clip.frame(index).ok_or_else(|| {
        error!("clip {} has no frame for joint {}", clip.name(), joint.name);
        ArmError::MissingChannel {
            clip: clip.name().to_string(),
            joint: joint.name.clone(),
        }
    })
}

/// Calculates the local transform of one joint
fn local_transform(
    input: &PoseInput,
    joint: &Joint,
    index: usize,
) -> Result<LocalTransform, ArmError> {
    match *input {
        PoseInput::Single { clip, time } => Ok(LocalTransform::sample(
            frame_for(clip, joint, index)?,
            joint,
            time,
        )),
        PoseInput::Blend {
            from,
            from_time,
            to,
            to_time,
            factor,
        } => {
            let a = LocalTransform::sample(
                frame_for(from, joint, index)?,
                joint,
                from_time,
            );
            let b = LocalTransform::sample(
                frame_for(to, joint, index)?,
                joint,
                to_time,
            );
            Ok(a.blend(&b, factor))
        }
        PoseInput::BindPose => Ok(LocalTransform::bind(joint)),
    }
}

// Call with a root joint to recursively calculate joint world transforms.
// The parent is always written before its children.
fn traverse(
    skeleton: &Skeleton,
    input: &PoseInput,
    index: usize,
    parent: &glm::Mat4,
    output: &mut SkinningMatrices,
) -> Result<(), ArmError> {
    let Some(joint) = skeleton.joint(index) else {
        error!("joint index {} not in skeleton {}", index, skeleton.name());
        return Err(ArmError::JointIndexOutOfRange(index));
    };

    let world = parent * local_transform(input, joint, index)?.to_matrix();

    // Keyed by original index, not hierarchy index
    if let Some(slot) = output.as_mut_slice().get_mut(joint.original_index) {
        *slot = world;
    }

    for child in &joint.children {
        traverse(skeleton, input, *child, &world, output)?;
    }
    Ok(())
}

/// Evaluates the joint to model space matrices for a pose
///
/// `output` is resized to the skeleton's joint count and every entry is
/// written at the joint's original index.
///
/// # Errors
/// Returns `ArmError::MissingChannel` if a clip has no frame for a joint. The
/// contents of `output` must not be used in that case.
pub fn evaluate(
    skeleton: &Skeleton,
    input: &PoseInput,
    output: &mut SkinningMatrices,
) -> Result<(), ArmError> {
    output.reset(skeleton.joint_count());
    for root in skeleton.roots() {
        let parent = skeleton
            .joint(*root)
            .map_or_else(glm::Mat4::identity, |j| j.root_offset);
        traverse(skeleton, input, *root, &parent, output)?;
    }
    Ok(())
}

/// Evaluates the bind pose
///
/// # Errors
/// Only fails for a malformed skeleton, which `SkeletonBuilder` prevents.
pub fn bind_pose(
    skeleton: &Skeleton,
    output: &mut SkinningMatrices,
) -> Result<(), ArmError> {
    evaluate(skeleton, &PoseInput::BindPose, output)
}

#[cfg(test)]
mod tests {
    use super::{bind_pose, evaluate, PoseInput};
    use crate::{
        animation::{Channel, ClipBuilder, Interpolation},
        arm_error::ArmError,
        skeleton::{JointDesc, Skeleton, SkeletonBuilder},
        skin::{export, SkinningMatrices},
    };
    use nalgebra_glm as glm;

    const EPSILON: f32 = 0.0005;

    fn mat_eq(a: &glm::Mat4, b: &glm::Mat4) -> bool {
        let c = glm::equal_columns_eps(a, b, EPSILON);
        c.x && c.y && c.z && c.w
    }

    /// Two joints listed child first
    fn chain() -> Skeleton {
        SkeletonBuilder::new("chain")
            .joint(
                JointDesc::new("tip", Some(1))
                    .translation(glm::vec3(0.0, 1.0, 0.0)),
            )
            .joint(
                JointDesc::new("root", None)
                    .translation(glm::vec3(2.0, 0.0, 0.0)),
            )
            .build()
            .unwrap()
    }

    fn slide(x: f32) -> Channel<glm::Vec3> {
        Channel::new(
            Interpolation::Linear,
            vec![0.0, 1.0],
            vec![glm::vec3(2.0, 0.0, 0.0), glm::vec3(2.0 + x, 0.0, 0.0)],
        )
        .unwrap()
    }

    #[test]
    fn bind_pose_world() {
        let skeleton = chain();
        let mut output = SkinningMatrices::new();
        bind_pose(&skeleton, &mut output).unwrap();
        assert_eq!(output.count(), 2);
        // Original index 0 is the tip
        let tip = glm::translation(&glm::vec3(2.0, 1.0, 0.0));
        let root = glm::translation(&glm::vec3(2.0, 0.0, 0.0));
        assert!(mat_eq(output.get(0).unwrap(), &tip));
        assert!(mat_eq(output.get(1).unwrap(), &root));
    }

    #[test]
    fn single_clip() {
        let skeleton = chain();
        let clip = ClipBuilder::new("slide")
            .translation("root", slide(4.0))
            .fill_bind_pose()
            .build(&skeleton)
            .unwrap();
        let mut output = SkinningMatrices::new();
        let input = PoseInput::Single {
            clip: &clip,
            time: 0.5,
        };
        evaluate(&skeleton, &input, &mut output).unwrap();
        let tip = glm::translation(&glm::vec3(4.0, 1.0, 0.0));
        assert!(mat_eq(output.get(0).unwrap(), &tip));
    }

    #[test]
    fn blended_clips() {
        let skeleton = chain();
        let near = ClipBuilder::new("near")
            .translation("root", slide(2.0))
            .fill_bind_pose()
            .build(&skeleton)
            .unwrap();
        let far = ClipBuilder::new("far")
            .translation("root", slide(6.0))
            .fill_bind_pose()
            .build(&skeleton)
            .unwrap();
        let mut output = SkinningMatrices::new();
        let input = PoseInput::Blend {
            from: &near,
            from_time: 1.0,
            to: &far,
            to_time: 1.0,
            factor: 0.25,
        };
        evaluate(&skeleton, &input, &mut output).unwrap();
        // 4 + 0.25 * (8 - 4)
        let root = glm::translation(&glm::vec3(5.0, 0.0, 0.0));
        assert!(mat_eq(output.get(1).unwrap(), &root));
    }

    #[test]
    fn missing_frame_is_an_error() {
        let skeleton = chain();
        let clip = ClipBuilder::new("partial")
            .translation("root", slide(1.0))
            .build(&skeleton)
            .unwrap();
        let mut output = SkinningMatrices::new();
        let input = PoseInput::Single {
            clip: &clip,
            time: 0.0,
        };
        let r = evaluate(&skeleton, &input, &mut output);
        assert!(matches!(r, Err(ArmError::MissingChannel { .. })));
    }

    #[test]
    fn root_offset_moves_whole_pose() {
        let offset = glm::translation(&glm::vec3(5.0, 0.0, 0.0))
            * glm::scaling(&glm::vec3(2.0, 2.0, 2.0));
        let skeleton = SkeletonBuilder::new("placed")
            .joint(
                JointDesc::new("tip", Some(1))
                    .translation(glm::vec3(0.0, 1.0, 0.0)),
            )
            .joint(
                JointDesc::new("root", None)
                    .translation(glm::vec3(2.0, 0.0, 0.0))
                    .root_offset(offset),
            )
            .build()
            .unwrap();

        let mut world = SkinningMatrices::new();
        bind_pose(&skeleton, &mut world).unwrap();
        let mut palette = SkinningMatrices::new();
        export(&skeleton, &world, &mut palette).unwrap();
        for m in palette.as_slice() {
            assert!(mat_eq(m, &glm::Mat4::identity()));
        }

        // Animated root is still placed under the offset
        let clip = ClipBuilder::new("slide")
            .translation("root", slide(4.0))
            .fill_bind_pose()
            .build(&skeleton)
            .unwrap();
        let input = PoseInput::Single {
            clip: &clip,
            time: 1.0,
        };
        evaluate(&skeleton, &input, &mut world).unwrap();
        let root = glm::translation(&glm::vec3(17.0, 0.0, 0.0))
            * glm::scaling(&glm::vec3(2.0, 2.0, 2.0));
        assert!(mat_eq(world.get(1).unwrap(), &root));
        let tip = glm::translation(&glm::vec3(17.0, 2.0, 0.0))
            * glm::scaling(&glm::vec3(2.0, 2.0, 2.0));
        assert!(mat_eq(world.get(0).unwrap(), &tip));
    }

    #[test]
    fn output_is_resized() {
        let skeleton = chain();
        let mut output = SkinningMatrices::with_count(7);
        bind_pose(&skeleton, &mut output).unwrap();
        assert_eq!(output.count(), skeleton.joint_count());
    }
}
