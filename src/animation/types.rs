use super::sampler::Keyable;
use crate::{
    arm_error::{ArmError, ContentError},
    skeleton::{Joint, Skeleton},
};
use ahash::{HashMap, HashMapExt};
use log::{debug, error};
use nalgebra_glm as glm;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// Keyframes for one of the translation, rotation or scale parts of one
/// joint in one clip
///
/// Times are strictly increasing and there is one value per time. A channel
/// that is not valid has no keys and samples as the joint's bind pose.
#[derive(Clone, Debug)]
pub struct Channel<T> {
    interpolation: Interpolation,
    times: Vec<f32>,
    values: Vec<T>,
    valid: bool,
}

impl<T: Keyable> Channel<T> {
    /// Creates an animated channel
    ///
    /// # Errors
    /// Returns `ContentError` wrapped in `ArmError` if the counts differ, there
    /// are no keys, or the times are not finite and strictly increasing.
    pub fn new(
        interpolation: Interpolation,
        times: Vec<f32>,
        values: Vec<T>,
    ) -> Result<Self, ArmError> {
        if times.len() != values.len() {
            error!(
                "channel has {} times but {} values",
                times.len(),
                values.len()
            );
            return Err(ContentError::CountMismatch {
                times: times.len(),
                values: values.len(),
            }
            .into());
        }
        if times.is_empty() {
            error!("animated channel has no keyframes");
            return Err(ContentError::EmptyChannel.into());
        }
        if let Some(bad) = times.iter().position(|t| !t.is_finite()) {
            error!("keyframe {} time is {}", bad, times[bad]);
            return Err(ContentError::NonFiniteKeyframe(bad).into());
        }
        if let Some(bad) = times.windows(2).position(|w| w[1] <= w[0]) {
            error!("keyframe {} is out of order", bad + 1);
            return Err(ContentError::UnsortedKeyframes(bad + 1).into());
        }
        Ok(Self {
            interpolation,
            times,
            values: values.into_iter().map(T::prepare).collect(),
            valid: true,
        })
    }

    /// A channel with a single key at time 0
    #[must_use]
    pub fn constant(value: T) -> Self {
        Self {
            interpolation: Interpolation::Step,
            times: vec![0.0],
            values: vec![value.prepare()],
            valid: true,
        }
    }
}

impl<T> Channel<T> {
    /// A channel that is not animated
    #[must_use]
    pub const fn unanimated() -> Self {
        Self {
            interpolation: Interpolation::Step,
            times: Vec::new(),
            values: Vec::new(),
            valid: false,
        }
    }

    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    #[must_use]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Time of the last key, 0 for a channel without keys
    #[must_use]
    pub fn last_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::unanimated()
    }
}

/// The three channels for one joint in one clip
///
/// `joint`, `target` (hierarchy index) and `original_joint` (file index)
/// record the joint the frame was built for. `Animation::covers` compares
/// them with the skeleton a clip is used with.
#[derive(Clone, Debug)]
pub struct AnimationFrame {
    pub translation: Channel<glm::Vec3>,
    pub rotation: Channel<glm::Quat>,
    pub scale: Channel<glm::Vec3>,
    pub joint: String,
    pub target: usize,
    pub original_joint: usize,
}

impl AnimationFrame {
    /// A frame that holds the joint in its bind pose
    #[must_use]
    pub fn bind_pose(target: usize, joint: &Joint) -> Self {
        Self {
            translation: Channel::unanimated(),
            rotation: Channel::unanimated(),
            scale: Channel::unanimated(),
            joint: joint.name.clone(),
            target,
            original_joint: joint.original_index,
        }
    }

    /// True if this frame was built for `joint` at hierarchy index `index`
    #[must_use]
    pub fn targets(&self, index: usize, joint: &Joint) -> bool {
        self.target == index
            && self.original_joint == joint.original_index
            && self.joint == joint.name
    }

    /// Latest key time over all three channels
    #[must_use]
    pub fn last_time(&self) -> f32 {
        self.translation
            .last_time()
            .max(self.rotation.last_time())
            .max(self.scale.last_time())
    }
}

/// An animation clip, bound to the skeleton it was built against
///
/// `lookup` maps a joint's hierarchy index to its frame, which is resolved
/// from joint names once when the clip is built.
#[derive(Clone, Debug)]
pub struct Animation {
    name: String,
    frames: Vec<AnimationFrame>,
    lookup: Vec<Option<usize>>,
    duration: f32,
}

impl Animation {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest key time in any channel of the clip
    #[must_use]
    pub const fn duration(&self) -> f32 {
        self.duration
    }

    #[must_use]
    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    /// Gets the frame for a joint by hierarchy index
    #[must_use]
    pub fn frame(&self, joint_index: usize) -> Option<&AnimationFrame> {
        self.lookup
            .get(joint_index)
            .copied()
            .flatten()
            .and_then(|f| self.frames.get(f))
    }

    /// Checks that this clip was built for `skeleton` and that every joint
    /// has a frame
    ///
    /// # Errors
    /// Returns `ContentError::SkeletonMismatch` if the joint count differs or
    /// a frame was built for another joint, and `ArmError::MissingChannel`
    /// naming the first joint without a frame.
    pub fn covers(&self, skeleton: &Skeleton) -> Result<(), ArmError> {
        if self.lookup.len() != skeleton.joint_count() {
            error!(
                "clip {} was built for {} joints but skeleton {} has {}",
                self.name,
                self.lookup.len(),
                skeleton.name(),
                skeleton.joint_count()
            );
            return Err(self.mismatch(skeleton));
        }
        for (index, joint) in skeleton.joints().iter().enumerate() {
            let Some(frame) = self.frame(index) else {
                error!(
                    "clip {} has no frame for joint {}",
                    self.name, joint.name
                );
                return Err(ArmError::MissingChannel {
                    clip: self.name.clone(),
                    joint: joint.name.clone(),
                });
            };
            if !frame.targets(index, joint) {
                error!(
                    "clip {} frame for {} does not match joint {}",
                    self.name, frame.joint, joint.name
                );
                return Err(self.mismatch(skeleton));
            }
        }
        Ok(())
    }

    fn mismatch(&self, skeleton: &Skeleton) -> ArmError {
        ContentError::SkeletonMismatch {
            clip: self.name.clone(),
            skeleton: skeleton.name().to_string(),
        }
        .into()
    }
}

#[derive(Clone, Debug, Default)]
struct PendingFrame {
    translation: Option<Channel<glm::Vec3>>,
    rotation: Option<Channel<glm::Quat>>,
    scale: Option<Channel<glm::Vec3>>,
}

/// Collects channels by joint name and builds an `Animation` for a skeleton
#[derive(Clone, Debug, Default)]
pub struct ClipBuilder {
    name: String,
    pending: HashMap<String, PendingFrame>,
    fill_bind_pose: bool,
    repeated: Option<String>,
}

impl ClipBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: HashMap::new(),
            fill_bind_pose: false,
            repeated: None,
        }
    }

    #[must_use]
    pub fn translation(
        mut self,
        joint: &str,
        channel: Channel<glm::Vec3>,
    ) -> Self {
        let slot = &mut self.entry(joint).translation;
        let repeated = slot.replace(channel).is_some();
        self.note_repeat(joint, repeated)
    }

    #[must_use]
    pub fn rotation(
        mut self,
        joint: &str,
        channel: Channel<glm::Quat>,
    ) -> Self {
        let slot = &mut self.entry(joint).rotation;
        let repeated = slot.replace(channel).is_some();
        self.note_repeat(joint, repeated)
    }

    #[must_use]
    pub fn scale(mut self, joint: &str, channel: Channel<glm::Vec3>) -> Self {
        let slot = &mut self.entry(joint).scale;
        let repeated = slot.replace(channel).is_some();
        self.note_repeat(joint, repeated)
    }

    /// Marks one joint as intentionally held in its bind pose
    #[must_use]
    pub fn bind_pose(mut self, joint: &str) -> Self {
        self.entry(joint);
        self
    }

    /// Holds every joint without channels in its bind pose. Without this a
    /// joint with no channels has no frame, and evaluating the clip fails.
    #[must_use]
    pub fn fill_bind_pose(mut self) -> Self {
        self.fill_bind_pose = true;
        self
    }

    fn entry(&mut self, joint: &str) -> &mut PendingFrame {
        self.pending.entry(joint.to_string()).or_default()
    }

    fn note_repeat(mut self, joint: &str, repeated: bool) -> Self {
        if repeated && self.repeated.is_none() {
            self.repeated = Some(joint.to_string());
        }
        self
    }

    /// Resolves joint names against `skeleton` and builds the clip
    ///
    /// # Errors
    /// Returns `ArmError::UnknownJoint` for a channel naming a joint that is
    /// not in the skeleton and `ContentError::DuplicateFrame` if a channel
    /// was given twice.
    pub fn build(mut self, skeleton: &Skeleton) -> Result<Animation, ArmError> {
        if let Some(joint) = self.repeated {
            error!("clip {} sets a channel of {} twice", self.name, joint);
            return Err(ContentError::DuplicateFrame(joint).into());
        }
        if let Some(unknown) =
            self.pending.keys().find(|name| skeleton.find(name).is_none())
        {
            error!("clip {} animates unknown joint {}", self.name, unknown);
            return Err(ArmError::UnknownJoint(unknown.clone()));
        }

        let mut frames = Vec::new();
        let mut lookup = vec![None; skeleton.joint_count()];
        for (index, joint) in skeleton.joints().iter().enumerate() {
            let frame = match self.pending.remove(&joint.name) {
                Some(pending) => Some(make_frame(index, joint, pending)),
                None if self.fill_bind_pose => {
                    Some(AnimationFrame::bind_pose(index, joint))
                }
                None => None,
            };
            if let Some(frame) = frame {
                lookup[index] = Some(frames.len());
                frames.push(frame);
            }
        }

        let duration = frames
            .iter()
            .map(AnimationFrame::last_time)
            .fold(0.0_f32, f32::max);
        debug!(
            "clip {} has {} frames, duration={}",
            self.name,
            frames.len(),
            duration
        );
        Ok(Animation {
            name: self.name,
            frames,
            lookup,
            duration,
        })
    }
}

fn make_frame(
    index: usize,
    joint: &Joint,
    pending: PendingFrame,
) -> AnimationFrame {
    AnimationFrame {
        translation: pending.translation.unwrap_or_default(),
        rotation: pending.rotation.unwrap_or_default(),
        scale: pending.scale.unwrap_or_default(),
        joint: joint.name.clone(),
        target: index,
        original_joint: joint.original_index,
    }
}
