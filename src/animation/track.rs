use super::{blend::AnimationTask, pose, types::Animation};
use crate::{
    arm_error::ArmError,
    skeleton::Skeleton,
    skin::{self, SkinningMatrices},
    types::{CharacterId, JointRef, SkinId, TaskId},
};
use log::error;
use nalgebra_glm as glm;

/// The task that `Animator::tick` plays for a character, with its blend
/// coordinates
#[derive(Copy, Clone, Debug, PartialEq)]
struct ActiveTask {
    task: TaskId,
    x: f32,
    y: f32,
}

/// Animation state of one live character
///
/// `pose` holds the joint to model space matrices from the last call to
/// `play` and `skinned` the matching skinning matrices. Both are indexed by
/// original joint index. A track owns all of its mutable state.
#[derive(Clone, Debug)]
pub struct AnimationTrack {
    character: CharacterId,
    skin: SkinId,
    tasks: Vec<AnimationTask>,
    pose: SkinningMatrices,
    skinned: SkinningMatrices,
    fresh: bool,
    active: Option<ActiveTask>,
}

impl AnimationTrack {
    #[must_use]
    pub fn new(
        character: CharacterId,
        skin: SkinId,
        joint_count: usize,
    ) -> Self {
        Self {
            character,
            skin,
            tasks: Vec::new(),
            pose: SkinningMatrices::with_count(joint_count),
            skinned: SkinningMatrices::with_count(joint_count),
            fresh: false,
            active: None,
        }
    }

    #[must_use]
    pub const fn character(&self) -> CharacterId {
        self.character
    }

    #[must_use]
    pub const fn skin(&self) -> SkinId {
        self.skin
    }

    pub fn add_task(&mut self, task: AnimationTask) -> TaskId {
        self.tasks.push(task);
        TaskId(self.tasks.len() - 1)
    }

    #[must_use]
    pub fn task(&self, task: TaskId) -> Option<&AnimationTask> {
        self.tasks.get(task.0)
    }

    pub fn task_mut(&mut self, task: TaskId) -> Option<&mut AnimationTask> {
        self.tasks.get_mut(task.0)
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Advances one task by `dt` and evaluates the pose
    ///
    /// The pose is only marked ready for export if evaluation succeeds.
    ///
    /// # Errors
    /// Returns `ArmError::UnknownTask` for a task not in this track and any
    /// error from playing the task.
    pub fn play(
        &mut self,
        skeleton: &Skeleton,
        clips: &[Animation],
        task: TaskId,
        x: f32,
        y: f32,
        dt: f32,
    ) -> Result<(), ArmError> {
        self.fresh = false;
        let Some(t) = self.tasks.get_mut(task.0) else {
            error!("{} has no task {}", self.character, task.0);
            return Err(ArmError::UnknownTask(task.0));
        };
        t.play(skeleton, clips, x, y, dt, &mut self.pose)?;
        self.fresh = true;
        Ok(())
    }

    /// Evaluates the bind pose
    ///
    /// # Errors
    /// Only fails for a malformed skeleton.
    pub fn rest(&mut self, skeleton: &Skeleton) -> Result<(), ArmError> {
        self.fresh = false;
        pose::bind_pose(skeleton, &mut self.pose)?;
        self.fresh = true;
        Ok(())
    }

    /// Sets the task for `tick` to play with its blend coordinates. `None`
    /// holds the character in its bind pose.
    pub fn set_active(&mut self, task: Option<TaskId>, x: f32, y: f32) {
        self.active = task.map(|task| ActiveTask { task, x, y });
    }

    #[must_use]
    pub fn active(&self) -> Option<TaskId> {
        self.active.map(|a| a.task)
    }

    /// Plays the active task, or the bind pose without one
    ///
    /// # Errors
    /// Same as `play`.
    pub fn tick(
        &mut self,
        skeleton: &Skeleton,
        clips: &[Animation],
        dt: f32,
    ) -> Result<(), ArmError> {
        match self.active {
            Some(active) => {
                self.play(skeleton, clips, active.task, active.x, active.y, dt)
            }
            None => self.rest(skeleton),
        }
    }

    /// True if the pose was evaluated successfully by the last call to
    /// `play`, `rest` or `tick`
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Joint to model space matrices, indexed by original joint index
    #[must_use]
    pub const fn pose(&self) -> &SkinningMatrices {
        &self.pose
    }

    /// Calculates the skinning matrices for the current pose
    ///
    /// # Errors
    /// Returns `ArmError::PoseNotReady` if the last evaluation failed or
    /// nothing has been evaluated yet.
    pub fn export(
        &mut self,
        skeleton: &Skeleton,
    ) -> Result<&SkinningMatrices, ArmError> {
        if !self.fresh {
            error!("{} has no evaluated pose to export", self.character);
            return Err(ArmError::PoseNotReady);
        }
        skin::export(skeleton, &self.pose, &mut self.skinned)?;
        Ok(&self.skinned)
    }

    /// Gets the joint to model space matrix of one joint in the current pose
    ///
    /// # Errors
    /// Returns `ArmError::UnknownJoint` or `ArmError::JointIndexOutOfRange`
    /// if the joint is not in the skeleton and `ArmError::PoseNotReady` if
    /// there is no evaluated pose.
    pub fn bone_location(
        &self,
        skeleton: &Skeleton,
        joint: &JointRef,
    ) -> Result<glm::Mat4, ArmError> {
        let original_index = match joint {
            JointRef::Name(name) => skeleton
                .find(name)
                .and_then(|index| skeleton.joint(index))
                .map(|j| j.original_index)
                .ok_or_else(|| {
                    error!("{} has no joint {}", skeleton.name(), name);
                    ArmError::UnknownJoint(name.clone())
                })?,
            JointRef::Index(index) => {
                if *index >= skeleton.joint_count() {
                    error!("{} has no joint index {}", skeleton.name(), index);
                    return Err(ArmError::JointIndexOutOfRange(*index));
                }
                *index
            }
        };
        if !self.fresh {
            error!("{} has no evaluated pose", self.character);
            return Err(ArmError::PoseNotReady);
        }
        self.pose.get(original_index).copied().ok_or_else(|| {
            error!("{} pose has no joint {}", self.character, original_index);
            ArmError::PoseNotReady
        })
    }
}
