use super::{
    pose::{self, PoseInput},
    types::Animation,
};
use crate::{
    arm_error::{ArmError, ContentError},
    skeleton::Skeleton,
    skin::SkinningMatrices,
    types::ClipId,
};
use itertools::Itertools;
use log::{error, warn};
use serde::{Deserialize, Serialize};

/// How the clips of a task are combined
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// One clip
    #[default]
    Clip,
    /// Two neighbouring clips along one blend axis
    OneD,
    /// Blending on a plane. Not supported.
    TwoD,
}

/// One clip in a task with its own clock and blend space position
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipState {
    pub clip: ClipId,
    pub speed: f32,
    pub current_time: f32,
    pub max_duration: f32,
    pub position_x: f32,
    pub position_y: f32,
}

impl ClipState {
    #[must_use]
    pub const fn new(clip: ClipId) -> Self {
        Self {
            clip,
            speed: 1.0,
            current_time: 0.0,
            max_duration: 0.0,
            position_x: 0.0,
            position_y: 0.0,
        }
    }

    /// Sets the position in blend space
    #[must_use]
    pub const fn at(mut self, x: f32, y: f32) -> Self {
        self.position_x = x;
        self.position_y = y;
        self
    }

    #[must_use]
    pub const fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Sets the duration. `Animator::add_task` fills this in from the clip.
    #[must_use]
    pub const fn duration(mut self, duration: f32) -> Self {
        self.max_duration = duration;
        self
    }

    /// Advances the clock by `dt` scaled by speed. A looping clock wraps
    /// into `[0, max_duration)` and a clock that does not loop is clamped to
    /// `[0, max_duration]`.
    pub fn advance(&mut self, dt: f32, looping: bool) {
        let duration = self.max_duration;
        if !(duration > 0.0 && duration.is_finite()) {
            self.current_time = 0.0;
            return;
        }
        let time = dt.mul_add(self.speed, self.current_time);
        self.current_time = if looping {
            let wrapped = time.rem_euclid(duration);
            // Rounding can land exactly on the duration
            if wrapped < duration {
                wrapped
            } else {
                0.0
            }
        } else {
            time.clamp(0.0, duration)
        };
    }
}

/// The pair of neighbouring stack entries around a blend coordinate
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlendBracket {
    pub lo: usize,
    pub hi: usize,
    pub factor: f32,
}

/// Finds the bracket for `x` in a stack sorted by `position_x`
///
/// A coordinate outside the stack clamps to the first or last pair with a
/// factor of 0 or 1. Returns `None` for fewer than two entries.
#[must_use]
pub fn find_blend_bracket(stack: &[ClipState], x: f32) -> Option<BlendBracket> {
    let (first, last) = (stack.first()?, stack.last()?);
    let end = stack.len() - 1;
    if end == 0 {
        return None;
    }
    if x <= first.position_x {
        return Some(BlendBracket {
            lo: 0,
            hi: 1,
            factor: 0.0,
        });
    }
    if x >= last.position_x {
        return Some(BlendBracket {
            lo: end - 1,
            hi: end,
            factor: 1.0,
        });
    }
    for (lo, (a, b)) in stack.iter().tuple_windows().enumerate() {
        if a.position_x <= x && x <= b.position_x {
            let span = b.position_x - a.position_x;
            let factor = if span > 0.0 {
                ((x - a.position_x) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return Some(BlendBracket {
                lo,
                hi: lo + 1,
                factor,
            });
        }
    }
    // Not a number
    Some(BlendBracket {
        lo: 0,
        hi: 1,
        factor: 0.0,
    })
}

/// A playable combination of clips
///
/// The stack is kept sorted by `position_x`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationTask {
    mode: TaskMode,
    looping: bool,
    stack: Vec<ClipState>,
}

impl AnimationTask {
    /// Creates a task. Without an explicit mode a single entry plays as
    /// `TaskMode::Clip` and more entries as `TaskMode::OneD`.
    ///
    /// # Errors
    /// Returns `ContentError::EmptyTask` for an empty stack.
    pub fn new(
        mut stack: Vec<ClipState>,
        mode: Option<TaskMode>,
    ) -> Result<Self, ArmError> {
        if stack.is_empty() {
            error!("animation task has no clips");
            return Err(ContentError::EmptyTask.into());
        }
        stack.sort_by(|a, b| a.position_x.total_cmp(&b.position_x));
        let mode = mode.unwrap_or(if stack.len() == 1 {
            TaskMode::Clip
        } else {
            TaskMode::OneD
        });
        if mode == TaskMode::OneD && stack.len() == 1 {
            warn!("1D blend with one clip will play as a single clip");
        }
        Ok(Self {
            mode,
            looping: true,
            stack,
        })
    }

    /// A task playing one clip
    #[must_use]
    pub fn clip(clip: ClipId, duration: f32) -> Self {
        Self {
            mode: TaskMode::Clip,
            looping: true,
            stack: vec![ClipState::new(clip).duration(duration)],
        }
    }

    /// A task blending along one axis
    ///
    /// # Errors
    /// Returns `ContentError::EmptyTask` for an empty stack.
    pub fn blend_1d(stack: Vec<ClipState>) -> Result<Self, ArmError> {
        Self::new(stack, Some(TaskMode::OneD))
    }

    #[must_use]
    pub const fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sets the speed of every clip
    #[must_use]
    pub fn speed(mut self, speed: f32) -> Self {
        for state in &mut self.stack {
            state.speed = speed;
        }
        self
    }

    #[must_use]
    pub const fn mode(&self) -> TaskMode {
        self.mode
    }

    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    #[must_use]
    pub fn stack(&self) -> &[ClipState] {
        &self.stack
    }

    /// Clip durations are filled in through this. Positions must not be
    /// changed, since the stack is kept sorted by `position_x`.
    pub(crate) fn stack_mut(&mut self) -> &mut [ClipState] {
        &mut self.stack
    }

    /// Advances the clocks by `dt` and evaluates the pose into `output`
    ///
    /// `x` is the blend coordinate for `TaskMode::OneD`. `y` would be the
    /// second coordinate for `TaskMode::TwoD`.
    ///
    /// # Errors
    /// Returns `ArmError::UnknownClip` for a clip id not in `clips`,
    /// `ArmError::UnsupportedBlendMode` for `TaskMode::TwoD` and any error
    /// from pose evaluation.
    pub fn play(
        &mut self,
        skeleton: &Skeleton,
        clips: &[Animation],
        x: f32,
        _y: f32,
        dt: f32,
        output: &mut SkinningMatrices,
    ) -> Result<(), ArmError> {
        let looping = self.looping;
        match self.mode {
            TaskMode::TwoD => {
                error!("2D blending is not supported");
                Err(ArmError::UnsupportedBlendMode)
            }
            TaskMode::OneD => {
                let Some(bracket) = find_blend_bracket(&self.stack, x) else {
                    return self.play_single(skeleton, clips, dt, output);
                };
                let (lo, hi) = (bracket.lo, bracket.hi);
                self.stack[lo].advance(dt, looping);
                self.stack[hi].advance(dt, looping);
                let (from, to) = (&self.stack[lo], &self.stack[hi]);
                let input = PoseInput::Blend {
                    from: get_clip(clips, from.clip)?,
                    from_time: from.current_time,
                    to: get_clip(clips, to.clip)?,
                    to_time: to.current_time,
                    factor: bracket.factor,
                };
                pose::evaluate(skeleton, &input, output)
            }
            TaskMode::Clip => self.play_single(skeleton, clips, dt, output),
        }
    }

    fn play_single(
        &mut self,
        skeleton: &Skeleton,
        clips: &[Animation],
        dt: f32,
        output: &mut SkinningMatrices,
    ) -> Result<(), ArmError> {
        let looping = self.looping;
        let Some(state) = self.stack.first_mut() else {
            error!("animation task has no clips");
            return Err(ContentError::EmptyTask.into());
        };
        state.advance(dt, looping);
        let input = PoseInput::Single {
            clip: get_clip(clips, state.clip)?,
            time: state.current_time,
        };
        pose::evaluate(skeleton, &input, output)
    }
}

fn get_clip(clips: &[Animation], id: ClipId) -> Result<&Animation, ArmError> {
    clips.get(id.0).ok_or_else(|| {
        error!("clip {} not found", id.0);
        ArmError::UnknownClip(id.0)
    })
}
