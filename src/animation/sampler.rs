use super::types::{Channel, Interpolation};
use crate::arm_error::ArmError;
use itertools::Itertools;
use nalgebra_glm as glm;

/// Above this dot product two rotations are treated as parallel and blended
/// with normalized linear interpolation
const NEARLY_PARALLEL: f32 = 0.9995;

/// A value that can be stored in a channel and interpolated
pub trait Keyable: Copy {
    /// Called once per value when a channel is created
    #[must_use]
    fn prepare(self) -> Self {
        self
    }

    /// Interpolates from `self` to `other`, `t` in `[0, 1]`
    #[must_use]
    fn interpolate(&self, other: &Self, t: f32) -> Self;
}

impl Keyable for glm::Vec3 {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        lerp(self, other, t)
    }
}

impl Keyable for glm::Quat {
    fn prepare(self) -> Self {
        glm::quat_normalize(&self)
    }

    fn interpolate(&self, other: &Self, t: f32) -> Self {
        slerp(self, other, t)
    }
}

/// Linear interpolation, `v0 + t * (v1 - v0)`
#[must_use]
pub fn lerp(v0: &glm::Vec3, v1: &glm::Vec3, t: f32) -> glm::Vec3 {
    v0 + (v1 - v0) * t
}

/// Spherical linear interpolation along the shorter arc
///
/// The end points are returned exactly. Nearly parallel rotations fall back
/// to normalized linear interpolation, which avoids dividing by a sine close
/// to zero.
#[must_use]
pub fn slerp(q0: &glm::Quat, q1: &glm::Quat, t: f32) -> glm::Quat {
    if t <= 0.0 {
        return *q0;
    }
    if t >= 1.0 {
        return *q1;
    }

    let mut dot = glm::quat_dot(q0, q1);
    let mut end = *q1;
    if dot < 0.0 {
        end = -end;
        dot = -dot;
    }

    if dot > NEARLY_PARALLEL {
        return glm::quat_normalize(&(*q0 * (1.0 - t) + end * t));
    }

    let theta = dot.min(1.0).acos();
    let sin_theta = theta.sin();
    let w0 = ((1.0 - t) * theta).sin() / sin_theta;
    let w1 = (t * theta).sin() / sin_theta;
    glm::quat_normalize(&(*q0 * w0 + end * w1))
}

/// Finds the keyframe pair surrounding `time`
///
/// A time before the first key gives the first pair. A time equal to the
/// last key gives the last pair.
///
/// # Errors
/// Returns `ArmError::OutOfRange` if there are fewer than two keys or `time`
/// is past the last key (or not a number).
pub fn find_bracket(
    times: &[f32],
    time: f32,
) -> Result<(usize, usize), ArmError> {
    let last = times.last().copied().unwrap_or(0.0);
    if times.len() < 2 {
        return Err(ArmError::OutOfRange { time, last });
    }
    if time < times[0] {
        return Ok((0, 1));
    }
    for (i, (start, end)) in times.iter().tuple_windows().enumerate() {
        if *start <= time && time < *end {
            return Ok((i, i + 1));
        }
    }
    // Only equality with the last key is left
    if time <= last {
        return Ok((times.len() - 2, times.len() - 1));
    }
    Err(ArmError::OutOfRange { time, last })
}

/// Calculates the interpolation parameter within one segment. A segment of
/// zero length snaps to its later key.
fn segment_weight(start: f32, end: f32, current: f32) -> f32 {
    let span = end - start;
    if span <= 0.0 {
        return 1.0;
    }
    ((current - start) / span).clamp(0.0, 1.0)
}

/// Samples a channel at `time`
///
/// `default` is returned for a channel that is not animated, which is how a
/// joint without keys keeps its bind pose. Before the first key the first
/// value is held and after the last key the last value is held.
#[must_use]
pub fn sample<T: Keyable>(channel: &Channel<T>, time: f32, default: T) -> T {
    if !channel.is_valid() {
        return default;
    }
    let times = channel.times();
    let values = channel.values();
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return default;
    };
    if values.len() == 1 || time >= channel.last_time() {
        return *last;
    }

    let Ok((i, j)) = find_bracket(times, time) else {
        // Not a number
        return *first;
    };
    match channel.interpolation() {
        Interpolation::Step => values[i],
        Interpolation::Linear => values[i].interpolate(
            &values[j],
            segment_weight(times[i], times[j], time),
        ),
    }
}
