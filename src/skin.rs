use crate::{arm_error::ArmError, skeleton::Skeleton};
use log::error;
use nalgebra_glm as glm;

/// A palette of 4x4 matrices, one per joint, indexed by original (file)
/// joint index
///
/// The same buffer is reused every frame. Resizing keeps the allocation when
/// the joint count does not grow.
#[derive(Clone, Debug, Default)]
pub struct SkinningMatrices {
    matrices: Vec<glm::Mat4>,
}

impl SkinningMatrices {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            matrices: Vec::new(),
        }
    }

    /// Creates a palette of identity matrices
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        Self {
            matrices: vec![glm::Mat4::identity(); count],
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.matrices.len()
    }

    /// Sets every entry to identity and resizes to `count`
    pub fn reset(&mut self, count: usize) {
        self.matrices.clear();
        self.matrices.resize(count, glm::Mat4::identity());
    }

    #[must_use]
    pub fn as_slice(&self) -> &[glm::Mat4] {
        &self.matrices
    }

    pub fn as_mut_slice(&mut self) -> &mut [glm::Mat4] {
        &mut self.matrices
    }

    /// Gets one entry by original joint index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&glm::Mat4> {
        self.matrices.get(index)
    }

    /// Raw column major `f32` data, ready for a uniform or storage buffer
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    /// Copies the palette into plain column major arrays
    #[must_use]
    pub fn to_arrays(&self) -> Vec<[[f32; 4]; 4]> {
        self.matrices.iter().map(|m| (*m).into()).collect()
    }
}

/// Calculates skinning matrices from an evaluated pose
///
/// For every joint `out[i] = pose[i] * inverse_bind`, where `i` is the
/// joint's original index. `out` is resized to the joint count first so no
/// entry from an earlier skeleton survives.
///
/// # Errors
/// Returns `ArmError::PoseNotReady` if `pose` does not have one entry per
/// joint.
pub fn export(
    skeleton: &Skeleton,
    pose: &SkinningMatrices,
    out: &mut SkinningMatrices,
) -> Result<(), ArmError> {
    if pose.count() != skeleton.joint_count() {
        error!(
            "pose has {} matrices but skeleton {} has {} joints",
            pose.count(),
            skeleton.name(),
            skeleton.joint_count()
        );
        return Err(ArmError::PoseNotReady);
    }
    out.reset(skeleton.joint_count());
    let slots = out.as_mut_slice();
    for joint in skeleton.joints() {
        let index = joint.original_index;
        if let (Some(slot), Some(world)) =
            (slots.get_mut(index), pose.get(index))
        {
            *slot = world * joint.inverse_bind;
        }
    }
    Ok(())
}
