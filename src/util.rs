/// A module of utility functions for transforms
use nalgebra_glm as glm;

/// Composes a local transform matrix from translation, rotation and scale.
/// Vertices are scaled first, then rotated, then translated.
#[must_use]
pub fn compose(t: &glm::Vec3, r: &glm::Quat, s: &glm::Vec3) -> glm::Mat4 {
    glm::translation(t) * glm::quat_to_mat4(r) * glm::scaling(s)
}

/// Inverse of `compose` built from the inverted parts, which avoids a general
/// 4x4 inversion. Zero scale components must be rejected by the caller.
#[must_use]
pub fn inverse_compose(
    t: &glm::Vec3,
    r: &glm::Quat,
    s: &glm::Vec3,
) -> glm::Mat4 {
    let inv_s = glm::vec3(1.0 / s.x, 1.0 / s.y, 1.0 / s.z);
    glm::scaling(&inv_s)
        * glm::quat_to_mat4(&glm::quat_inverse(r))
        * glm::translation(&-t)
}

/// Extracts the translation column of a transform matrix
#[must_use]
pub fn translation_of(m: &glm::Mat4) -> glm::Vec3 {
    glm::vec3(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}
