use super::types::{Joint, Skeleton};
use crate::{
    arm_error::{ArmError, ContentError},
    util,
};
use ahash::{HashMap, HashMapExt};
use log::{debug, error};
use nalgebra_glm as glm;
use smallvec::SmallVec;

/// Smallest bind pose scale component that can be inverted
const SCALE_EPSILON: f32 = 1.0e-6;

/// Description of one joint as it appears in the source file. `parent` is
/// the parent's original (file) index.
#[derive(Clone, Debug)]
pub struct JointDesc {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
    pub root_offset: glm::Mat4,
    pub inverse_bind: Option<glm::Mat4>,
}

impl JointDesc {
    /// Creates a joint with an identity bind pose
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            translation: glm::Vec3::zeros(),
            rotation: glm::Quat::identity(),
            scale: glm::vec3(1.0, 1.0, 1.0),
            root_offset: glm::Mat4::identity(),
            inverse_bind: None,
        }
    }

    #[must_use]
    pub fn translation(mut self, translation: glm::Vec3) -> Self {
        self.translation = translation;
        self
    }

    #[must_use]
    pub fn rotation(mut self, rotation: glm::Quat) -> Self {
        self.rotation = glm::quat_normalize(&rotation);
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: glm::Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Places a root joint under a fixed model space transform. Ignored for
    /// a joint with a parent.
    #[must_use]
    pub fn root_offset(mut self, root_offset: glm::Mat4) -> Self {
        self.root_offset = root_offset;
        self
    }

    /// Uses an inverse bind matrix from the source instead of computing one
    /// from the bind pose
    #[must_use]
    pub fn inverse_bind(mut self, inverse_bind: glm::Mat4) -> Self {
        self.inverse_bind = Some(inverse_bind);
        self
    }
}

/// Collects joints in file order and builds an immutable `Skeleton`
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuilder {
    name: String,
    joints: Vec<JointDesc>,
}

impl SkeletonBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            joints: Vec::new(),
        }
    }

    /// Adds a joint. Returns the original (file) index it was given.
    pub fn push(&mut self, joint: JointDesc) -> usize {
        self.joints.push(joint);
        self.joints.len() - 1
    }

    /// Chaining version of `push`
    #[must_use]
    pub fn joint(mut self, joint: JointDesc) -> Self {
        self.push(joint);
        self
    }

    /// Validates the joints, orders them into the hierarchy arena and
    /// computes the inverse bind matrices.
    ///
    /// # Errors
    /// Returns `ContentError` wrapped in `ArmError` for an empty skeleton,
    /// duplicate names, bad parent indices, parent cycles, zero scale or a
    /// root offset that can not be inverted.
    pub fn build(self) -> Result<Skeleton, ArmError> {
        let count = self.joints.len();
        if count == 0 {
            error!("skeleton {} has no joints", self.name);
            return Err(ContentError::EmptySkeleton.into());
        }

        let mut name_check = HashMap::<&str, usize>::with_capacity(count);
        let mut children_of: Vec<SmallVec<[usize; 4]>> =
            vec![SmallVec::new(); count];
        let mut file_roots = Vec::new();
        for (index, desc) in self.joints.iter().enumerate() {
            if name_check.insert(desc.name.as_str(), index).is_some() {
                error!("skeleton {} repeats joint {}", self.name, desc.name);
                return Err(
                    ContentError::DuplicateJointName(desc.name.clone()).into()
                );
            }
            if desc.scale.iter().any(|s| s.abs() < SCALE_EPSILON) {
                error!("joint {} has zero scale", desc.name);
                return Err(
                    ContentError::DegenerateScale(desc.name.clone()).into()
                );
            }
            match desc.parent {
                Some(parent) if parent >= count || parent == index => {
                    error!("joint {} has bad parent {}", desc.name, parent);
                    return Err(ContentError::InvalidParent {
                        joint: desc.name.clone(),
                        parent,
                    }
                    .into());
                }
                Some(parent) => children_of[parent].push(index),
                None => file_roots.push(index),
            }
        }

        // Pre-order walk from each root. Children are pushed in reverse so
        // they are visited in file order.
        let mut order = Vec::with_capacity(count);
        let mut stack: Vec<usize> = file_roots.iter().rev().copied().collect();
        while let Some(file_index) = stack.pop() {
            order.push(file_index);
            stack.extend(children_of[file_index].iter().rev());
        }

        // With valid parent indices, anything not reached from a root must
        // be on a cycle
        let mut original_to_hierarchy = vec![usize::MAX; count];
        for (hierarchy_index, file_index) in order.iter().enumerate() {
            original_to_hierarchy[*file_index] = hierarchy_index;
        }
        if let Some(lost) =
            original_to_hierarchy.iter().position(|x| *x == usize::MAX)
        {
            let name = self.joints[lost].name.clone();
            error!("joint {} is not reachable from a root", name);
            return Err(ContentError::CyclicHierarchy(name).into());
        }

        // Parents come first in `order` so their inverse bind is ready by
        // the time a child needs it
        let mut joints: Vec<Joint> = Vec::with_capacity(count);
        for file_index in &order {
            let desc = &self.joints[*file_index];
            let parent = desc.parent.map(|p| original_to_hierarchy[p]);
            let root_offset = if parent.is_some() {
                glm::Mat4::identity()
            } else {
                desc.root_offset
            };
            let parent_inverse = match parent {
                Some(p) => joints[p].inverse_bind,
                None => root_offset.try_inverse().ok_or_else(|| {
                    error!("joint {} has a degenerate root offset", desc.name);
                    ContentError::DegenerateScale(desc.name.clone())
                })?,
            };
            let inverse_bind = desc.inverse_bind.unwrap_or_else(|| {
                util::inverse_compose(
                    &desc.translation,
                    &desc.rotation,
                    &desc.scale,
                ) * parent_inverse
            });
            joints.push(Joint {
                name: desc.name.clone(),
                parent,
                children: children_of[*file_index]
                    .iter()
                    .map(|c| original_to_hierarchy[*c])
                    .collect(),
                inverse_bind,
                translation: desc.translation,
                rotation: desc.rotation,
                scale: desc.scale,
                root_offset,
                original_index: *file_index,
            });
        }

        let name_to_index = joints
            .iter()
            .enumerate()
            .map(|(index, joint)| (joint.name.clone(), index))
            .collect();
        let roots = file_roots
            .iter()
            .map(|r| original_to_hierarchy[*r])
            .collect::<Vec<_>>();
        debug!(
            "skeleton {} has {} joints and {} roots",
            self.name,
            count,
            roots.len()
        );

        Ok(Skeleton {
            name: self.name,
            joints,
            roots,
            name_to_index,
            original_to_hierarchy,
        })
    }
}
