use crate::util;
use ahash::HashMap;
use nalgebra_glm as glm;
use smallvec::SmallVec;

/// One joint of a skeleton
///
/// Joints live in the skeleton's hierarchy arena, so `parent` and `children`
/// are hierarchy indices. `original_index` is the joint's position in the
/// source file's flat joint array. Mesh vertices reference joints by that
/// index so it is also the index used for palette entries.
///
/// `root_offset` is the model space transform a root joint sits under, for
/// example a node above the skeleton in a glTF scene. It is the identity for
/// every joint that has a parent.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub children: SmallVec<[usize; 4]>,
    pub inverse_bind: glm::Mat4,
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
    pub root_offset: glm::Mat4,
    pub original_index: usize,
}

impl Joint {
    /// Local bind pose transform
    #[must_use]
    pub fn local_bind(&self) -> glm::Mat4 {
        util::compose(&self.translation, &self.rotation, &self.scale)
    }
}

/// A joint hierarchy with its bind pose
///
/// There are two index spaces. The hierarchy index is the position in
/// `joints`, which is in pre-order so a parent always comes before its
/// children. The original index is the file order. The mapping between the
/// two is built once by `SkeletonBuilder` and never changes.
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub(super) name: String,
    pub(super) joints: Vec<Joint>,
    pub(super) roots: Vec<usize>,
    pub(super) name_to_index: HashMap<String, usize>,
    pub(super) original_to_hierarchy: Vec<usize>,
}

impl Skeleton {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// All joints in hierarchy order
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Gets a joint by hierarchy index
    #[must_use]
    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// Hierarchy indices of the root joints
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Finds the hierarchy index of a joint by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Converts an original (file) index to a hierarchy index
    #[must_use]
    pub fn hierarchy_index(&self, original_index: usize) -> Option<usize> {
        self.original_to_hierarchy.get(original_index).copied()
    }

    /// Gets a joint by original (file) index
    #[must_use]
    pub fn by_original(&self, original_index: usize) -> Option<&Joint> {
        self.hierarchy_index(original_index)
            .and_then(|index| self.joints.get(index))
    }
}
