use crate::{animation::Animation, skeleton::Skeleton};
use serde::{Deserialize, Serialize};

/// Options for importing a character
///
/// `swizzle` converts from glTF's +Y up to +Z up. `scale` is applied
/// uniformly to positions. With `file_inverse_bind` the inverse bind matrices
/// stored in the file are used instead of ones computed from the bind pose.
/// With `single_input` every channel of an animation must share one time
/// input.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ImportOptions {
    pub scale: f32,
    pub swizzle: bool,
    pub file_inverse_bind: bool,
    pub single_input: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0f32,
            swizzle: false,
            file_inverse_bind: false,
            single_input: true,
        }
    }
}

/// A skeleton and the clips that were loaded with it
#[derive(Clone, Debug)]
pub struct Character {
    pub skeleton: Skeleton,
    pub animations: Vec<Animation>,
}

/// Errors specific to importing data. `ArmError` has a `From` trait to
/// handle these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    NoSkin,
    MultipleSkins(usize),
    NoInverseBind,
    InverseBindCount { joints: usize, matrices: usize },
    MultipleInputs(String),
    SparseAnimation,
    NoSampler,
    Morphing,
    NoNodeInfo(usize),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NoSkin => write!(f, "a skin is required for a character"),
            Self::MultipleSkins(a) => {
                write!(f, "only one skin is supported but there are {a}")
            }
            Self::NoInverseBind => {
                write!(f, "the skin has no inverse bind matrices")
            }
            Self::InverseBindCount { joints, matrices } => write!(
                f,
                "the skin has {joints} joints but {matrices} inverse binds"
            ),
            Self::MultipleInputs(a) => write!(
                f,
                "animation \"{a}\" has more than one time input"
            ),
            Self::SparseAnimation => {
                write!(f, "sparse animation data is not supported")
            }
            Self::NoSampler => {
                write!(f, "a sampler is required for animation")
            }
            Self::Morphing => {
                write!(f, "morphing animation is not supported")
            }
            Self::NoNodeInfo(a) => write!(f, "node {a} has missing info"),
        }
    }
}
