use std::{error, fmt};

/// Unified error type
///
/// Content problems (bad skeletons, malformed keyframe data, clips that do
/// not cover a skeleton) are reported through `ContentError`. glTF specific
/// problems are reported through `ImportError`. Both stop loading.
///
/// Some foreign error types are very large so are boxed.
#[derive(Debug)]
pub enum ArmError {
    OutOfRange { time: f32, last: f32 },
    MissingChannel { clip: String, joint: String },
    UnknownCharacter(u32),
    CharacterIdsExhausted,
    UnknownSkin(usize),
    UnknownClip(usize),
    UnknownClipName(String),
    UnknownTask(usize),
    UnknownJoint(String),
    JointIndexOutOfRange(usize),
    UnsupportedBlendMode,
    PoseNotReady,
    Content(ContentError),
    StdIoError(std::io::Error),
    SerdeYamlError(Box<serde_yaml::Error>),
    GltfError(Box<gltf::Error>),
    ImportError(crate::import::ImportError),
}

impl error::Error for ArmError {}

impl fmt::Display for ArmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OutOfRange { time, last } => {
                write!(f, "time {time} is past the last keyframe at {last}")
            }
            Self::MissingChannel { clip, joint } => {
                write!(f, "clip \"{clip}\" has no frame for joint \"{joint}\"")
            }
            Self::UnknownCharacter(a) => write!(f, "unknown character {a}"),
            Self::CharacterIdsExhausted => {
                write!(f, "no character ids left")
            }
            Self::UnknownSkin(a) => write!(f, "unknown skin {a}"),
            Self::UnknownClip(a) => write!(f, "unknown clip {a}"),
            Self::UnknownClipName(a) => write!(f, "unknown clip \"{a}\""),
            Self::UnknownTask(a) => write!(f, "unknown task {a}"),
            Self::UnknownJoint(a) => write!(f, "unknown joint \"{a}\""),
            Self::JointIndexOutOfRange(a) => {
                write!(f, "joint index {a} is out of range")
            }
            Self::UnsupportedBlendMode => {
                write!(f, "2D blending is not supported")
            }
            Self::PoseNotReady => {
                write!(f, "pose has not been evaluated for this frame")
            }
            Self::Content(e) => write!(f, "content error: {e}"),
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
            Self::SerdeYamlError(e) => {
                write!(f, "serde_yaml::Error: {e}")
            }
            Self::GltfError(e) => write!(f, "gltf Error: {e}"),
            Self::ImportError(e) => write!(f, "import error: {e}"),
        }
    }
}

/// Errors for malformed or incomplete animation content. `ArmError` has a
/// `From` trait to handle these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    EmptySkeleton,
    DuplicateJointName(String),
    InvalidParent { joint: String, parent: usize },
    CyclicHierarchy(String),
    DegenerateScale(String),
    CountMismatch { times: usize, values: usize },
    EmptyChannel,
    UnsortedKeyframes(usize),
    NonFiniteKeyframe(usize),
    DuplicateFrame(String),
    DuplicateClipName(String),
    SkeletonMismatch { clip: String, skeleton: String },
    EmptyTask,
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptySkeleton => {
                write!(f, "skeleton must have at least one joint")
            }
            Self::DuplicateJointName(a) => {
                write!(f, "joint name \"{a}\" is used more than once")
            }
            Self::InvalidParent { joint, parent } => {
                write!(f, "joint \"{joint}\" has invalid parent {parent}")
            }
            Self::CyclicHierarchy(a) => {
                write!(f, "joint \"{a}\" is part of a parent cycle")
            }
            Self::DegenerateScale(a) => {
                write!(f, "joint \"{a}\" has a zero bind pose scale")
            }
            Self::CountMismatch { times, values } => write!(
                f,
                "channel has {times} keyframe times but {values} values"
            ),
            Self::EmptyChannel => {
                write!(f, "an animated channel needs at least one keyframe")
            }
            Self::UnsortedKeyframes(a) => {
                write!(f, "keyframe {a} is not later than the one before it")
            }
            Self::NonFiniteKeyframe(a) => {
                write!(f, "keyframe {a} has a time that is not finite")
            }
            Self::DuplicateFrame(a) => {
                write!(f, "joint \"{a}\" has more than one frame in a clip")
            }
            Self::DuplicateClipName(a) => {
                write!(f, "clip name \"{a}\" is used more than once")
            }
            Self::SkeletonMismatch { clip, skeleton } => write!(
                f,
                "clip \"{clip}\" was not built for skeleton \"{skeleton}\""
            ),
            Self::EmptyTask => {
                write!(f, "an animation task needs at least one clip")
            }
        }
    }
}

impl From<ContentError> for ArmError {
    fn from(e: ContentError) -> Self {
        Self::Content(e)
    }
}

impl From<std::io::Error> for ArmError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl From<serde_yaml::Error> for ArmError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::SerdeYamlError(Box::new(e))
    }
}

impl From<gltf::Error> for ArmError {
    fn from(e: gltf::Error) -> Self {
        Self::GltfError(Box::new(e))
    }
}

impl From<crate::import::ImportError> for ArmError {
    fn from(e: crate::import::ImportError) -> Self {
        Self::ImportError(e)
    }
}
