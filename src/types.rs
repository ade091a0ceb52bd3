use std::fmt;

/// Opaque handle for a live, animating character
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(pub(crate) u32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "character.{}", self.0)
    }
}

/// Index of a skeleton and its clip store in an `Animator`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SkinId(pub usize);

/// Index of a clip within one skin's clip store
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClipId(pub usize);

/// Index of a task within one character's animation track
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

/// Ways of naming a joint from gameplay code. `Index` is the original (file)
/// index, the same one used for palette entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JointRef {
    Name(String),
    Index(usize),
}

impl From<&str> for JointRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for JointRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for JointRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}
