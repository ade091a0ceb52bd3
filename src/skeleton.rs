mod builder;
mod types;

// Re-exports
pub use {
    builder::{JointDesc, SkeletonBuilder},
    types::{Joint, Skeleton},
};
