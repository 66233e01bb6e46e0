/// Filesystem record loader.
pub mod fs;
