pub mod common;
pub mod hierarchy;

pub use common::*;
pub use hierarchy::*;
