//! Individual value generators used to build items.

pub mod prefix;
pub mod uuid;
