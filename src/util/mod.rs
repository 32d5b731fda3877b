//! General-purpose containers that are not specific to class files

mod offset_vec;
mod ref_id;

pub use offset_vec::{Offset, OffsetVec, Width};
pub use ref_id::RefId;
