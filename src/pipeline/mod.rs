//! The four stages of the job, run exactly once each, in order:
//! extract, transform, load, validate.

pub mod extract;
pub mod load;
pub mod transform;
pub mod validate;
