//! Input assembly: method spans, permission vectors and batch padding.
//!
//! Feature extraction itself (opcode embedding, convolution) happens upstream;
//! this module only shapes what the model consumes.

pub mod batch;
pub mod permissions;
pub mod spans;
