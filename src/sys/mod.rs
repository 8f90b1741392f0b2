//! Raw C ABI types shared with agents.
//!
//! Nothing in here has behaviour beyond bit twiddling; the rest of the crate
//! gives these types their meaning.

pub mod jni;
pub mod jvmti;
