//! Common imports for embedding the core and writing in-process agents.
//!
//! This prelude is intentionally small. It covers the types most embedders
//! touch while avoiding over-broad re-exports.

pub use crate::config::Config;
pub use crate::core::JvmtiCore;
pub use crate::env::EnvId;
pub use crate::error::JvmtiResult;
pub use crate::events::EventKind;
pub use crate::heap::ObjectRef;
pub use crate::sys::{jni, jvmti};
pub use crate::sys::jvmti::jvmtiError;
pub use crate::{Capability, EventHandler, MethodId};
