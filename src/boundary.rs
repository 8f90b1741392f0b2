//! The outermost boundary between agents and the core.
//!
//! Nothing may unwind across it. Every agent-facing entry point of
//! [`JvmtiCore`](crate::core::JvmtiCore) runs through [`guarded`]; a panic
//! anywhere below becomes `INTERNAL`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::JvmtiResult;
use crate::sys::jvmti::jvmtiError;

/// Runs `f`, catching any panic.
pub fn unwind_protected<R>(f: impl FnOnce() -> R) -> Result<R, Box<dyn Any + Send>> {
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Runs an entry point, converting a panic into `INTERNAL`.
pub fn guarded<T>(entry: &'static str, f: impl FnOnce() -> JvmtiResult<T>) -> JvmtiResult<T> {
    match unwind_protected(f) {
        Ok(result) => result,
        Err(payload) => {
            tracing::error!(entry, panic = panic_message(payload.as_ref()), "entry point panicked");
            Err(jvmtiError::INTERNAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_internal() {
        let result: JvmtiResult<()> = guarded("Test", || panic!("boom"));
        assert_eq!(result, Err(jvmtiError::INTERNAL));
    }

    #[test]
    fn errors_and_values_pass_through() {
        assert_eq!(guarded("Test", || Ok(5)), Ok(5));
        assert_eq!(guarded::<()>("Test", || Err(jvmtiError::DUPLICATE)), Err(jvmtiError::DUPLICATE));
    }

    #[test]
    fn panic_messages_are_recovered() {
        let payload = unwind_protected(|| panic!("{}", String::from("owned"))).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
