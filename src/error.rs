//! Error types.
//!
//! Every entry point reports failure as a [`jvmtiError`] code, the same type
//! agents see across the C boundary. Failures that never cross that boundary
//! (managed heap refusals, configuration, agent library loading) get their
//! own `thiserror` enums and convert into a code where they can surface
//! through an entry point.

use std::fmt;

use crate::sys::jni::jint;
use crate::sys::jvmti::{jvmtiError, JVMTI_ERROR_MAX};

/// Result of a core operation.
pub type JvmtiResult<T> = Result<T, jvmtiError>;

impl fmt::Display for jvmtiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl std::error::Error for jvmtiError {}

/// `GetErrorName`: canonical name for a numeric code.
///
/// Codes outside `0..=JVMTI_ERROR_MAX`, and unassigned codes inside that
/// range, are rejected with `ILLEGAL_ARGUMENT`.
pub fn get_error_name(code: jint) -> JvmtiResult<&'static str> {
    if !(0..=JVMTI_ERROR_MAX).contains(&code) {
        return Err(jvmtiError::ILLEGAL_ARGUMENT);
    }
    jvmtiError::from_code(code)
        .map(jvmtiError::name)
        .ok_or(jvmtiError::ILLEGAL_ARGUMENT)
}

/// Refusals from the managed heap model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("allocation is disabled on this thread")]
    AllocationDisabled,
    #[error("object {0:#x} is not a class")]
    NotAClass(u64),
}

impl From<HeapError> for jvmtiError {
    fn from(err: HeapError) -> jvmtiError {
        match err {
            HeapError::AllocationDisabled => jvmtiError::OUT_OF_MEMORY,
            HeapError::NotAClass(_) => jvmtiError::INVALID_CLASS,
        }
    }
}

/// Problems in an agent option string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown option `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for option `{key}`")]
    InvalidValue { key: String, value: String },
    #[error("option `{0}` is missing `=value`")]
    MissingValue(String),
    #[error("option `{key}` is {value}, above the limit of {max}")]
    CapacityTooLarge { key: String, value: usize, max: usize },
}

/// Failure to bring up a native agent library.
#[cfg(feature = "agents")]
#[derive(Debug, thiserror::Error)]
pub enum AgentLoadError {
    #[error("failed to load agent library {path}")]
    Library {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("agent library {path} does not export Agent_OnLoad")]
    MissingEntryPoint {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("agent options for {path} contain an interior NUL byte")]
    InvalidOptions { path: std::path::PathBuf },
    #[error("Agent_OnLoad in {path} returned {code}")]
    Rejected { path: std::path::PathBuf, code: jint },
    #[error("agents can only be loaded during the OnLoad phase")]
    WrongPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_names_are_canonical() {
        assert_eq!(get_error_name(0), Ok("JVMTI_ERROR_NONE"));
        assert_eq!(get_error_name(112), Ok("JVMTI_ERROR_WRONG_PHASE"));
        assert_eq!(get_error_name(116), Ok("JVMTI_ERROR_INVALID_ENVIRONMENT"));
    }

    #[test]
    fn out_of_range_and_unassigned_codes_are_illegal() {
        assert_eq!(get_error_name(-1), Err(jvmtiError::ILLEGAL_ARGUMENT));
        assert_eq!(get_error_name(117), Err(jvmtiError::ILLEGAL_ARGUMENT));
        assert_eq!(get_error_name(1), Err(jvmtiError::ILLEGAL_ARGUMENT));
    }

    #[test]
    fn every_code_round_trips_through_its_number() {
        for &e in jvmtiError::ALL {
            assert_eq!(jvmtiError::from_code(e.code()), Some(e));
        }
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(jvmtiError::DUPLICATE.to_string(), "JVMTI_ERROR_DUPLICATE (40)");
    }
}
