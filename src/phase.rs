//! The VM execution phase.
//!
//! ```text
//! ONLOAD ──▶ PRIMORDIAL ──▶ START ──▶ LIVE ──▶ DEAD
//! ```
//!
//! The phase only moves forward. Internally each phase is one bit so that
//! entry points and events can declare the set of phases they are legal in as
//! a mask; externally (`GetPhase`) START is reported as `JVMTI_PHASE_START`,
//! whose value is not a single bit.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::JvmtiResult;
use crate::sys::jni::jint;
use crate::sys::jvmti::{self, jvmtiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    OnLoad = 0,
    Primordial = 1,
    Start = 2,
    Live = 3,
    Dead = 4,
}

impl Phase {
    const ORDER: [Phase; 5] = [Phase::OnLoad, Phase::Primordial, Phase::Start, Phase::Live, Phase::Dead];

    /// Internal mask bit.
    pub const fn bit(self) -> u8 {
        match self {
            Phase::OnLoad => 0x01,
            Phase::Primordial => 0x02,
            Phase::Live => 0x04,
            Phase::Dead => 0x08,
            Phase::Start => 0x10,
        }
    }

    /// The value reported to agents by `GetPhase`.
    pub const fn external(self) -> jint {
        match self {
            Phase::OnLoad => jvmti::JVMTI_PHASE_ONLOAD,
            Phase::Primordial => jvmti::JVMTI_PHASE_PRIMORDIAL,
            Phase::Start => jvmti::JVMTI_PHASE_START,
            Phase::Live => jvmti::JVMTI_PHASE_LIVE,
            Phase::Dead => jvmti::JVMTI_PHASE_DEAD,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Phase::OnLoad => "ONLOAD",
            Phase::Primordial => "PRIMORDIAL",
            Phase::Start => "START",
            Phase::Live => "LIVE",
            Phase::Dead => "DEAD",
        }
    }

    fn from_ordinal(ordinal: u8) -> Phase {
        Phase::ORDER[usize::from(ordinal).min(Phase::ORDER.len() - 1)]
    }
}

/// A set of phases, as a mask of [`Phase::bit`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseSet(u8);

impl PhaseSet {
    pub const ANY: PhaseSet = PhaseSet(0x1f);
    pub const ONLOAD: PhaseSet = PhaseSet::of(&[Phase::OnLoad]);
    pub const PRIMORDIAL: PhaseSet = PhaseSet::of(&[Phase::Primordial]);
    pub const START: PhaseSet = PhaseSet::of(&[Phase::Start]);
    pub const LIVE: PhaseSet = PhaseSet::of(&[Phase::Live]);
    pub const ONLOAD_LIVE: PhaseSet = PhaseSet::of(&[Phase::OnLoad, Phase::Live]);
    pub const START_LIVE: PhaseSet = PhaseSet::of(&[Phase::Start, Phase::Live]);
    pub const RUNNING: PhaseSet = PhaseSet::of(&[Phase::Primordial, Phase::Start, Phase::Live]);

    pub const fn of(phases: &[Phase]) -> PhaseSet {
        let mut mask = 0;
        let mut i = 0;
        while i < phases.len() {
            mask |= phases[i].bit();
            i += 1;
        }
        PhaseSet(mask)
    }

    pub const fn contains(self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }
}

/// The single global phase variable.
///
/// Reads are unsynchronized apart from the atomic itself: a caller may act on
/// a value that is one transition stale, which the protocol tolerates since
/// the phase never moves backwards.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub const fn new() -> PhaseCell {
        PhaseCell(AtomicU8::new(Phase::OnLoad as u8))
    }

    pub fn get(&self) -> Phase {
        Phase::from_ordinal(self.0.load(Ordering::Acquire))
    }

    /// Moves forward to `to`. Returns the previous phase; a request to move
    /// backwards leaves the phase unchanged.
    pub fn advance(&self, to: Phase) -> Phase {
        let previous = Phase::from_ordinal(self.0.fetch_max(to as u8, Ordering::AcqRel));
        if previous < to {
            tracing::debug!(from = previous.name(), to = to.name(), "phase transition");
        }
        previous
    }

    /// `WRONG_PHASE` unless the current phase is in `legal`.
    pub fn check(&self, legal: PhaseSet) -> JvmtiResult<Phase> {
        let phase = self.get();
        if legal.contains(phase) {
            Ok(phase)
        } else {
            Err(jvmtiError::WRONG_PHASE)
        }
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        PhaseCell::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_only_moves_forward() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), Phase::OnLoad);
        cell.advance(Phase::Live);
        assert_eq!(cell.advance(Phase::Start), Phase::Live);
        assert_eq!(cell.get(), Phase::Live);
    }

    #[test]
    fn start_is_reported_under_its_legacy_value() {
        assert_eq!(Phase::Start.external(), 6);
        assert_ne!(Phase::Start.external(), i32::from(Phase::Start.bit()));
        assert_eq!(Phase::Live.external(), 4);
    }

    #[test]
    fn check_rejects_phases_outside_the_set() {
        let cell = PhaseCell::new();
        assert_eq!(cell.check(PhaseSet::LIVE), Err(jvmtiError::WRONG_PHASE));
        assert_eq!(cell.check(PhaseSet::ONLOAD_LIVE), Ok(Phase::OnLoad));
        cell.advance(Phase::Start);
        assert!(cell.check(PhaseSet::ONLOAD_LIVE).is_err());
        assert!(cell.check(PhaseSet::START_LIVE).is_ok());
    }
}
