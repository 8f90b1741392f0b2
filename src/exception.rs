//! Throw-site and catch-site resolution for exception events.
//!
//! A stack is a slice of frames, innermost first. The throw site is the
//! innermost frame that is not runtime-internal (the runtime's own throw
//! helpers sit above the frame that really raised the exception). The catch
//! site is the first frame, at or below the throw site, with a handler for
//! the exception; none means uncaught.
//!
//! The two sites are found by independent walks. Callers keep the stack
//! stable across both, see [`crate::safepoint::Safepoints::disable`].

use crate::breakpoints::MethodId;
use crate::sys::jvmti::jlocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub method: MethodId,
    pub location: jlocation,
    /// Frame of runtime-internal code.
    pub internal: bool,
    /// Location of the handler that catches the exception in flight, if this
    /// frame has one.
    pub handler: Option<jlocation>,
}

impl Frame {
    pub fn new(method: MethodId, location: jlocation) -> Frame {
        Frame { method, location, internal: false, handler: None }
    }

    pub fn internal(mut self) -> Frame {
        self.internal = true;
        self
    }

    pub fn catching_at(mut self, handler: jlocation) -> Frame {
        self.handler = Some(handler);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionSite {
    pub method: MethodId,
    pub location: jlocation,
    pub catch: Option<(MethodId, jlocation)>,
}

fn throw_frame(stack: &[Frame]) -> Option<usize> {
    stack.iter().position(|f| !f.internal)
}

fn catch_frame(stack: &[Frame], throw_depth: usize) -> Option<(MethodId, jlocation)> {
    stack
        .iter()
        .enumerate()
        .skip_while(|(depth, _)| *depth < throw_depth)
        .find_map(|(_, f)| f.handler.map(|h| (f.method, h)))
}

/// Resolves both sites. `None` if every frame is internal.
pub fn resolve(stack: &[Frame]) -> Option<ExceptionSite> {
    let depth = throw_frame(stack)?;
    let thrower = stack[depth];
    Some(ExceptionSite {
        method: thrower.method,
        location: thrower.location,
        catch: catch_frame(stack, depth),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_internal_frames_to_find_the_thrower() {
        let stack = [
            Frame::new(MethodId(90), 3).internal(),
            Frame::new(MethodId(1), 12),
            Frame::new(MethodId(2), 40).catching_at(44),
        ];
        let site = resolve(&stack).unwrap();
        assert_eq!((site.method, site.location), (MethodId(1), 12));
        assert_eq!(site.catch, Some((MethodId(2), 44)));
    }

    #[test]
    fn handlers_above_the_throw_site_do_not_count() {
        let stack = [
            Frame::new(MethodId(90), 3).internal().catching_at(5),
            Frame::new(MethodId(1), 12),
        ];
        assert_eq!(resolve(&stack).unwrap().catch, None);
    }

    #[test]
    fn thrower_may_catch_its_own_exception() {
        let stack = [Frame::new(MethodId(1), 12).catching_at(20)];
        assert_eq!(resolve(&stack).unwrap().catch, Some((MethodId(1), 20)));
    }

    #[test]
    fn all_internal_stack_has_no_site() {
        assert_eq!(resolve(&[Frame::new(MethodId(9), 0).internal()]), None);
        assert_eq!(resolve(&[]), None);
    }
}
