//! Event kinds and event payloads.
//!
//! [`EventKind`] describes each event id statically: its name, the phases in
//! which the VM may post it, the capability an environment needs before
//! enabling it, and whether it may be enabled for individual threads.
//! [`EventPayload`] is the data one posting carries, one shape per kind.

use std::cell::RefCell;
use std::os::raw::c_char;

use crate::breakpoints::MethodId;
use crate::capabilities::Capability;
use crate::heap::{handle_of_opt, ObjectRef};
use crate::phase::{Phase, PhaseSet};
use crate::sys::jni::{jfieldID, jthread, jvalue};
use crate::sys::jvmti::{self, jlocation, JVMTI_MIN_EVENT_TYPE_VAL};

const ALL: PhaseSet = PhaseSet::RUNNING;
const LIVE: PhaseSet = PhaseSet::LIVE;
const START_LIVE: PhaseSet = PhaseSet::START_LIVE;
const PRIMORDIAL: PhaseSet = PhaseSet::PRIMORDIAL;
const START: PhaseSet = PhaseSet::START;

macro_rules! event_kinds {
    ($($variant:ident = $id:ident, $name:literal, $phases:expr, $cap:expr, $per_thread:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($variant,)*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)*];

            pub const fn id(self) -> u32 {
                match self {
                    $(EventKind::$variant => jvmti::$id,)*
                }
            }

            pub fn from_id(id: u32) -> Option<EventKind> {
                match id {
                    $(x if x == jvmti::$id => Some(EventKind::$variant),)*
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $name,)*
                }
            }

            /// Phases in which the VM may post this event.
            pub const fn legal_phases(self) -> PhaseSet {
                match self {
                    $(EventKind::$variant => $phases,)*
                }
            }

            /// Capability an environment must hold to enable this event.
            pub const fn required_capability(self) -> Option<Capability> {
                match self {
                    $(EventKind::$variant => $cap,)*
                }
            }

            /// Whether the event may be enabled for a single thread.
            pub const fn is_thread_filterable(self) -> bool {
                match self {
                    $(EventKind::$variant => $per_thread,)*
                }
            }
        }
    };
}

event_kinds! {
    VmInit = JVMTI_EVENT_VM_INIT, "VMInit", START, None, false;
    VmDeath = JVMTI_EVENT_VM_DEATH, "VMDeath", LIVE, None, false;
    ThreadStart = JVMTI_EVENT_THREAD_START, "ThreadStart", START_LIVE, None, false;
    ThreadEnd = JVMTI_EVENT_THREAD_END, "ThreadEnd", START_LIVE, None, true;
    ClassFileLoadHook = JVMTI_EVENT_CLASS_FILE_LOAD_HOOK, "ClassFileLoadHook", ALL, None, true;
    ClassLoad = JVMTI_EVENT_CLASS_LOAD, "ClassLoad", START_LIVE, None, true;
    ClassPrepare = JVMTI_EVENT_CLASS_PREPARE, "ClassPrepare", START_LIVE, None, true;
    VmStart = JVMTI_EVENT_VM_START, "VMStart", PRIMORDIAL, None, false;
    Exception = JVMTI_EVENT_EXCEPTION, "Exception", LIVE, Some(Capability::GenerateExceptionEvents), true;
    ExceptionCatch = JVMTI_EVENT_EXCEPTION_CATCH, "ExceptionCatch", LIVE, Some(Capability::GenerateExceptionEvents), true;
    SingleStep = JVMTI_EVENT_SINGLE_STEP, "SingleStep", LIVE, Some(Capability::GenerateSingleStepEvents), true;
    FramePop = JVMTI_EVENT_FRAME_POP, "FramePop", LIVE, Some(Capability::GenerateFramePopEvents), true;
    Breakpoint = JVMTI_EVENT_BREAKPOINT, "Breakpoint", LIVE, Some(Capability::GenerateBreakpointEvents), true;
    FieldAccess = JVMTI_EVENT_FIELD_ACCESS, "FieldAccess", LIVE, Some(Capability::GenerateFieldAccessEvents), true;
    FieldModification = JVMTI_EVENT_FIELD_MODIFICATION, "FieldModification", LIVE, Some(Capability::GenerateFieldModificationEvents), true;
    MethodEntry = JVMTI_EVENT_METHOD_ENTRY, "MethodEntry", LIVE, Some(Capability::GenerateMethodEntryEvents), true;
    MethodExit = JVMTI_EVENT_METHOD_EXIT, "MethodExit", LIVE, Some(Capability::GenerateMethodExitEvents), true;
    NativeMethodBind = JVMTI_EVENT_NATIVE_METHOD_BIND, "NativeMethodBind", ALL, Some(Capability::GenerateNativeMethodBindEvents), true;
    CompiledMethodLoad = JVMTI_EVENT_COMPILED_METHOD_LOAD, "CompiledMethodLoad", LIVE, Some(Capability::GenerateCompiledMethodLoadEvents), false;
    CompiledMethodUnload = JVMTI_EVENT_COMPILED_METHOD_UNLOAD, "CompiledMethodUnload", LIVE, Some(Capability::GenerateCompiledMethodLoadEvents), false;
    DynamicCodeGenerated = JVMTI_EVENT_DYNAMIC_CODE_GENERATED, "DynamicCodeGenerated", ALL, None, false;
    DataDumpRequest = JVMTI_EVENT_DATA_DUMP_REQUEST, "DataDumpRequest", LIVE, None, false;
    MonitorWait = JVMTI_EVENT_MONITOR_WAIT, "MonitorWait", LIVE, Some(Capability::GenerateMonitorEvents), true;
    MonitorWaited = JVMTI_EVENT_MONITOR_WAITED, "MonitorWaited", LIVE, Some(Capability::GenerateMonitorEvents), true;
    MonitorContendedEnter = JVMTI_EVENT_MONITOR_CONTENDED_ENTER, "MonitorContendedEnter", LIVE, Some(Capability::GenerateMonitorEvents), true;
    MonitorContendedEntered = JVMTI_EVENT_MONITOR_CONTENDED_ENTERED, "MonitorContendedEntered", LIVE, Some(Capability::GenerateMonitorEvents), true;
    ResourceExhausted = JVMTI_EVENT_RESOURCE_EXHAUSTED, "ResourceExhausted", LIVE, None, true;
    GarbageCollectionStart = JVMTI_EVENT_GARBAGE_COLLECTION_START, "GarbageCollectionStart", LIVE, Some(Capability::GenerateGarbageCollectionEvents), true;
    GarbageCollectionFinish = JVMTI_EVENT_GARBAGE_COLLECTION_FINISH, "GarbageCollectionFinish", LIVE, Some(Capability::GenerateGarbageCollectionEvents), true;
    ObjectFree = JVMTI_EVENT_OBJECT_FREE, "ObjectFree", LIVE, Some(Capability::GenerateObjectFreeEvents), true;
    VmObjectAlloc = JVMTI_EVENT_VM_OBJECT_ALLOC, "VMObjectAlloc", LIVE, Some(Capability::GenerateVmObjectAllocEvents), true;
    SampledObjectAlloc = JVMTI_EVENT_SAMPLED_OBJECT_ALLOC, "SampledObjectAlloc", LIVE, Some(Capability::GenerateSampledObjectAllocEvents), true;
    VirtualThreadStart = JVMTI_EVENT_VIRTUAL_THREAD_START, "VirtualThreadStart", LIVE, Some(Capability::SupportVirtualThreads), true;
    VirtualThreadEnd = JVMTI_EVENT_VIRTUAL_THREAD_END, "VirtualThreadEnd", LIVE, Some(Capability::SupportVirtualThreads), true;
}

/// Number of bits an event mask needs.
pub const EVENT_SLOTS: usize = (jvmti::JVMTI_MAX_EVENT_TYPE_VAL - JVMTI_MIN_EVENT_TYPE_VAL + 1) as usize;

impl EventKind {
    /// Position in event masks and route tables.
    pub const fn slot(self) -> usize {
        (self.id() - JVMTI_MIN_EVENT_TYPE_VAL) as usize
    }

    pub const fn mask(self) -> u64 {
        1 << self.slot()
    }

    pub fn is_legal_in(self, phase: Phase) -> bool {
        self.legal_phases().contains(phase)
    }
}

/// Value carried by a field event.
#[derive(Debug, Clone, Default)]
pub enum FieldValue {
    #[default]
    None,
    Long(i64),
    Float(f32),
    Double(f64),
    Object(Option<ObjectRef>),
}

impl FieldValue {
    /// JNI signature character reported with a field modification.
    pub fn signature_type(&self) -> c_char {
        let c = match self {
            FieldValue::None => b'V',
            FieldValue::Long(_) => b'J',
            FieldValue::Float(_) => b'F',
            FieldValue::Double(_) => b'D',
            FieldValue::Object(_) => b'L',
        };
        c as c_char
    }

    pub fn to_jvalue(&self) -> jvalue {
        match self {
            FieldValue::None => jvalue::default(),
            FieldValue::Long(j) => jvalue { j: *j },
            FieldValue::Float(f) => jvalue { f: *f },
            FieldValue::Double(d) => jvalue { d: *d },
            FieldValue::Object(o) => jvalue { l: handle_of_opt(o.as_ref()) },
        }
    }
}

/// Arguments of a field access or modification, staged per thread just
/// before dispatch.
#[derive(Debug, Clone)]
pub struct FieldEventData {
    /// Receiver, `None` for static fields.
    pub object: Option<ObjectRef>,
    pub field_class: ObjectRef,
    pub field: jfieldID,
    /// New value for a modification; `FieldValue::None` for an access.
    pub value: FieldValue,
}

thread_local! {
    static FIELD_SCRATCH: RefCell<Option<FieldEventData>> = RefCell::new(None);
}

/// Per-thread staging area for field event arguments.
///
/// Field events may nest: a handler can trigger another field event on the
/// same thread. Each staging restores the outer record when it ends, and no
/// borrow is held while handlers run.
pub struct FieldScratch;

impl FieldScratch {
    /// Stages `data` on the current thread for the duration of `f`.
    pub(crate) fn staged<R>(data: FieldEventData, f: impl FnOnce() -> R) -> R {
        let outer = FIELD_SCRATCH.with(|s| s.borrow_mut().replace(data));
        let result = f();
        FIELD_SCRATCH.with(|s| *s.borrow_mut() = outer);
        result
    }

    /// Calls `f` with a copy of the staged record, if any.
    pub fn with<R>(f: impl FnOnce(Option<&FieldEventData>) -> R) -> R {
        let data = FIELD_SCRATCH.with(|s| s.borrow().clone());
        f(data.as_ref())
    }
}

/// One posting of an event.
#[derive(Debug)]
pub enum EventPayload<'a> {
    VmStart,
    VmInit { thread: jthread },
    VmDeath,
    ThreadStart { thread: jthread },
    ThreadEnd { thread: jthread },
    ClassLoad { thread: jthread, klass: &'a ObjectRef },
    ClassPrepare { thread: jthread, klass: &'a ObjectRef },
    Exception {
        thread: jthread,
        method: MethodId,
        location: jlocation,
        exception: &'a ObjectRef,
        catch: Option<(MethodId, jlocation)>,
    },
    ExceptionCatch { thread: jthread, method: MethodId, location: jlocation, exception: &'a ObjectRef },
    SingleStep { thread: jthread, method: MethodId, location: jlocation },
    Breakpoint { thread: jthread, method: MethodId, location: jlocation },
    FramePop { thread: jthread, method: MethodId, location: jlocation, was_popped_by_exception: bool },
    FieldAccess { thread: jthread, method: MethodId, location: jlocation },
    FieldModification { thread: jthread, method: MethodId, location: jlocation },
    MethodEntry { thread: jthread, method: MethodId },
    MethodExit { thread: jthread, method: MethodId, was_popped_by_exception: bool, return_value: jvalue },
    GarbageCollectionStart,
    GarbageCollectionFinish,
}

impl EventPayload<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::VmStart => EventKind::VmStart,
            EventPayload::VmInit { .. } => EventKind::VmInit,
            EventPayload::VmDeath => EventKind::VmDeath,
            EventPayload::ThreadStart { .. } => EventKind::ThreadStart,
            EventPayload::ThreadEnd { .. } => EventKind::ThreadEnd,
            EventPayload::ClassLoad { .. } => EventKind::ClassLoad,
            EventPayload::ClassPrepare { .. } => EventKind::ClassPrepare,
            EventPayload::Exception { .. } => EventKind::Exception,
            EventPayload::ExceptionCatch { .. } => EventKind::ExceptionCatch,
            EventPayload::SingleStep { .. } => EventKind::SingleStep,
            EventPayload::Breakpoint { .. } => EventKind::Breakpoint,
            EventPayload::FramePop { .. } => EventKind::FramePop,
            EventPayload::FieldAccess { .. } => EventKind::FieldAccess,
            EventPayload::FieldModification { .. } => EventKind::FieldModification,
            EventPayload::MethodEntry { .. } => EventKind::MethodEntry,
            EventPayload::MethodExit { .. } => EventKind::MethodExit,
            EventPayload::GarbageCollectionStart => EventKind::GarbageCollectionStart,
            EventPayload::GarbageCollectionFinish => EventKind::GarbageCollectionFinish,
        }
    }

    /// The thread the event happened on, for thread-scoped events.
    pub fn thread(&self) -> Option<jthread> {
        match *self {
            EventPayload::VmInit { thread }
            | EventPayload::ThreadStart { thread }
            | EventPayload::ThreadEnd { thread }
            | EventPayload::ClassLoad { thread, .. }
            | EventPayload::ClassPrepare { thread, .. }
            | EventPayload::Exception { thread, .. }
            | EventPayload::ExceptionCatch { thread, .. }
            | EventPayload::SingleStep { thread, .. }
            | EventPayload::Breakpoint { thread, .. }
            | EventPayload::FramePop { thread, .. }
            | EventPayload::FieldAccess { thread, .. }
            | EventPayload::FieldModification { thread, .. }
            | EventPayload::MethodEntry { thread, .. }
            | EventPayload::MethodExit { thread, .. } => Some(thread),
            EventPayload::VmStart
            | EventPayload::VmDeath
            | EventPayload::GarbageCollectionStart
            | EventPayload::GarbageCollectionFinish => None,
        }
    }
}
