// jvmti-host/src/sys/jvmti.rs
//
// JVMTI C ABI types as seen from the VM side of the interface.
//
// Numeric values (event ids, error codes, phases, heap filter bits) and
// struct layouts (jvmtiCapabilities, jvmtiEventCallbacks, jvmtiHeapCallbacks)
// follow jvmti.h so that agents compiled against the standard header can be
// served by this core without translation.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::fmt;
use std::os::raw::{c_char, c_uchar, c_void};

use crate::sys::jni::{jboolean, jclass, jfieldID, jint, jlong, jmethodID, jobject, jthread, jvalue, JNIEnv};

// --- Constants ---
pub const JVMTI_VERSION_1_0: jint = 0x30010000;
pub const JVMTI_VERSION_1_1: jint = 0x30010100;
pub const JVMTI_VERSION_1_2: jint = 0x30010200;

/// The interface version this core implements.
pub const JVMTI_VERSION: jint = JVMTI_VERSION_1_2;

pub const JVMTI_EVENT_VM_INIT: u32 = 50;
pub const JVMTI_EVENT_VM_DEATH: u32 = 51;
pub const JVMTI_EVENT_THREAD_START: u32 = 52;
pub const JVMTI_EVENT_THREAD_END: u32 = 53;
pub const JVMTI_EVENT_CLASS_FILE_LOAD_HOOK: u32 = 54;
pub const JVMTI_EVENT_CLASS_LOAD: u32 = 55;
pub const JVMTI_EVENT_CLASS_PREPARE: u32 = 56;
pub const JVMTI_EVENT_VM_START: u32 = 57;
pub const JVMTI_EVENT_EXCEPTION: u32 = 58;
pub const JVMTI_EVENT_EXCEPTION_CATCH: u32 = 59;
pub const JVMTI_EVENT_SINGLE_STEP: u32 = 60;
pub const JVMTI_EVENT_FRAME_POP: u32 = 61;
pub const JVMTI_EVENT_BREAKPOINT: u32 = 62;
pub const JVMTI_EVENT_FIELD_ACCESS: u32 = 63;
pub const JVMTI_EVENT_FIELD_MODIFICATION: u32 = 64;
pub const JVMTI_EVENT_METHOD_ENTRY: u32 = 65;
pub const JVMTI_EVENT_METHOD_EXIT: u32 = 66;
pub const JVMTI_EVENT_NATIVE_METHOD_BIND: u32 = 67;
pub const JVMTI_EVENT_COMPILED_METHOD_LOAD: u32 = 68;
pub const JVMTI_EVENT_COMPILED_METHOD_UNLOAD: u32 = 69;
pub const JVMTI_EVENT_DYNAMIC_CODE_GENERATED: u32 = 70;
pub const JVMTI_EVENT_DATA_DUMP_REQUEST: u32 = 71;
pub const JVMTI_EVENT_MONITOR_WAIT: u32 = 73;
pub const JVMTI_EVENT_MONITOR_WAITED: u32 = 74;
pub const JVMTI_EVENT_MONITOR_CONTENDED_ENTER: u32 = 75;
pub const JVMTI_EVENT_MONITOR_CONTENDED_ENTERED: u32 = 76;
pub const JVMTI_EVENT_RESOURCE_EXHAUSTED: u32 = 80;
pub const JVMTI_EVENT_GARBAGE_COLLECTION_START: u32 = 81;
pub const JVMTI_EVENT_GARBAGE_COLLECTION_FINISH: u32 = 82;
pub const JVMTI_EVENT_OBJECT_FREE: u32 = 83;
pub const JVMTI_EVENT_VM_OBJECT_ALLOC: u32 = 84;
pub const JVMTI_EVENT_SAMPLED_OBJECT_ALLOC: u32 = 86;
pub const JVMTI_EVENT_VIRTUAL_THREAD_START: u32 = 87;
pub const JVMTI_EVENT_VIRTUAL_THREAD_END: u32 = 88;

pub const JVMTI_MIN_EVENT_TYPE_VAL: u32 = JVMTI_EVENT_VM_INIT;
pub const JVMTI_MAX_EVENT_TYPE_VAL: u32 = JVMTI_EVENT_VIRTUAL_THREAD_END;

// --- Phases (external values, as returned by GetPhase) ---
pub const JVMTI_PHASE_ONLOAD: jint = 1;
pub const JVMTI_PHASE_PRIMORDIAL: jint = 2;
pub const JVMTI_PHASE_START: jint = 6;
pub const JVMTI_PHASE_LIVE: jint = 4;
pub const JVMTI_PHASE_DEAD: jint = 8;

pub const JVMTI_ENABLE: jint = 1;
pub const JVMTI_DISABLE: jint = 0;

// --- Error Codes ---
//
// One table drives the enum, the canonical names and the reverse lookup.
macro_rules! jvmti_errors {
    ($($name:ident = $code:literal,)*) => {
        #[repr(u32)]
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum jvmtiError {
            $($name = $code,)*
        }

        impl jvmtiError {
            /// Every defined code, ascending.
            pub const ALL: &'static [jvmtiError] = &[$(jvmtiError::$name,)*];

            /// Canonical `JVMTI_ERROR_*` spelling.
            pub const fn name(self) -> &'static str {
                match self {
                    $(jvmtiError::$name => concat!("JVMTI_ERROR_", stringify!($name)),)*
                }
            }

            pub const fn from_code(code: jint) -> Option<jvmtiError> {
                match code {
                    $($code => Some(jvmtiError::$name),)*
                    _ => None,
                }
            }
        }
    };
}

jvmti_errors! {
    NONE = 0,
    INVALID_THREAD = 10,
    INVALID_THREAD_GROUP = 11,
    INVALID_PRIORITY = 12,
    THREAD_NOT_SUSPENDED = 13,
    THREAD_SUSPENDED = 14,
    THREAD_NOT_ALIVE = 15,
    INVALID_OBJECT = 20,
    INVALID_CLASS = 21,
    CLASS_NOT_PREPARED = 22,
    INVALID_METHODID = 23,
    INVALID_LOCATION = 24,
    INVALID_FIELDID = 25,
    INVALID_MODULE = 26,
    NO_MORE_FRAMES = 31,
    OPAQUE_FRAME = 32,
    TYPE_MISMATCH = 34,
    INVALID_SLOT = 35,
    DUPLICATE = 40,
    NOT_FOUND = 41,
    INVALID_MONITOR = 50,
    NOT_MONITOR_OWNER = 51,
    INTERRUPT = 52,
    INVALID_CLASS_FORMAT = 60,
    CIRCULAR_CLASS_DEFINITION = 61,
    FAILS_VERIFICATION = 62,
    UNSUPPORTED_REDEFINITION_METHOD_ADDED = 63,
    UNSUPPORTED_REDEFINITION_SCHEMA_CHANGED = 64,
    INVALID_TYPESTATE = 65,
    UNSUPPORTED_REDEFINITION_HIERARCHY_CHANGED = 66,
    UNSUPPORTED_REDEFINITION_METHOD_DELETED = 67,
    UNSUPPORTED_VERSION = 68,
    NAMES_DONT_MATCH = 69,
    UNSUPPORTED_REDEFINITION_CLASS_MODIFIERS_CHANGED = 70,
    UNSUPPORTED_REDEFINITION_METHOD_MODIFIERS_CHANGED = 71,
    UNSUPPORTED_REDEFINITION_CLASS_ATTRIBUTE_CHANGED = 72,
    UNSUPPORTED_OPERATION = 73,
    UNMODIFIABLE_CLASS = 79,
    UNMODIFIABLE_MODULE = 80,
    NOT_AVAILABLE = 98,
    MUST_POSSESS_CAPABILITY = 99,
    NULL_POINTER = 100,
    ABSENT_INFORMATION = 101,
    INVALID_EVENT_TYPE = 102,
    ILLEGAL_ARGUMENT = 103,
    NATIVE_METHOD = 104,
    CLASS_LOADER_UNSUPPORTED = 106,
    OUT_OF_MEMORY = 110,
    ACCESS_DENIED = 111,
    WRONG_PHASE = 112,
    INTERNAL = 113,
    UNATTACHED_THREAD = 115,
    INVALID_ENVIRONMENT = 116,
}

impl jvmtiError {
    pub const fn code(self) -> jint {
        self as u32 as jint
    }
}

pub const JVMTI_ERROR_MAX: jint = 116;

pub type jlocation = jlong;
pub type jrawMonitorID = *mut c_void;

// --- Heap iteration (JVMTI 1.1 style) ---
pub const JVMTI_HEAP_FILTER_TAGGED: jint = 0x4;
pub const JVMTI_HEAP_FILTER_UNTAGGED: jint = 0x8;
pub const JVMTI_HEAP_FILTER_CLASS_TAGGED: jint = 0x10;
pub const JVMTI_HEAP_FILTER_CLASS_UNTAGGED: jint = 0x20;

pub const JVMTI_VISIT_OBJECTS: jint = 0x100;
pub const JVMTI_VISIT_ABORT: jint = 0x8000;

pub type jvmtiHeapIterationCallback = unsafe extern "system" fn(
    class_tag: jlong,
    size: jlong,
    tag_ptr: *mut jlong,
    length: jint,
    user_data: *mut c_void,
) -> jint;

/// Placeholder for callback slots the core never invokes.
pub type jvmtiReservedCallback = unsafe extern "system" fn() -> jint;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct jvmtiHeapCallbacks {
    pub heap_iteration_callback: Option<jvmtiHeapIterationCallback>,
    pub heap_reference_callback: Option<jvmtiReservedCallback>,
    pub primitive_field_callback: Option<jvmtiReservedCallback>,
    pub array_primitive_value_callback: Option<jvmtiReservedCallback>,
    pub string_primitive_value_callback: Option<jvmtiReservedCallback>,
    pub reserved5: Option<jvmtiReservedCallback>,
    pub reserved6: Option<jvmtiReservedCallback>,
    pub reserved7: Option<jvmtiReservedCallback>,
    pub reserved8: Option<jvmtiReservedCallback>,
    pub reserved9: Option<jvmtiReservedCallback>,
    pub reserved10: Option<jvmtiReservedCallback>,
    pub reserved11: Option<jvmtiReservedCallback>,
    pub reserved12: Option<jvmtiReservedCallback>,
    pub reserved13: Option<jvmtiReservedCallback>,
    pub reserved14: Option<jvmtiReservedCallback>,
    pub reserved15: Option<jvmtiReservedCallback>,
}

// --- Heap iteration (JVMTI 1.0 style) ---
pub type jvmtiHeapObjectFilter = jint;
pub const JVMTI_HEAP_OBJECT_TAGGED: jint = 1;
pub const JVMTI_HEAP_OBJECT_UNTAGGED: jint = 2;
pub const JVMTI_HEAP_OBJECT_EITHER: jint = 3;

pub type jvmtiIterationControl = jint;
pub const JVMTI_ITERATION_CONTINUE: jint = 1;
pub const JVMTI_ITERATION_IGNORE: jint = 2;
pub const JVMTI_ITERATION_ABORT: jint = 0;

pub type jvmtiHeapObjectCallback = unsafe extern "system" fn(
    class_tag: jlong,
    size: jlong,
    tag_ptr: *mut jlong,
    user_data: *mut c_void,
) -> jvmtiIterationControl;

// --- Capabilities ---
//
// 45 one-bit fields packed LSB-first into 32-bit words, in declaration order.
// The named accessors are generated alongside the capability registry in
// `crate::capabilities`.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct jvmtiCapabilities {
    bits: [u32; 4],
}

impl jvmtiCapabilities {
    pub(crate) fn set_bit(&mut self, bit_offset: usize, value: bool) {
        let word_index = bit_offset / 32;
        let bit_index = bit_offset % 32;
        if value {
            self.bits[word_index] |= 1 << bit_index;
        } else {
            self.bits[word_index] &= !(1 << bit_index);
        }
    }

    pub(crate) fn get_bit(&self, bit_offset: usize) -> bool {
        let word_index = bit_offset / 32;
        let bit_index = bit_offset % 32;
        (self.bits[word_index] & (1 << bit_index)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Raw words, mainly for logging.
    pub fn words(&self) -> [u32; 4] {
        self.bits
    }
}

impl std::ops::BitOr for jvmtiCapabilities {
    type Output = jvmtiCapabilities;

    fn bitor(self, rhs: jvmtiCapabilities) -> jvmtiCapabilities {
        let mut bits = self.bits;
        for (w, r) in bits.iter_mut().zip(rhs.bits) {
            *w |= r;
        }
        jvmtiCapabilities { bits }
    }
}

impl fmt::Debug for jvmtiCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jvmtiCapabilities({:08x}_{:08x}_{:08x}_{:08x})",
            self.bits[3], self.bits[2], self.bits[1], self.bits[0]
        )
    }
}

// --- Environment ---
//
// The address of this struct is the environment's identity. The function
// table it points to belongs to the entry-point layer and is opaque here.
#[repr(C)]
pub struct jvmtiEnv {
    pub functions: *const c_void,
}

// The function table is immutable once published.
unsafe impl Send for jvmtiEnv {}
unsafe impl Sync for jvmtiEnv {}

impl jvmtiEnv {
    /// An environment struct with no function table, used as a pure identity.
    pub const fn detached() -> jvmtiEnv {
        jvmtiEnv { functions: std::ptr::null() }
    }
}

// =========================================================================
// FUNCTION TYPEDEFS: EVENT CALLBACKS
// =========================================================================

// 1. VM Lifecycle
pub type JvmtiVMInitFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread);
pub type JvmtiVMDeathFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv);
pub type JvmtiVMStartFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv);

// 2. Thread Lifecycle
pub type JvmtiThreadStartFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread);
pub type JvmtiThreadEndFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread);

// 3. Class Loading
pub type JvmtiClassFileLoadHookFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    class_being_redefined: jclass,
    loader: jobject,
    name: *const c_char,
    protection_domain: jobject,
    class_data_len: jint,
    class_data: *const c_uchar,
    new_class_data_len: *mut jint,
    new_class_data: *mut *mut c_uchar,
);

pub type JvmtiClassLoadFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, klass: jclass);
pub type JvmtiClassPrepareFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, klass: jclass);

// 4. Exceptions
pub type JvmtiExceptionFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
    exception: jobject,
    catch_method: jmethodID,
    catch_location: jlocation,
);

pub type JvmtiExceptionCatchFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
    exception: jobject,
);

// 5. Debugging (Breakpoints & Stepping)
pub type JvmtiSingleStepFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
);

pub type JvmtiBreakpointFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
);

pub type JvmtiFramePopFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    was_popped_by_exception: jboolean,
);

// 6. Fields (Watchpoints)
pub type JvmtiFieldAccessFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
    field_klass: jclass,
    object: jobject,
    field: jfieldID,
);

pub type JvmtiFieldModificationFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
    field_klass: jclass,
    object: jobject,
    field: jfieldID,
    signature_type: c_char,
    new_value: jvalue,
);

// 7. Methods
pub type JvmtiMethodEntryFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, method: jmethodID);

pub type JvmtiMethodExitFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    was_popped_by_exception: jboolean,
    return_value: jvalue,
);

pub type JvmtiNativeMethodBindFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    address: *mut c_void,
    new_address_ptr: *mut *mut c_void,
);

// 8. Compiled Code (JIT)
pub type JvmtiCompiledMethodLoadFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    method: jmethodID,
    code_size: jint,
    code_addr: *const c_void,
    map_length: jint,
    map: *const c_void,
    compile_info: *const c_void,
);

pub type JvmtiCompiledMethodUnloadFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, method: jmethodID, code_addr: *const c_void);

pub type JvmtiDynamicCodeGeneratedFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, name: *const c_char, address: *const c_void, length: jint);

pub type JvmtiDataDumpRequestFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv);

// 9. Monitors (Locks)
pub type JvmtiMonitorWaitFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, object: jobject, timeout: jlong);
pub type JvmtiMonitorWaitedFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    object: jobject,
    timed_out: jboolean,
);
pub type JvmtiMonitorContendedEnterFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, object: jobject);
pub type JvmtiMonitorContendedEnteredFn =
    unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, thread: jthread, object: jobject);

// 10. Memory & GC
pub type JvmtiResourceExhaustedFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    flags: jint,
    reserved: *const c_void,
    description: *const c_char,
);

pub type JvmtiGarbageCollectionStartFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv);
pub type JvmtiGarbageCollectionFinishFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv);

pub type JvmtiObjectFreeFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, tag: jlong);

pub type JvmtiVMObjectAllocFn = unsafe extern "system" fn(
    jvmti_env: *mut jvmtiEnv,
    jni_env: *mut JNIEnv,
    thread: jthread,
    object: jobject,
    object_klass: jclass,
    size: jlong,
);

pub type JvmtiSampledObjectAllocFn = JvmtiVMObjectAllocFn;

pub type JvmtiVirtualThreadFn = unsafe extern "system" fn(jvmti_env: *mut jvmtiEnv, jni_env: *mut JNIEnv, virtual_thread: jthread);

pub type JvmtiReservedEventFn = unsafe extern "system" fn();

/// Event callback table. Slot `i` holds the callback for event id
/// `JVMTI_MIN_EVENT_TYPE_VAL + i`, reserved ids included.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug)]
pub struct jvmtiEventCallbacks {
    pub VMInit: Option<JvmtiVMInitFn>,
    pub VMDeath: Option<JvmtiVMDeathFn>,
    pub ThreadStart: Option<JvmtiThreadStartFn>,
    pub ThreadEnd: Option<JvmtiThreadEndFn>,
    pub ClassFileLoadHook: Option<JvmtiClassFileLoadHookFn>,
    pub ClassLoad: Option<JvmtiClassLoadFn>,
    pub ClassPrepare: Option<JvmtiClassPrepareFn>,
    pub VMStart: Option<JvmtiVMStartFn>,
    pub Exception: Option<JvmtiExceptionFn>,
    pub ExceptionCatch: Option<JvmtiExceptionCatchFn>,
    pub SingleStep: Option<JvmtiSingleStepFn>,
    pub FramePop: Option<JvmtiFramePopFn>,
    pub Breakpoint: Option<JvmtiBreakpointFn>,
    pub FieldAccess: Option<JvmtiFieldAccessFn>,
    pub FieldModification: Option<JvmtiFieldModificationFn>,
    pub MethodEntry: Option<JvmtiMethodEntryFn>,
    pub MethodExit: Option<JvmtiMethodExitFn>,
    pub NativeMethodBind: Option<JvmtiNativeMethodBindFn>,
    pub CompiledMethodLoad: Option<JvmtiCompiledMethodLoadFn>,
    pub CompiledMethodUnload: Option<JvmtiCompiledMethodUnloadFn>,
    pub DynamicCodeGenerated: Option<JvmtiDynamicCodeGeneratedFn>,
    pub DataDumpRequest: Option<JvmtiDataDumpRequestFn>,
    pub reserved72: Option<JvmtiReservedEventFn>,
    pub MonitorWait: Option<JvmtiMonitorWaitFn>,
    pub MonitorWaited: Option<JvmtiMonitorWaitedFn>,
    pub MonitorContendedEnter: Option<JvmtiMonitorContendedEnterFn>,
    pub MonitorContendedEntered: Option<JvmtiMonitorContendedEnteredFn>,
    pub reserved77: Option<JvmtiReservedEventFn>,
    pub reserved78: Option<JvmtiReservedEventFn>,
    pub reserved79: Option<JvmtiReservedEventFn>,
    pub ResourceExhausted: Option<JvmtiResourceExhaustedFn>,
    pub GarbageCollectionStart: Option<JvmtiGarbageCollectionStartFn>,
    pub GarbageCollectionFinish: Option<JvmtiGarbageCollectionFinishFn>,
    pub ObjectFree: Option<JvmtiObjectFreeFn>,
    pub VMObjectAlloc: Option<JvmtiVMObjectAllocFn>,
    pub reserved85: Option<JvmtiReservedEventFn>,
    pub SampledObjectAlloc: Option<JvmtiSampledObjectAllocFn>,
    pub VirtualThreadStart: Option<JvmtiVirtualThreadFn>,
    pub VirtualThreadEnd: Option<JvmtiVirtualThreadFn>,
}

impl jvmtiEventCallbacks {
    /// Whether the slot for `event_id` holds a callback.
    pub fn is_set(&self, event_id: u32) -> bool {
        match event_id {
            JVMTI_EVENT_VM_INIT => self.VMInit.is_some(),
            JVMTI_EVENT_VM_DEATH => self.VMDeath.is_some(),
            JVMTI_EVENT_THREAD_START => self.ThreadStart.is_some(),
            JVMTI_EVENT_THREAD_END => self.ThreadEnd.is_some(),
            JVMTI_EVENT_CLASS_FILE_LOAD_HOOK => self.ClassFileLoadHook.is_some(),
            JVMTI_EVENT_CLASS_LOAD => self.ClassLoad.is_some(),
            JVMTI_EVENT_CLASS_PREPARE => self.ClassPrepare.is_some(),
            JVMTI_EVENT_VM_START => self.VMStart.is_some(),
            JVMTI_EVENT_EXCEPTION => self.Exception.is_some(),
            JVMTI_EVENT_EXCEPTION_CATCH => self.ExceptionCatch.is_some(),
            JVMTI_EVENT_SINGLE_STEP => self.SingleStep.is_some(),
            JVMTI_EVENT_FRAME_POP => self.FramePop.is_some(),
            JVMTI_EVENT_BREAKPOINT => self.Breakpoint.is_some(),
            JVMTI_EVENT_FIELD_ACCESS => self.FieldAccess.is_some(),
            JVMTI_EVENT_FIELD_MODIFICATION => self.FieldModification.is_some(),
            JVMTI_EVENT_METHOD_ENTRY => self.MethodEntry.is_some(),
            JVMTI_EVENT_METHOD_EXIT => self.MethodExit.is_some(),
            JVMTI_EVENT_NATIVE_METHOD_BIND => self.NativeMethodBind.is_some(),
            JVMTI_EVENT_COMPILED_METHOD_LOAD => self.CompiledMethodLoad.is_some(),
            JVMTI_EVENT_COMPILED_METHOD_UNLOAD => self.CompiledMethodUnload.is_some(),
            JVMTI_EVENT_DYNAMIC_CODE_GENERATED => self.DynamicCodeGenerated.is_some(),
            JVMTI_EVENT_DATA_DUMP_REQUEST => self.DataDumpRequest.is_some(),
            JVMTI_EVENT_MONITOR_WAIT => self.MonitorWait.is_some(),
            JVMTI_EVENT_MONITOR_WAITED => self.MonitorWaited.is_some(),
            JVMTI_EVENT_MONITOR_CONTENDED_ENTER => self.MonitorContendedEnter.is_some(),
            JVMTI_EVENT_MONITOR_CONTENDED_ENTERED => self.MonitorContendedEntered.is_some(),
            JVMTI_EVENT_RESOURCE_EXHAUSTED => self.ResourceExhausted.is_some(),
            JVMTI_EVENT_GARBAGE_COLLECTION_START => self.GarbageCollectionStart.is_some(),
            JVMTI_EVENT_GARBAGE_COLLECTION_FINISH => self.GarbageCollectionFinish.is_some(),
            JVMTI_EVENT_OBJECT_FREE => self.ObjectFree.is_some(),
            JVMTI_EVENT_VM_OBJECT_ALLOC => self.VMObjectAlloc.is_some(),
            JVMTI_EVENT_SAMPLED_OBJECT_ALLOC => self.SampledObjectAlloc.is_some(),
            JVMTI_EVENT_VIRTUAL_THREAD_START => self.VirtualThreadStart.is_some(),
            JVMTI_EVENT_VIRTUAL_THREAD_END => self.VirtualThreadEnd.is_some(),
            _ => false,
        }
    }
}
