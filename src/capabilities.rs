//! Capability registry and negotiation.
//!
//! Each capability occupies the bit of `jvmtiCapabilities` matching its
//! declaration position and carries a fixed flag saying whether this VM can
//! ever provide it. The table below is the single source for the
//! [`Capability`] enum, its names, and the named accessors on
//! [`jvmtiCapabilities`].
//!
//! ```rust
//! use jvmti_host::capabilities::{self, Capability};
//! use jvmti_host::sys::jvmti::{jvmtiCapabilities, jvmtiError};
//!
//! let mut granted = jvmtiCapabilities::default();
//! let mut wanted = jvmtiCapabilities::default();
//! wanted.set_can_tag_objects(true);
//! capabilities::add(&mut granted, &wanted).unwrap();
//! assert!(granted.can_tag_objects());
//!
//! let redefine = jvmtiCapabilities::of(&[Capability::RedefineClasses]);
//! assert_eq!(capabilities::add(&mut granted, &redefine), Err(jvmtiError::NOT_AVAILABLE));
//! ```

use std::sync::OnceLock;

use crate::error::JvmtiResult;
use crate::sys::jvmti::{jvmtiCapabilities, jvmtiError};

macro_rules! capabilities {
    ($($bit:literal => $variant:ident, $getter:ident, $setter:ident, $implementable:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Capability {
            $($variant,)*
        }

        impl Capability {
            /// All capabilities in bit order.
            pub const ALL: &'static [Capability] = &[$(Capability::$variant,)*];

            pub const fn bit(self) -> usize {
                match self {
                    $(Capability::$variant => $bit,)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Capability::$variant => stringify!($getter),)*
                }
            }

            /// Whether this VM can ever grant the capability.
            pub const fn is_implementable(self) -> bool {
                match self {
                    $(Capability::$variant => $implementable,)*
                }
            }
        }

        impl jvmtiCapabilities {
            $(
                pub fn $getter(&self) -> bool {
                    self.get_bit($bit)
                }

                pub fn $setter(&mut self, value: bool) {
                    self.set_bit($bit, value)
                }
            )*
        }
    };
}

capabilities! {
    0 => TagObjects, can_tag_objects, set_can_tag_objects, true;
    1 => GenerateFieldModificationEvents, can_generate_field_modification_events, set_can_generate_field_modification_events, true;
    2 => GenerateFieldAccessEvents, can_generate_field_access_events, set_can_generate_field_access_events, true;
    3 => GetBytecodes, can_get_bytecodes, set_can_get_bytecodes, true;
    4 => GetSyntheticAttribute, can_get_synthetic_attribute, set_can_get_synthetic_attribute, true;
    5 => GetOwnedMonitorInfo, can_get_owned_monitor_info, set_can_get_owned_monitor_info, true;
    6 => GetCurrentContendedMonitor, can_get_current_contended_monitor, set_can_get_current_contended_monitor, true;
    7 => GetMonitorInfo, can_get_monitor_info, set_can_get_monitor_info, true;
    8 => PopFrame, can_pop_frame, set_can_pop_frame, false;
    9 => RedefineClasses, can_redefine_classes, set_can_redefine_classes, false;
    10 => SignalThread, can_signal_thread, set_can_signal_thread, true;
    11 => GetSourceFileName, can_get_source_file_name, set_can_get_source_file_name, true;
    12 => GetLineNumbers, can_get_line_numbers, set_can_get_line_numbers, true;
    13 => GetSourceDebugExtension, can_get_source_debug_extension, set_can_get_source_debug_extension, true;
    14 => AccessLocalVariables, can_access_local_variables, set_can_access_local_variables, true;
    15 => MaintainOriginalMethodOrder, can_maintain_original_method_order, set_can_maintain_original_method_order, false;
    16 => GenerateSingleStepEvents, can_generate_single_step_events, set_can_generate_single_step_events, true;
    17 => GenerateExceptionEvents, can_generate_exception_events, set_can_generate_exception_events, true;
    18 => GenerateFramePopEvents, can_generate_frame_pop_events, set_can_generate_frame_pop_events, true;
    19 => GenerateBreakpointEvents, can_generate_breakpoint_events, set_can_generate_breakpoint_events, true;
    20 => Suspend, can_suspend, set_can_suspend, true;
    21 => RedefineAnyClass, can_redefine_any_class, set_can_redefine_any_class, false;
    22 => GetCurrentThreadCpuTime, can_get_current_thread_cpu_time, set_can_get_current_thread_cpu_time, false;
    23 => GetThreadCpuTime, can_get_thread_cpu_time, set_can_get_thread_cpu_time, false;
    24 => GenerateMethodEntryEvents, can_generate_method_entry_events, set_can_generate_method_entry_events, true;
    25 => GenerateMethodExitEvents, can_generate_method_exit_events, set_can_generate_method_exit_events, true;
    26 => GenerateAllClassHookEvents, can_generate_all_class_hook_events, set_can_generate_all_class_hook_events, true;
    27 => GenerateCompiledMethodLoadEvents, can_generate_compiled_method_load_events, set_can_generate_compiled_method_load_events, false;
    28 => GenerateMonitorEvents, can_generate_monitor_events, set_can_generate_monitor_events, false;
    29 => GenerateVmObjectAllocEvents, can_generate_vm_object_alloc_events, set_can_generate_vm_object_alloc_events, false;
    30 => GenerateNativeMethodBindEvents, can_generate_native_method_bind_events, set_can_generate_native_method_bind_events, false;
    31 => GenerateGarbageCollectionEvents, can_generate_garbage_collection_events, set_can_generate_garbage_collection_events, true;
    32 => GenerateObjectFreeEvents, can_generate_object_free_events, set_can_generate_object_free_events, false;
    33 => ForceEarlyReturn, can_force_early_return, set_can_force_early_return, false;
    34 => GetOwnedMonitorStackDepthInfo, can_get_owned_monitor_stack_depth_info, set_can_get_owned_monitor_stack_depth_info, true;
    35 => GetConstantPool, can_get_constant_pool, set_can_get_constant_pool, false;
    36 => SetNativeMethodPrefix, can_set_native_method_prefix, set_can_set_native_method_prefix, false;
    37 => RetransformClasses, can_retransform_classes, set_can_retransform_classes, false;
    38 => RetransformAnyClass, can_retransform_any_class, set_can_retransform_any_class, false;
    39 => GenerateResourceExhaustionHeapEvents, can_generate_resource_exhaustion_heap_events, set_can_generate_resource_exhaustion_heap_events, false;
    40 => GenerateResourceExhaustionThreadsEvents, can_generate_resource_exhaustion_threads_events, set_can_generate_resource_exhaustion_threads_events, false;
    41 => GenerateEarlyVmstart, can_generate_early_vmstart, set_can_generate_early_vmstart, false;
    42 => GenerateEarlyClassHookEvents, can_generate_early_class_hook_events, set_can_generate_early_class_hook_events, false;
    43 => GenerateSampledObjectAllocEvents, can_generate_sampled_object_alloc_events, set_can_generate_sampled_object_alloc_events, false;
    44 => SupportVirtualThreads, can_support_virtual_threads, set_can_support_virtual_threads, false;
}

impl jvmtiCapabilities {
    pub fn of(caps: &[Capability]) -> jvmtiCapabilities {
        let mut set = jvmtiCapabilities::default();
        for cap in caps {
            set.set(*cap, true);
        }
        set
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.get_bit(cap.bit())
    }

    pub fn set(&mut self, cap: Capability, value: bool) {
        self.set_bit(cap.bit(), value)
    }

    /// Capabilities present in this set, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.iter().copied().filter(move |c| self.has(*c))
    }
}

/// Union of every implementable capability, computed once.
pub fn potential() -> jvmtiCapabilities {
    static POTENTIAL: OnceLock<jvmtiCapabilities> = OnceLock::new();
    *POTENTIAL.get_or_init(|| {
        let mut set = jvmtiCapabilities::default();
        for cap in Capability::ALL.iter().filter(|c| c.is_implementable()) {
            set.set(*cap, true);
        }
        set
    })
}

/// Grants `requested` into `granted`, one capability at a time in bit order.
///
/// The first unimplementable capability stops the loop with `NOT_AVAILABLE`;
/// capabilities granted before it stay granted.
pub fn add(granted: &mut jvmtiCapabilities, requested: &jvmtiCapabilities) -> JvmtiResult<()> {
    for cap in requested.iter() {
        if !cap.is_implementable() {
            return Err(jvmtiError::NOT_AVAILABLE);
        }
        granted.set(cap, true);
    }
    Ok(())
}

/// Clears every requested bit, held or not.
pub fn relinquish(granted: &mut jvmtiCapabilities, requested: &jvmtiCapabilities) {
    for cap in requested.iter() {
        granted.set(cap, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_matches_bits() {
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.bit(), i);
        }
        assert_eq!(Capability::ALL.len(), 45);
    }

    #[test]
    fn named_accessors_hit_the_declared_bit() {
        let mut caps = jvmtiCapabilities::default();
        caps.set_can_generate_breakpoint_events(true);
        assert_eq!(caps.words()[0], 1 << 19);
        caps.set_can_support_virtual_threads(true);
        assert_eq!(caps.words()[1], 1 << (44 - 32));
        assert!(caps.has(Capability::SupportVirtualThreads));
    }

    #[test]
    fn potential_contains_exactly_the_implementable_set() {
        let potential = potential();
        for cap in Capability::ALL {
            assert_eq!(potential.has(*cap), cap.is_implementable(), "{}", cap.name());
        }
    }

    #[test]
    fn add_is_not_atomic() {
        let mut granted = jvmtiCapabilities::default();
        let requested = jvmtiCapabilities::of(&[Capability::TagObjects, Capability::PopFrame, Capability::Suspend]);
        assert_eq!(add(&mut granted, &requested), Err(jvmtiError::NOT_AVAILABLE));
        // bit 0 went in before bit 8 failed; bit 20 was never reached
        assert!(granted.can_tag_objects());
        assert!(!granted.can_pop_frame());
        assert!(!granted.can_suspend());
    }

    #[test]
    fn relinquish_ignores_unheld_bits() {
        let mut granted = jvmtiCapabilities::of(&[Capability::TagObjects]);
        relinquish(&mut granted, &jvmtiCapabilities::of(&[Capability::Suspend, Capability::TagObjects]));
        assert!(granted.is_empty());
    }
}
