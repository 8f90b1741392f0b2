//! Native agent loading.
//!
//! The launcher hands over an ordered list of agent libraries with their
//! option strings. Each library is loaded, its `Agent_OnLoad` is called with
//! the options, and the library stays mapped for the life of the returned
//! [`LoadedAgents`]. Once every agent has loaded, the core leaves ONLOAD.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};

use crate::core::JvmtiCore;
use crate::error::AgentLoadError;
use crate::phase::Phase;
use crate::sys::jni::{jint, JavaVM, JNI_OK};

type AgentOnLoad = unsafe extern "C" fn(vm: *mut JavaVM, options: *mut c_char, reserved: *mut c_void) -> jint;
type AgentOnUnload = unsafe extern "C" fn(vm: *mut JavaVM);

/// One agent to load: a library path and the options passed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub path: PathBuf,
    pub options: String,
}

impl AgentSpec {
    pub fn new(path: impl Into<PathBuf>, options: impl Into<String>) -> AgentSpec {
        AgentSpec { path: path.into(), options: options.into() }
    }
}

struct LoadedAgent {
    path: PathBuf,
    // Agents may keep the options pointer.
    _options: CString,
    library: libloading::Library,
}

/// Libraries of successfully loaded agents, in load order.
#[derive(Default)]
pub struct LoadedAgents {
    agents: Vec<LoadedAgent>,
}

impl LoadedAgents {
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.agents.iter().map(|a| a.path.as_path())
    }

    /// Calls `Agent_OnUnload` of every agent exporting it, last loaded
    /// first, then unmaps the libraries.
    ///
    /// # Safety
    ///
    /// `vm` must be the pointer the agents were loaded with.
    pub unsafe fn unload(self, vm: *mut JavaVM) {
        for agent in self.agents.into_iter().rev() {
            if let Ok(on_unload) = agent.library.get::<AgentOnUnload>(b"Agent_OnUnload\0") {
                tracing::debug!(path = %agent.path.display(), "Agent_OnUnload");
                on_unload(vm);
            }
        }
    }
}

impl std::fmt::Debug for LoadedAgents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.agents.iter().map(|a| &a.path)).finish()
    }
}

/// Loads `specs` in order. Stops at the first failure; libraries loaded
/// before it are unmapped without `Agent_OnUnload`.
///
/// # Safety
///
/// Runs foreign initialization code. `vm` must stay valid for as long as
/// the agents may use it.
pub unsafe fn load_agents(core: &JvmtiCore, vm: *mut JavaVM, specs: &[AgentSpec]) -> Result<LoadedAgents, AgentLoadError> {
    if core.phase() != Phase::OnLoad {
        return Err(AgentLoadError::WrongPhase);
    }
    let mut loaded = LoadedAgents::default();
    for spec in specs {
        loaded.agents.push(load_one(vm, spec)?);
    }
    core.end_onload();
    Ok(loaded)
}

unsafe fn load_one(vm: *mut JavaVM, spec: &AgentSpec) -> Result<LoadedAgent, AgentLoadError> {
    let path = spec.path.clone();
    let options = CString::new(spec.options.as_str()).map_err(|_| AgentLoadError::InvalidOptions { path: path.clone() })?;
    let library = libloading::Library::new(&path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "agent library failed to load");
        AgentLoadError::Library { path: path.clone(), source }
    })?;
    let code = {
        let on_load = library
            .get::<AgentOnLoad>(b"Agent_OnLoad\0")
            .map_err(|source| AgentLoadError::MissingEntryPoint { path: path.clone(), source })?;
        on_load(vm, options.as_ptr() as *mut c_char, std::ptr::null_mut())
    };
    if code != JNI_OK {
        tracing::error!(path = %path.display(), code, "Agent_OnLoad failed");
        return Err(AgentLoadError::Rejected { path, code });
    }
    tracing::debug!(path = %path.display(), options = %spec.options, "agent loaded");
    Ok(LoadedAgent { path, _options: options, library })
}
