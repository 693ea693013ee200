//! C ABI shared with custom metric libraries.
//!
//! A plugin library exports `fluxmetrics_plugin_manifest`, returning a
//! pointer to a `PluginManifest` that stays valid while the library is
//! loaded. Each entry names one metric, declares how many parameters its
//! function takes, and points at the function. Metric functions receive a
//! `HostHandle` and write their value to `out`, returning 0 on success.
//!
//! Strings handed to the plugin by the host must be released with
//! `HostHandle::free_string`.

use std::ffi::{c_char, c_void, CString};

use fluxmetrics_core::{JobRecord, SchedulerHandle};
use serde::Serialize;

pub const ABI_VERSION: u32 = 1;

/// Exported symbol name (NUL terminated for `dlsym`).
pub const MANIFEST_SYMBOL: &[u8] = b"fluxmetrics_plugin_manifest\0";

pub type ManifestFn = unsafe extern "C" fn() -> *const PluginManifest;

pub type MetricFnPtr = unsafe extern "C" fn(handle: *const HostHandle, out: *mut f64) -> i32;

#[repr(C)]
pub struct MetricEntry {
    pub name: *const c_char,
    /// Declared parameter count of `func`.
    pub arity: u32,
    pub func: Option<MetricFnPtr>,
}

#[repr(C)]
pub struct PluginManifest {
    pub abi_version: u32,
    pub len: usize,
    pub entries: *const MetricEntry,
}

/// Scheduler access for plugins. Listings are returned as JSON C strings.
#[repr(C)]
pub struct HostHandle {
    pub ctx: *const c_void,
    pub resource_listing_json: unsafe extern "C" fn(ctx: *const c_void) -> *mut c_char,
    pub job_listing_json: unsafe extern "C" fn(ctx: *const c_void) -> *mut c_char,
    pub state_to_name: unsafe extern "C" fn(ctx: *const c_void, state: u32) -> *mut c_char,
    pub free_string: unsafe extern "C" fn(s: *mut c_char),
}

impl HostHandle {
    /// Borrow `handle` for the duration of one plugin call.
    ///
    /// `handle` must outlive every use of the returned value; the caller keeps
    /// both on its stack frame.
    pub fn new(handle: &&dyn SchedulerHandle) -> Self {
        Self {
            ctx: handle as *const &dyn SchedulerHandle as *const c_void,
            resource_listing_json: host_resource_listing_json,
            job_listing_json: host_job_listing_json,
            state_to_name: host_state_to_name,
            free_string: host_free_string,
        }
    }
}

#[derive(Serialize)]
struct JobListing {
    jobs: Vec<JobRecord>,
}

unsafe fn scheduler<'a>(ctx: *const c_void) -> &'a dyn SchedulerHandle {
    *(ctx as *const &dyn SchedulerHandle)
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn host_resource_listing_json(ctx: *const c_void) -> *mut c_char {
    let listing = scheduler(ctx).query_resource_listing();
    match listing.and_then(|l| {
        serde_json::to_string(&l)
            .map_err(|e| fluxmetrics_core::MetricsError::Internal(e.to_string()))
    }) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            tracing::warn!(error = %e, "plugin resource listing query failed");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn host_job_listing_json(ctx: *const c_void) -> *mut c_char {
    let jobs = scheduler(ctx).query_job_listing();
    match jobs.and_then(|jobs| {
        serde_json::to_string(&JobListing { jobs })
            .map_err(|e| fluxmetrics_core::MetricsError::Internal(e.to_string()))
    }) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            tracing::warn!(error = %e, "plugin job listing query failed");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn host_state_to_name(ctx: *const c_void, state: u32) -> *mut c_char {
    into_c_string(scheduler(ctx).state_to_name(state))
}

unsafe extern "C" fn host_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
