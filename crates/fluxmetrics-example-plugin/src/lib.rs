//! Example custom metrics library.
//!
//! ```text
//! cargo build -p fluxmetrics-example-plugin
//! fluxmetrics-apiserver start --custom-metrics target/debug/libfluxmetrics_example_plugin.so
//! ```
//!
//! The library exports `fluxmetrics_plugin_manifest`. Every public entry
//! takes the scheduler handle as its one parameter and writes its value to
//! `out`. Names starting with `_` are private and never served.

use std::ffi::{c_char, c_void, CStr};

use serde_json::Value;

const ABI_VERSION: u32 = 1;

#[repr(C)]
pub struct HostHandle {
    pub ctx: *const c_void,
    pub resource_listing_json: unsafe extern "C" fn(ctx: *const c_void) -> *mut c_char,
    pub job_listing_json: unsafe extern "C" fn(ctx: *const c_void) -> *mut c_char,
    pub state_to_name: unsafe extern "C" fn(ctx: *const c_void, state: u32) -> *mut c_char,
    pub free_string: unsafe extern "C" fn(s: *mut c_char),
}

type MetricFnPtr = unsafe extern "C" fn(handle: *const HostHandle, out: *mut f64) -> i32;

#[repr(C)]
pub struct MetricEntry {
    pub name: *const c_char,
    pub arity: u32,
    pub func: Option<MetricFnPtr>,
}

#[repr(C)]
pub struct PluginManifest {
    pub abi_version: u32,
    pub len: usize,
    pub entries: *const MetricEntry,
}

struct Manifest(PluginManifest);

// Immutable for the life of the library.
unsafe impl Sync for Manifest {}

const ENTRIES: &[MetricEntry] = &[
    MetricEntry {
        name: c"my_custom_metric_name".as_ptr(),
        arity: 1,
        func: Some(my_custom_metric_name),
    },
    MetricEntry {
        name: c"_free_nodes".as_ptr(),
        arity: 1,
        func: Some(free_nodes),
    },
    #[cfg(feature = "no-handle-entry")]
    MetricEntry {
        name: c"uptime_seconds".as_ptr(),
        arity: 0,
        func: Some(free_nodes),
    },
];

static MANIFEST: Manifest = Manifest(PluginManifest {
    abi_version: ABI_VERSION,
    len: ENTRIES.len(),
    entries: ENTRIES.as_ptr(),
});

#[no_mangle]
pub extern "C" fn fluxmetrics_plugin_manifest() -> *const PluginManifest {
    &MANIFEST.0
}

/// Parse a host string and hand it back to the host.
unsafe fn take_json(host: &HostHandle, raw: *mut c_char) -> Option<Value> {
    if raw.is_null() {
        return None;
    }
    let parsed = serde_json::from_slice(CStr::from_ptr(raw).to_bytes()).ok();
    (host.free_string)(raw);
    parsed
}

unsafe fn resource_listing(handle: *const HostHandle) -> Option<Value> {
    let host = handle.as_ref()?;
    take_json(host, (host.resource_listing_json)(host.ctx))
}

/// Free cores across the instance.
unsafe extern "C" fn my_custom_metric_name(handle: *const HostHandle, out: *mut f64) -> i32 {
    let Some(ncores) = resource_listing(handle).and_then(|l| l["free"]["ncores"].as_f64()) else {
        return 1;
    };
    *out = ncores;
    0
}

unsafe extern "C" fn free_nodes(handle: *const HostHandle, out: *mut f64) -> i32 {
    let Some(nodes) = resource_listing(handle).and_then(|l| l["free"]["nodelist"].as_array().map(Vec::len)) else {
        return 1;
    };
    *out = nodes as f64;
    0
}
