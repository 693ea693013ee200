use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use fluxmetrics_core::error::{MetricsError, Result};
use fluxmetrics_core::protocol::MetricScalar;
use fluxmetrics_core::{CustomMetric, MetricRegistry, SchedulerHandle};

use super::abi::{HostHandle, ManifestFn, MetricFnPtr, PluginManifest, ABI_VERSION, MANIFEST_SYMBOL};

/// One metric exported by a plugin library.
pub struct PluginMetric {
    name: String,
    arity: u32,
    func: MetricFnPtr,
    // Keeps the code behind `func` mapped.
    _library: Option<Arc<Library>>,
}

impl PluginMetric {
    pub fn arity(&self) -> u32 {
        self.arity
    }
}

impl CustomMetric for PluginMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, handle: &dyn SchedulerHandle) -> Result<MetricScalar> {
        let host = HostHandle::new(&handle);
        let mut out = 0f64;
        let status = unsafe { (self.func)(&host, &mut out) };
        if status != 0 {
            return Err(MetricsError::provider(
                &self.name,
                format!("plugin function returned status {status}"),
            ));
        }
        Ok(MetricScalar::from_f64(out))
    }
}

/// Load the plugin library at `path` and register every metric it exports.
///
/// The library is copied into a fresh temporary directory and opened from
/// there, so the caller's directory is never touched; the directory is
/// removed once the library is mapped. Returns the number of metrics
/// installed.
pub fn load(path: &Path, registry: &mut MetricRegistry) -> Result<usize> {
    let staging = tempfile::Builder::new()
        .prefix("fluxmetrics-plugin-")
        .tempdir()
        .map_err(|e| MetricsError::Config(format!("cannot create plugin staging dir: {e}")))?;
    let staged = stage(path, staging.path())?;

    let library = unsafe { Library::new(&staged) }.map_err(|e| {
        MetricsError::Config(format!("cannot load custom metrics {}: {e}", path.display()))
    })?;

    if let Err(e) = staging.close() {
        tracing::warn!(error = %e, "plugin staging dir not removed");
    }

    let library = Arc::new(library);
    let manifest = {
        let manifest_fn: Symbol<ManifestFn> = unsafe { library.get(MANIFEST_SYMBOL) }.map_err(|e| {
            MetricsError::Config(format!(
                "{} does not export fluxmetrics_plugin_manifest: {e}",
                path.display()
            ))
        })?;
        unsafe { manifest_fn() }
    };

    let metrics = unsafe { collect_entries(manifest, Some(Arc::clone(&library))) }?;
    let installed = metrics.len();
    for metric in metrics {
        tracing::info!(metric = %metric.name, arity = metric.arity, "custom metric installed");
        registry.register_custom(Arc::new(metric))?;
    }

    tracing::info!(path = %path.display(), installed, "custom metrics loaded");
    Ok(installed)
}

fn stage(path: &Path, dir: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        MetricsError::Config(format!("custom metrics path has no file name: {}", path.display()))
    })?;
    let staged = dir.join(file_name);
    std::fs::copy(path, &staged).map_err(|e| {
        MetricsError::Config(format!("cannot read custom metrics {}: {e}", path.display()))
    })?;
    Ok(staged)
}

/// Validate a manifest and turn its eligible entries into metrics.
///
/// Entries whose name starts with `_` or that carry no function are skipped.
/// An entry declaring zero parameters is a configuration error: it could not
/// receive the scheduler handle.
///
/// # Safety
/// `manifest` must be null or point to a `PluginManifest` whose `entries`
/// array and name strings stay valid while `library` (or, without one, the
/// caller) keeps them alive.
pub unsafe fn collect_entries(
    manifest: *const PluginManifest,
    library: Option<Arc<Library>>,
) -> Result<Vec<PluginMetric>> {
    let manifest = manifest
        .as_ref()
        .ok_or_else(|| MetricsError::Config("plugin returned a null manifest".into()))?;

    if manifest.abi_version != ABI_VERSION {
        return Err(MetricsError::Config(format!(
            "plugin ABI version {} is not supported (expected {ABI_VERSION})",
            manifest.abi_version
        )));
    }
    if manifest.len == 0 {
        return Ok(Vec::new());
    }
    if manifest.entries.is_null() {
        return Err(MetricsError::Config("plugin manifest has entries but a null array".into()));
    }

    let entries = std::slice::from_raw_parts(manifest.entries, manifest.len);
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.name.is_null() {
            tracing::warn!("plugin entry without a name skipped");
            continue;
        }
        let name = CStr::from_ptr(entry.name)
            .to_str()
            .map_err(|e| MetricsError::Config(format!("plugin metric name is not UTF-8: {e}")))?
            .to_string();

        if name.starts_with('_') {
            tracing::debug!(%name, "private plugin symbol skipped");
            continue;
        }
        let Some(func) = entry.func else {
            tracing::debug!(%name, "plugin entry is not callable, skipped");
            continue;
        };

        match entry.arity {
            0 => {
                return Err(MetricsError::Config(format!(
                    "custom metric `{name}` takes no parameters; it must accept the scheduler handle"
                )));
            }
            1 => {}
            n => tracing::warn!(%name, arity = n, "custom metric declares extra parameters; only the scheduler handle is passed"),
        }

        out.push(PluginMetric {
            name,
            arity: entry.arity,
            func,
            _library: library.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::ffi::{c_char, CStr};

    use fluxmetrics_core::{JobRecord, ResourceListing, ResourceSet};

    use super::*;
    use crate::plugin::abi::MetricEntry;

    struct ThreeUp;

    impl SchedulerHandle for ThreeUp {
        fn query_resource_listing(&self) -> Result<ResourceListing> {
            Ok(ResourceListing {
                up: ResourceSet {
                    ncores: 12,
                    nodelist: vec!["a".into(), "b".into(), "c".into()],
                },
                free: ResourceSet::default(),
            })
        }
        fn query_job_listing(&self) -> Result<Vec<JobRecord>> {
            Ok(vec![JobRecord { state: 16 }])
        }
    }

    unsafe fn take_string(host: &HostHandle, raw: *mut c_char) -> Option<String> {
        if raw.is_null() {
            return None;
        }
        let s = CStr::from_ptr(raw).to_string_lossy().into_owned();
        (host.free_string)(raw);
        Some(s)
    }

    unsafe extern "C" fn up_nodes(handle: *const HostHandle, out: *mut f64) -> i32 {
        let host = &*handle;
        let Some(json) = take_string(host, (host.resource_listing_json)(host.ctx)) else {
            return 1;
        };
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        *out = v["up"]["nodelist"].as_array().map(|a| a.len()).unwrap_or(0) as f64;
        0
    }

    unsafe extern "C" fn running_jobs(handle: *const HostHandle, out: *mut f64) -> i32 {
        let host = &*handle;
        let json = take_string(host, (host.job_listing_json)(host.ctx)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        let name = take_string(host, (host.state_to_name)(host.ctx, 16)).unwrap();
        *out = if name == "RUN" { v["jobs"].as_array().unwrap().len() as f64 } else { -1.0 };
        0
    }

    unsafe extern "C" fn failing(_: *const HostHandle, _: *mut f64) -> i32 {
        7
    }

    fn manifest(entries: &[MetricEntry]) -> PluginManifest {
        PluginManifest {
            abi_version: ABI_VERSION,
            len: entries.len(),
            entries: entries.as_ptr(),
        }
    }

    #[test]
    fn eligible_entries_are_collected_and_callable() {
        let entries = [
            MetricEntry { name: c"plugin_up_nodes".as_ptr(), arity: 1, func: Some(up_nodes) },
            MetricEntry { name: c"plugin_running".as_ptr(), arity: 2, func: Some(running_jobs) },
            MetricEntry { name: c"_helper".as_ptr(), arity: 1, func: Some(up_nodes) },
            MetricEntry { name: c"VERSION".as_ptr(), arity: 0, func: None },
        ];
        let m = manifest(&entries);
        let metrics = unsafe { collect_entries(&m, None) }.unwrap();

        let names: Vec<&str> = metrics.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["plugin_up_nodes", "plugin_running"]);
        assert_eq!(metrics[0].evaluate(&ThreeUp).unwrap(), MetricScalar::Integer(3));
        assert_eq!(metrics[1].evaluate(&ThreeUp).unwrap(), MetricScalar::Integer(1));
    }

    #[test]
    fn zero_parameter_entry_is_fatal_and_named() {
        let entries = [
            MetricEntry { name: c"fine".as_ptr(), arity: 1, func: Some(up_nodes) },
            MetricEntry { name: c"no_handle".as_ptr(), arity: 0, func: Some(up_nodes) },
        ];
        let m = manifest(&entries);
        let err = unsafe { collect_entries(&m, None) }.err().expect("zero arity rejected");
        assert_eq!(err.client_code().as_str(), "CONFIG");
        assert!(err.to_string().contains("`no_handle`"));
    }

    #[test]
    fn abi_mismatch_and_null_manifest_are_rejected() {
        let m = PluginManifest { abi_version: ABI_VERSION + 1, len: 0, entries: std::ptr::null() };
        assert!(unsafe { collect_entries(&m, None) }.is_err());
        assert!(unsafe { collect_entries(std::ptr::null(), None) }.is_err());
    }

    #[test]
    fn failing_plugin_function_is_a_provider_error() {
        let entries = [MetricEntry { name: c"broken".as_ptr(), arity: 1, func: Some(failing) }];
        let m = manifest(&entries);
        let metrics = unsafe { collect_entries(&m, None) }.unwrap();
        let err = metrics[0].evaluate(&ThreeUp).unwrap_err();
        assert!(matches!(err, MetricsError::Provider { ref name, .. } if name == "broken"));
    }

    #[test]
    fn missing_library_is_a_config_error() {
        let mut registry = MetricRegistry::new(Arc::new(ThreeUp));
        let err = load(Path::new("/nonexistent/custom-metrics.so"), &mut registry).unwrap_err();
        assert_eq!(err.client_code().as_str(), "CONFIG");
        assert_eq!(registry.custom_len(), 0);
    }

    #[test]
    fn non_library_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom-metrics.so");
        std::fs::write(&path, b"def my_metric(handle): return 1\n").unwrap();

        let mut registry = MetricRegistry::new(Arc::new(ThreeUp));
        let err = load(&path, &mut registry).unwrap_err();
        assert_eq!(err.client_code().as_str(), "CONFIG");
        assert!(path.exists());
    }
}
