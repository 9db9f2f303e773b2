//! Loading the engine shared library and holding its entry points.
//!
//! The library is loaded by name at runtime; nothing links against the engine
//! at build time. Loading happens once per session-creation attempt, from a
//! single control flow, so there are no caching races. A failed load leaves
//! the caller without a library value and every dependent operation becomes a
//! no-op.

use crate::error::{Error, Result};
use crate::ffi::EntryPoints;
use libloading::Library;
use tracing::{debug, warn};

/// Conventional engine library names for the current platform, tried in
/// order.
#[cfg(target_os = "windows")]
const DEFAULT_NAMES: &[&str] = &["mpv-2.dll", "mpv-1.dll", "libmpv-2.dll"];

#[cfg(target_os = "macos")]
const DEFAULT_NAMES: &[&str] = &["libmpv.2.dylib", "libmpv.dylib"];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_NAMES: &[&str] = &["libmpv.so.2", "libmpv.so.1", "libmpv.so"];

/// The loaded engine module plus its resolved entry point set.
///
/// The `Library` is kept alive for as long as this value exists; the copied
/// function pointers in [`EntryPoints`] are only valid under that guarantee.
pub struct EngineLibrary {
    entry: EntryPoints,
    _lib: Option<Library>,
}

impl EngineLibrary {
    /// Load the engine library by name (a bare soname or a path) and resolve
    /// its entry points once.
    ///
    /// A missing library is a load error. A missing individual symbol is not:
    /// it stays `None` in the entry set and its operations degrade to no-ops.
    pub fn load(name: &str) -> Result<EngineLibrary> {
        let lib =
            unsafe { Library::new(name) }.map_err(|e| Error::LoadFailed(e.to_string()))?;
        let entry = unsafe { EntryPoints::resolve(&lib) };

        let missing = entry.missing();
        if missing.is_empty() {
            debug!("loaded engine library {}", name);
        } else {
            warn!(
                "engine library {} loaded with unresolved entry points: {}",
                name,
                missing.join(", ")
            );
        }

        Ok(EngineLibrary {
            entry,
            _lib: Some(lib),
        })
    }

    /// Try the platform's conventional library names in order.
    pub fn load_default() -> Result<EngineLibrary> {
        let mut last = Error::LoadFailed("no candidate names".to_string());
        for name in DEFAULT_NAMES {
            match EngineLibrary::load(name) {
                Ok(lib) => return Ok(lib),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// The resolved entry point set.
    pub fn entry(&self) -> &EntryPoints {
        &self.entry
    }

    /// Build a library around an entry set supplied in-process. Tests drive
    /// the call paths against stub entry points this way; no engine binary is
    /// involved.
    #[cfg(test)]
    pub(crate) fn from_entry_points(entry: EntryPoints) -> EngineLibrary {
        EngineLibrary { entry, _lib: None }
    }
}
