//! # Library Loader
//!
//! Opens the RenderDoc library found in an installation directory and binds its API table.
//! Each step has its own error so a failed startup says exactly what went wrong. The library handle is owned by a value
//! that is dropped on every early return, so no failure path leaks it.

use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::renderdoc_api::{RenderDocApi, RenderDocLibrary, GetApiFn, API_VERSION_1_0_0, GET_API_SYMBOL};

/// File name of the RenderDoc library inside an installation directory.
#[cfg(target_os = "windows")]
pub const LIBRARY_FILE_NAME: &str = "renderdoc.dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_FILE_NAME: &str = "librenderdoc.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_FILE_NAME: &str = "librenderdoc.so";

/// An opened dynamic library. Dropping it releases the OS handle.
pub trait DynamicLibrary: Send + Sync {
	/// Returns the address of an exported symbol, `None` if the library does not export it.
	fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// Opens dynamic libraries.
pub trait LibraryOpener {
	fn open(&self, path: &Path) -> Result<Box<dyn DynamicLibrary>, String>;
}

/// Opens libraries through the OS loader.
pub struct SystemLibraryOpener;

struct SystemLibrary(libloading::Library);

impl LibraryOpener for SystemLibraryOpener {
	fn open(&self, path: &Path) -> Result<Box<dyn DynamicLibrary>, String> {
		// SAFETY: RenderDoc's initialisers only install its hooks.
		let library = unsafe { libloading::Library::new(path) }.map_err(|error| error.to_string())?;

		Ok(Box::new(SystemLibrary(library)))
	}
}

impl DynamicLibrary for SystemLibrary {
	fn symbol(&self, name: &str) -> Option<*const c_void> {
		let name = CString::new(name).ok()?;

		// SAFETY: the symbol is read as an untyped address, it is only cast once its signature is known.
		let symbol = unsafe { self.0.get::<*const c_void>(name.as_bytes_with_nul()) }.ok()?;
		let address = *symbol;

		if address.is_null() { None } else { Some(address) }
	}
}

/// Reasons the RenderDoc library could not be loaded.
#[derive(Debug)]
pub enum LoadError {
	/// The installation directory has no library file.
	FileNotFound(PathBuf),
	/// The OS loader rejected the library (wrong architecture, missing dependencies, corrupted file).
	OpenFailed { path: PathBuf, reason: String },
	/// The library does not export the API factory.
	SymbolNotFound { path: PathBuf, symbol: &'static str },
	/// The library does not provide the requested API version.
	VersionMismatch { path: PathBuf, requested: u32 },
}

impl std::fmt::Display for LoadError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LoadError::FileNotFound(path) => write!(f, "unable to locate RenderDoc library at: {}", path.display()),
			LoadError::OpenFailed { path, reason } => write!(f, "unable to dynamically load RenderDoc library {}: {}", path.display(), reason),
			LoadError::SymbolNotFound { path, symbol } => write!(f, "unable to obtain '{}' from {}, this is likely an incompatible version of RenderDoc", symbol, path.display()),
			LoadError::VersionMismatch { path, requested } => write!(f, "{} does not provide RenderDoc API version {}", path.display(), requested),
		}
	}
}

/// Loads the RenderDoc library from `directory` through the OS loader.
pub fn load(directory: &Path) -> Result<RenderDocLibrary, LoadError> {
	load_with(&SystemLibraryOpener, directory)
}

/// Loads the RenderDoc library from `directory` through `opener`.
pub fn load_with(opener: &dyn LibraryOpener, directory: &Path) -> Result<RenderDocLibrary, LoadError> {
	let path = directory.join(LIBRARY_FILE_NAME);

	if !path.is_file() {
		warn!("unable to locate RenderDoc library at: {}", path.display());
		return Err(LoadError::FileNotFound(path));
	}

	info!("a RenderDoc library has been located at: {}", path.display());

	let library = match opener.open(&path) {
		Ok(library) => library,
		Err(reason) => {
			warn!("unable to dynamically load RenderDoc library: {}", reason);
			return Err(LoadError::OpenFailed { path, reason });
		}
	};

	let Some(get_api) = library.symbol(GET_API_SYMBOL) else {
		warn!("unable to obtain '{}' from {}. You are likely using an incompatible version of RenderDoc.", GET_API_SYMBOL, path.display());
		return Err(LoadError::SymbolNotFound { path, symbol: GET_API_SYMBOL });
	};

	// SAFETY: `RENDERDOC_GetAPI` has had this signature since the first versioned API.
	let get_api = unsafe { std::mem::transmute::<*const c_void, GetApiFn>(get_api) };

	let mut api: *mut c_void = std::ptr::null_mut();

	let status = unsafe { get_api(API_VERSION_1_0_0, &mut api) };

	let Some(api) = std::ptr::NonNull::new(api.cast::<RenderDocApi>()).filter(|_| status != 0) else {
		warn!("unable to initialize RenderDoc library due to API incompatibility (requires API version {}).", API_VERSION_1_0_0);
		return Err(LoadError::VersionMismatch { path, requested: API_VERSION_1_0_0 });
	};

	let library = unsafe { RenderDocLibrary::new(library, api, path) };

	let (major, minor, patch) = ghi::RenderDebugger::api_version(&library);
	info!("RenderDoc library has been loaded (RenderDoc API v{}.{}.{}).", major, minor, patch);

	Ok(library)
}
