//! # Library Locator
//!
//! Finds the directory of a RenderDoc installation. Sources are tried in order and the first accepted candidate wins:
//! 1. the project configuration,
//! 2. the engine configuration,
//! 3. discovery sources, by default the system registry and an interactive file picker.
//!
//! A directory found through discovery is written back to the project configuration so later startups skip discovery.

use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::loader::LIBRARY_FILE_NAME;

/// A way of discovering a RenderDoc installation when none is configured.
pub trait InstallationSource {
	/// Name of the source, for logs.
	fn name(&self) -> &str;

	/// Returns a candidate path. It may name a file inside the installation, in which case its parent directory is used.
	fn find(&mut self) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
	/// No source produced an acceptable installation, or the user cancelled the picker.
	NotFound,
}

impl std::fmt::Display for DiscoveryError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			DiscoveryError::NotFound => write!(f, "could not locate a RenderDoc installation"),
		}
	}
}

/// Reads the installation registered by the RenderDoc installer for its capture file association.
pub struct RegistrySource;

#[cfg(target_os = "windows")]
impl RegistrySource {
	fn query() -> Option<String> {
		use windows::core::{w, PCWSTR};
		use windows::Win32::Foundation::ERROR_SUCCESS;
		use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};

		let mut buffer = [0u16; 1024];
		let mut size = std::mem::size_of_val(&buffer) as u32;

		let status = unsafe {
			RegGetValueW(
				HKEY_LOCAL_MACHINE,
				w!("SOFTWARE\\Classes\\RenderDoc.RDCCapture.1\\DefaultIcon"),
				PCWSTR::null(),
				RRF_RT_REG_SZ,
				None,
				Some(buffer.as_mut_ptr().cast()),
				Some(&mut size as *mut u32),
			)
		};

		if status != ERROR_SUCCESS {
			debug!("RenderDoc capture association is not registered: {:?}", status);
			return None;
		}

		let length = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());

		Some(String::from_utf16_lossy(&buffer[..length]))
	}
}

#[cfg(not(target_os = "windows"))]
impl RegistrySource {
	fn query() -> Option<String> { None }
}

/// Turns a `DefaultIcon` value (`"C:\Program Files\RenderDoc\renderdocui.exe",0`) into the path it names.
pub fn parse_icon_value(value: &str) -> Option<PathBuf> {
	let value = value.trim();

	let path = if let Some(quoted) = value.strip_prefix('"') {
		&quoted[..quoted.find('"')?]
	} else {
		match value.rsplit_once(',') {
			Some((path, index)) if index.trim().parse::<i32>().is_ok() => path,
			_ => value,
		}
	};

	let path = path.trim();

	if path.is_empty() { None } else { Some(PathBuf::from(path)) }
}

impl InstallationSource for RegistrySource {
	fn name(&self) -> &str { "registry" }

	fn find(&mut self) -> Option<PathBuf> {
		parse_icon_value(&RegistrySource::query()?)
	}
}

/// Asks the user to pick the RenderDoc executable.
pub struct FilePickerSource;

impl InstallationSource for FilePickerSource {
	fn name(&self) -> &str { "file picker" }

	#[cfg(feature = "file-dialog")]
	fn find(&mut self) -> Option<PathBuf> {
		let names = crate::paths::VIEWER_EXECUTABLES.iter().map(|name| name.trim_end_matches(".exe")).collect::<Vec<_>>();

		let path = rfd::FileDialog::new().set_title("Locate RenderDoc executable...").pick_file()?;

		let accepted = path.file_stem().and_then(|stem| stem.to_str()).is_some_and(|stem| names.iter().any(|name| name.eq_ignore_ascii_case(stem)));

		if !accepted {
			warn!("{} is not a RenderDoc executable", path.display());
			return None;
		}

		Some(path)
	}

	#[cfg(not(feature = "file-dialog"))]
	fn find(&mut self) -> Option<PathBuf> {
		debug!("Built without the file-dialog feature, cannot ask for a RenderDoc installation");
		None
	}
}

/// Whether `directory` holds a RenderDoc library.
pub fn has_library(directory: &Path) -> bool {
	directory.join(LIBRARY_FILE_NAME).is_file()
}

pub struct Locator<'a> {
	project: &'a mut dyn ConfigStore,
	engine: Option<&'a dyn ConfigStore>,
	discovery: Vec<Box<dyn InstallationSource + 'a>>,
}

impl<'a> Locator<'a> {
	/// A locator with the default discovery sources: the registry, then the file picker.
	pub fn new(project: &'a mut dyn ConfigStore, engine: Option<&'a dyn ConfigStore>) -> Locator<'a> {
		Locator::with_sources(project, engine, vec![Box::new(RegistrySource), Box::new(FilePickerSource)])
	}

	pub fn with_sources(project: &'a mut dyn ConfigStore, engine: Option<&'a dyn ConfigStore>, discovery: Vec<Box<dyn InstallationSource + 'a>>) -> Locator<'a> {
		Locator { project, engine, discovery }
	}

	/// Locates an installation that holds the RenderDoc library.
	pub fn locate(&mut self) -> Result<PathBuf, DiscoveryError> {
		self.locate_with(|directory| has_library(directory))
	}

	/// Locates an installation accepted by `accept`. Rejected candidates fall through to the next source.
	pub fn locate_with(&mut self, mut accept: impl FnMut(&Path) -> bool) -> Result<PathBuf, DiscoveryError> {
		if let Some(directory) = self.project.binary_path().map(Path::to_path_buf) {
			if accept(&directory) {
				debug!("Using RenderDoc installation from project configuration: {}", directory.display());
				return Ok(directory);
			}

			warn!("RenderDoc installation configured by the project is unusable: {}", directory.display());
		}

		if let Some(directory) = self.engine.and_then(|engine| engine.binary_path()).map(Path::to_path_buf) {
			if accept(&directory) {
				debug!("Using RenderDoc installation from engine configuration: {}", directory.display());
				return Ok(directory);
			}

			warn!("RenderDoc installation configured by the engine is unusable: {}", directory.display());
		}

		for source in self.discovery.iter_mut() {
			let Some(candidate) = source.find() else {
				debug!("No RenderDoc installation from {}", source.name());
				continue;
			};

			let directory = if candidate.is_dir() {
				candidate
			} else {
				match candidate.parent() {
					Some(parent) => parent.to_path_buf(),
					None => continue,
				}
			};

			if !accept(&directory) {
				warn!("RenderDoc installation from {} is unusable: {}", source.name(), directory.display());
				continue;
			}

			info!("Found RenderDoc installation through {}: {}", source.name(), directory.display());

			self.project.section_mut().binary_path = Some(directory.clone());

			if let Err(error) = self.project.flush() {
				error!("Could not persist RenderDoc installation path: {}", error);
			}

			return Ok(directory);
		}

		Err(DiscoveryError::NotFound)
	}
}
