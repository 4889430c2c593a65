//! # Configuration
//!
//! Persisted plugin configuration. Each scope (project, engine) keeps a `Config/RenderDoc.toml` file with a `[RenderDoc]` section.
//! Sections and keys this plugin does not know about are carried through a load/save cycle untouched.

use std::path::{Path, PathBuf};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Relative location of the configuration file inside a project or engine directory.
pub const CONFIG_FILE: &str = "Config/RenderDoc.toml";

/// The `[RenderDoc]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RenderDocSection {
	/// Directory of the RenderDoc installation.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub binary_path: Option<PathBuf>,
	pub capture_call_stacks: bool,
	pub ref_all_resources: bool,
	pub save_all_initials: bool,
	pub do_not_strip_shader_debug_data: bool,
	pub capture_all_activity: bool,
	pub greeting_has_been_shown: bool,
	#[serde(flatten)]
	pub other: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ConfigDocument {
	#[serde(rename = "RenderDoc", default)]
	render_doc: RenderDocSection,
	#[serde(flatten)]
	other: toml::Table,
}

#[derive(Debug)]
pub enum ConfigError {
	Io(std::io::Error),
	Parse(toml::de::Error),
	Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Io(error) => write!(f, "configuration file could not be accessed: {}", error),
			ConfigError::Parse(error) => write!(f, "configuration file is not valid TOML: {}", error),
			ConfigError::Serialize(error) => write!(f, "configuration could not be serialized: {}", error),
		}
	}
}

impl From<std::io::Error> for ConfigError {
	fn from(error: std::io::Error) -> Self { ConfigError::Io(error) }
}

/// A scope of persisted configuration.
pub trait ConfigStore {
	fn section(&self) -> &RenderDocSection;
	fn section_mut(&mut self) -> &mut RenderDocSection;

	/// Writes pending changes to persistent storage.
	fn flush(&mut self) -> Result<(), ConfigError>;

	/// The configured installation directory. An empty value counts as unset.
	fn binary_path(&self) -> Option<&Path> {
		self.section().binary_path.as_deref().filter(|path| !path.as_os_str().is_empty())
	}
}

/// Configuration backed by a TOML file.
#[derive(Debug)]
pub struct ConfigFile {
	path: PathBuf,
	document: ConfigDocument,
}

impl ConfigFile {
	/// Opens a configuration file. A missing file yields an empty configuration which is created on the first flush.
	pub fn open(path: impl Into<PathBuf>) -> Result<ConfigFile, ConfigError> {
		let path = path.into();

		let document = match std::fs::read_to_string(&path) {
			Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse)?,
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				debug!("No configuration at {}, starting from defaults", path.display());
				ConfigDocument::default()
			}
			Err(error) => return Err(error.into()),
		};

		Ok(ConfigFile { path, document })
	}

	/// Opens the project scope configuration of the project at `project_dir`.
	pub fn project(project_dir: &Path) -> Result<ConfigFile, ConfigError> {
		ConfigFile::open(project_dir.join(CONFIG_FILE))
	}

	/// Opens the engine scope configuration of the engine at `engine_dir`.
	pub fn engine(engine_dir: &Path) -> Result<ConfigFile, ConfigError> {
		ConfigFile::open(engine_dir.join(CONFIG_FILE))
	}

	pub fn path(&self) -> &Path { &self.path }
}

impl ConfigStore for ConfigFile {
	fn section(&self) -> &RenderDocSection { &self.document.render_doc }

	fn section_mut(&mut self) -> &mut RenderDocSection { &mut self.document.render_doc }

	fn flush(&mut self) -> Result<(), ConfigError> {
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}

		let content = toml::to_string_pretty(&self.document).map_err(ConfigError::Serialize)?;
		std::fs::write(&self.path, content)?;

		trace!("Flushed configuration to {}", self.path.display());

		Ok(())
	}
}

/// In-memory configuration. Counts flushes, for hosts without a config directory and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
	pub section: RenderDocSection,
	pub flushes: u32,
}

impl MemoryConfig {
	pub fn with_binary_path(path: impl Into<PathBuf>) -> MemoryConfig {
		MemoryConfig { section: RenderDocSection { binary_path: Some(path.into()), ..RenderDocSection::default() }, flushes: 0 }
	}
}

impl ConfigStore for MemoryConfig {
	fn section(&self) -> &RenderDocSection { &self.section }

	fn section_mut(&mut self) -> &mut RenderDocSection { &mut self.section }

	fn flush(&mut self) -> Result<(), ConfigError> {
		self.flushes += 1;
		Ok(())
	}
}
