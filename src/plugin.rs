//! # RenderDoc Plugin
//!
//! The plugin as seen by the host engine. The host owns it, forwards its ticks to [`RenderDocPlugin::tick`]
//! and requests captures with [`RenderDocPlugin::capture_frame`].
//!
//! Startup brings the pieces up in order: the RenderDoc library (injected, or located and loaded), its configuration,
//! the viewer launcher and the capture session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ghi::{CaptureInfo, InjectedRenderDoc, OverlayBits, RenderCommandQueue, RenderDebugger};
use log::{debug, error, info, warn};

use crate::config::{ConfigError, ConfigStore};
use crate::host::HostEngine;
use crate::launcher::{LaunchHandle, LaunchStrategy, RemoteAccess, ViewerLauncher};
use crate::loader::{self, LibraryOpener, LoadError};
use crate::locator::{DiscoveryError, Locator};
use crate::paths;
use crate::session::CaptureSession;
use crate::settings::{CaptureSettings, Setting};
use crate::tick::{FrameCaptureController, TickAction};

/// How the viewer is opened once a capture has ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerMode {
	/// Through the library's replay UI.
	#[default]
	ReplayApi,
	/// By spawning the viewer executable of the installation.
	ExternalProcess { remote_access: Option<RemoteAccess> },
}

#[derive(Debug, Clone)]
pub struct PluginOptions {
	/// Use a RenderDoc library already loaded into the process before looking for one on disk.
	pub attach_to_injected: bool,
	/// Open the viewer after each capture.
	pub launch_viewer: bool,
	pub viewer_mode: ViewerMode,
	/// Delay between the end of a capture and the viewer launch. Defaults to the launch strategy's delay.
	pub launch_delay: Option<Duration>,
}

impl Default for PluginOptions {
	fn default() -> Self {
		PluginOptions { attach_to_injected: true, launch_viewer: true, viewer_mode: ViewerMode::default(), launch_delay: None }
	}
}

#[derive(Debug)]
pub enum StartupError {
	/// The host runs without a renderer, there is nothing to capture.
	NullRenderer,
	/// No RenderDoc installation could be found.
	DiscoveryFailed(DiscoveryError),
	/// An installation was found but its library could not be loaded.
	LoadFailed(LoadError),
	/// The capture directory could not be created.
	CaptureDirectory(std::io::Error),
}

impl std::fmt::Display for StartupError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StartupError::NullRenderer => write!(f, "RenderDoc plugin will not be loaded because a null renderer is in use"),
			StartupError::DiscoveryFailed(error) => write!(f, "RenderDoc plugin will not be loaded: {}", error),
			StartupError::LoadFailed(error) => write!(f, "RenderDoc plugin will not be loaded: {}", error),
			StartupError::CaptureDirectory(error) => write!(f, "RenderDoc capture directory could not be created: {}", error),
		}
	}
}

pub struct RenderDocPlugin {
	host: Arc<dyn HostEngine>,
	session: CaptureSession,
	controller: FrameCaptureController,
	settings: CaptureSettings,
	installation: Option<PathBuf>,
	_launcher: Option<ViewerLauncher>,
}

impl RenderDocPlugin {
	/// Starts the plugin. Attaches to an injected RenderDoc if allowed, otherwise locates an installation whose library loads.
	pub fn startup(host: Arc<dyn HostEngine>, queue: Arc<dyn RenderCommandQueue>, locator: &mut Locator, opener: &dyn LibraryOpener, settings: CaptureSettings, options: PluginOptions) -> Result<RenderDocPlugin, StartupError> {
		if host.uses_null_renderer() {
			warn!("{}", StartupError::NullRenderer);
			return Err(StartupError::NullRenderer);
		}

		if options.attach_to_injected {
			if let Some(injected) = InjectedRenderDoc::attach() {
				info!("Attached to the RenderDoc library injected into this process");
				return RenderDocPlugin::with_debugger(host, queue, Arc::new(injected), None, settings, options);
			}
		}

		let mut loaded = None;
		let mut last_error = None;

		let located = locator.locate_with(|directory| match loader::load_with(opener, directory) {
			Ok(library) => {
				loaded = Some(library);
				true
			}
			Err(error) => {
				last_error = Some(error);
				false
			}
		});

		let library = match (located, loaded) {
			(Ok(_), Some(library)) => library,
			(located, _) => {
				let error = match last_error {
					Some(load_error) => StartupError::LoadFailed(load_error),
					None => StartupError::DiscoveryFailed(located.err().unwrap_or(DiscoveryError::NotFound)),
				};

				error!("{}", error);
				host.show_message(&error.to_string());

				return Err(error);
			}
		};

		let installation = library.path().parent().map(Path::to_path_buf);

		RenderDocPlugin::with_debugger(host, queue, Arc::new(library), installation, settings, options)
	}

	/// Starts the plugin on an already available debugger. `installation` is the RenderDoc directory, if known.
	pub fn with_debugger(host: Arc<dyn HostEngine>, queue: Arc<dyn RenderCommandQueue>, debugger: Arc<dyn RenderDebugger>, installation: Option<PathBuf>, settings: CaptureSettings, options: PluginOptions) -> Result<RenderDocPlugin, StartupError> {
		let capture_directory = paths::capture_directory(&host.project_saved_dir());

		std::fs::create_dir_all(&capture_directory).map_err(|error| {
			error!("RenderDoc capture directory {} could not be created: {}", capture_directory.display(), error);
			StartupError::CaptureDirectory(error)
		})?;

		if debugger.is_injected() {
			debug!("RenderDoc UI owns capture paths and hot keys");
		} else {
			let template = paths::capture_path_template(&capture_directory, paths::now());
			debug!("Saving RenderDoc captures to {}", template.display());

			debugger.set_capture_file_path_template(&template);
			// The engine owns the keyboard.
			debugger.set_focus_toggle_keys(&[]);
			debugger.set_capture_keys(&[]);
			debugger.mask_overlay_bits(OverlayBits::empty(), OverlayBits::empty());
		}

		let capture_options = settings.capture_options();
		capture_options.apply_or_report(debugger.as_ref());

		host.keep_shader_debug_info(settings.do_not_strip_shader_debug_data);

		let launcher = if options.launch_viewer {
			let strategy = RenderDocPlugin::launch_strategy(&options.viewer_mode, installation.as_deref());
			let delay = options.launch_delay.unwrap_or_else(|| strategy.default_delay());

			match ViewerLauncher::spawn(strategy, debugger.clone(), delay) {
				Ok(launcher) => Some(launcher),
				Err(error) => {
					error!("RenderDoc viewer launcher could not be started, captures will not be opened: {}", error);
					None
				}
			}
		} else {
			None
		};

		let launch = launcher.as_ref().map_or_else(LaunchHandle::disabled, ViewerLauncher::handle);

		let session = CaptureSession::new(debugger, host.clone(), queue, launch, capture_directory, capture_options);

		let (major, minor, patch) = session.debugger().api_version();
		info!("RenderDoc plugin is ready (RenderDoc API v{}.{}.{})", major, minor, patch);

		Ok(RenderDocPlugin { host, session, controller: FrameCaptureController::new(), settings, installation, _launcher: launcher })
	}

	fn launch_strategy(mode: &ViewerMode, installation: Option<&Path>) -> LaunchStrategy {
		match mode {
			ViewerMode::ReplayApi => LaunchStrategy::ReplayApi,
			ViewerMode::ExternalProcess { remote_access } => match installation.and_then(paths::find_viewer) {
				Some(viewer) => LaunchStrategy::ExternalProcess { viewer, remote_access: remote_access.clone() },
				None => {
					warn!("No RenderDoc viewer executable found, falling back to the replay UI");
					LaunchStrategy::ReplayApi
				}
			},
		}
	}

	/// Captures the next frame. With `CaptureAllActivity` the whole next engine tick is captured,
	/// otherwise only a redraw of the active viewport. Returns `false` if the request was ignored.
	pub fn capture_frame(&mut self, tick: u64) -> bool {
		if self.settings.capture_all_activity {
			return self.controller.request(tick);
		}

		if !self.session.begin_capture() {
			return false;
		}

		self.host.redraw_active_viewport();

		self.session.end_capture()
	}

	/// Drives whole tick captures. Call once per engine tick, from the main thread.
	pub fn tick(&mut self, tick: u64) {
		match self.controller.on_tick(tick) {
			Some(TickAction::BeginCapture) => {
				self.session.begin_capture();
			}
			Some(TickAction::EndCapture) => {
				self.session.end_capture();
			}
			None => {}
		}
	}

	/// Lets RenderDoc capture the next frame presented.
	pub fn trigger_capture(&self) {
		self.session.debugger().trigger_capture();
	}

	pub fn settings(&self) -> &CaptureSettings { &self.settings }

	pub fn set_settings(&mut self, settings: CaptureSettings) {
		let capture_options = settings.capture_options();
		capture_options.apply_or_report(self.session.debugger().as_ref());

		if settings.do_not_strip_shader_debug_data != self.settings.do_not_strip_shader_debug_data {
			self.host.keep_shader_debug_info(settings.do_not_strip_shader_debug_data);
		}

		self.session.set_options(capture_options);
		self.settings = settings;
	}

	/// Toggles a setting, applies it and saves the settings. Returns the new value.
	pub fn toggle_setting(&mut self, setting: Setting, store: &mut dyn ConfigStore) -> Result<bool, ConfigError> {
		let mut settings = self.settings;
		let value = settings.toggle(setting);

		self.set_settings(settings);
		self.save_settings(store)?;

		Ok(value)
	}

	pub fn save_settings(&self, store: &mut dyn ConfigStore) -> Result<(), ConfigError> {
		self.settings.save(store)
	}

	/// The RenderDoc installation directory, `None` when attached to an injected library.
	pub fn installation(&self) -> Option<&Path> { self.installation.as_deref() }

	pub fn capture_directory(&self) -> &Path { self.session.capture_directory() }

	pub fn is_capturing(&self) -> bool { self.session.is_capturing() }

	/// Every capture made by this process, oldest first.
	pub fn captures(&self) -> Vec<CaptureInfo> {
		ghi::captures(self.session.debugger().as_ref())
	}

	pub fn shutdown(self) {
		if let Some(requested) = self.controller.tick_number() {
			debug!("Shutting down with a whole tick capture requested at tick {}", requested);
		}

		info!("RenderDoc plugin shut down");
	}
}

/// Returns `true` the first time it is called for a project, persisting that the greeting was shown.
pub fn take_greeting(store: &mut dyn ConfigStore) -> bool {
	if store.section().greeting_has_been_shown {
		return false;
	}

	store.section_mut().greeting_has_been_shown = true;

	if let Err(error) = store.flush() {
		error!("Could not persist RenderDoc greeting state: {}", error);
	}

	true
}
