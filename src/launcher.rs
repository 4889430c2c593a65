//! # Viewer Launcher
//!
//! Opens the newest capture in the RenderDoc viewer once a capture has ended.
//! Launching happens on a dedicated long lived worker thread fed by a channel, the render and main threads only schedule launches.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::time::Duration;

use ghi::RenderDebugger;
use log::{debug, error, info};

use crate::paths;

/// Port RenderDoc's remote access server listens on.
pub const DEFAULT_REMOTE_ACCESS_PORT: u16 = 38920;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccess {
	pub host: String,
	pub port: u16,
}

impl Default for RemoteAccess {
	fn default() -> Self {
		RemoteAccess { host: "localhost".to_string(), port: DEFAULT_REMOTE_ACCESS_PORT }
	}
}

/// How the viewer is opened on the newest capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LaunchStrategy {
	/// Spawn the viewer executable on the most recently modified file of the capture directory.
	ExternalProcess { viewer: PathBuf, remote_access: Option<RemoteAccess> },
	/// Ask the loaded library to launch its replay UI on the newest capture it made.
	#[default]
	ReplayApi,
}

impl LaunchStrategy {
	/// How long to wait after a capture ends before looking for it.
	/// The library may still be writing the file when the external strategy scans the directory.
	pub fn default_delay(&self) -> Duration {
		match self {
			LaunchStrategy::ExternalProcess { .. } => Duration::from_secs(2),
			LaunchStrategy::ReplayApi => Duration::ZERO,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
	pub capture_directory: PathBuf,
}

#[derive(Debug)]
pub enum LaunchError {
	SpawnFailed { viewer: PathBuf, error: std::io::Error },
	ReplayUiFailed { capture: PathBuf },
}

impl std::fmt::Display for LaunchError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			LaunchError::SpawnFailed { viewer, error } => write!(f, "could not launch RenderDoc viewer {}: {}", viewer.display(), error),
			LaunchError::ReplayUiFailed { capture } => write!(f, "RenderDoc could not launch its replay UI on {}", capture.display()),
		}
	}
}

/// Returns the file under `directory`, searched recursively, that was modified most recently.
pub fn newest_capture_in(directory: &Path) -> Option<PathBuf> {
	paths::files_under(directory).into_iter()
		.filter_map(|(path, metadata)| {
			// Files stamped in the future count as brand new.
			let age = metadata.modified().ok()?.elapsed().unwrap_or(Duration::ZERO);
			Some((age, path))
		})
		.min_by_key(|(age, _)| *age)
		.map(|(_, path)| path)
}

/// Returns the newest capture registered by the debugger in this process.
pub fn newest_registered_capture(debugger: &dyn RenderDebugger) -> Option<PathBuf> {
	ghi::captures(debugger).pop().map(|capture| capture.path)
}

/// Builds `<viewer> [--remoteaccess host:port] <capture>`.
pub fn viewer_command(viewer: &Path, remote_access: Option<&RemoteAccess>, capture: &Path) -> Command {
	let mut command = Command::new(viewer);

	if let Some(remote_access) = remote_access {
		command.arg("--remoteaccess").arg(format!("{}:{}", remote_access.host, remote_access.port));
	}

	command.arg(capture);

	command
}

/// Spawns the viewer on the newest file of `capture_directory`. Returns the viewer's process id, `None` if there is no capture.
pub fn launch_external(viewer: &Path, remote_access: Option<&RemoteAccess>, capture_directory: &Path) -> Result<Option<u32>, LaunchError> {
	let Some(capture) = newest_capture_in(capture_directory) else {
		debug!("No capture in {}, not launching the viewer", capture_directory.display());
		return Ok(None);
	};

	let capture = std::path::absolute(&capture).unwrap_or(capture);

	let child = viewer_command(viewer, remote_access, &capture)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()
		.map_err(|error| LaunchError::SpawnFailed { viewer: viewer.to_path_buf(), error })?;

	Ok(Some(child.id()))
}

/// Launches the library's replay UI on its newest capture, unless a replay UI is already connected.
/// Returns the replay UI process id, `None` if nothing was launched.
pub fn launch_replay_ui(debugger: &dyn RenderDebugger) -> Result<Option<u32>, LaunchError> {
	let Some(capture) = newest_registered_capture(debugger) else {
		debug!("RenderDoc has no capture yet, not launching the replay UI");
		return Ok(None);
	};

	if debugger.is_remote_access_connected() {
		debug!("A replay UI is already connected, it picks up {} by itself", capture.display());
		return Ok(None);
	}

	let command_line = format!("\"{}\"", capture.display());

	match debugger.launch_replay_ui(true, Some(&command_line)) {
		0 => Err(LaunchError::ReplayUiFailed { capture }),
		pid => Ok(Some(pid)),
	}
}

enum LaunchMessage {
	Launch(LaunchRequest),
	Shutdown,
}

/// The viewer worker thread. Dropping it lets the worker finish the launches already scheduled.
pub struct ViewerLauncher {
	sender: Sender<LaunchMessage>,
	worker: Option<std::thread::JoinHandle<()>>,
}

impl ViewerLauncher {
	pub fn spawn(strategy: LaunchStrategy, debugger: Arc<dyn RenderDebugger>, delay: Duration) -> std::io::Result<ViewerLauncher> {
		let (sender, receiver) = channel::<LaunchMessage>();

		let worker = std::thread::Builder::new().name("RenderDoc viewer launcher".to_string()).spawn(move || {
			while let Ok(LaunchMessage::Launch(request)) = receiver.recv() {
				if !delay.is_zero() {
					std::thread::sleep(delay);
				}

				let result = match &strategy {
					LaunchStrategy::ExternalProcess { viewer, remote_access } => launch_external(viewer, remote_access.as_ref(), &request.capture_directory),
					LaunchStrategy::ReplayApi => launch_replay_ui(debugger.as_ref()),
				};

				match result {
					Ok(Some(pid)) => info!("Launched RenderDoc viewer (pid {})", pid),
					Ok(None) => {}
					Err(error) => error!("{}", error),
				}
			}
		})?;

		Ok(ViewerLauncher { sender, worker: Some(worker) })
	}

	pub fn handle(&self) -> LaunchHandle {
		LaunchHandle { sender: Some(self.sender.clone()) }
	}
}

impl Drop for ViewerLauncher {
	fn drop(&mut self) {
		// Handles may outlive the launcher, so the channel cannot be relied on to close.
		let _ = self.sender.send(LaunchMessage::Shutdown);

		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				error!("RenderDoc viewer launcher panicked");
			}
		}
	}
}

/// Schedules launches on a [`ViewerLauncher`].
#[derive(Clone, Default)]
pub struct LaunchHandle {
	sender: Option<Sender<LaunchMessage>>,
}

impl LaunchHandle {
	/// A handle that schedules nothing.
	pub fn disabled() -> LaunchHandle {
		LaunchHandle { sender: None }
	}

	/// Schedules a launch. Returns `false` if launching is disabled or the launcher is gone.
	pub fn schedule(&self, request: LaunchRequest) -> bool {
		let Some(sender) = &self.sender else { return false; };

		if sender.send(LaunchMessage::Launch(request)).is_err() {
			debug!("RenderDoc viewer launcher has shut down, not launching the viewer");
			return false;
		}

		true
	}
}
