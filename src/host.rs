//! # Host Engine
//!
//! What the plugin needs from the engine it is embedded in.

use std::path::PathBuf;

use ghi::{DeviceHandle, WindowHandle};

/// The engine hosting the plugin. Called from the main thread unless noted otherwise.
pub trait HostEngine: Send + Sync {
	/// Native handle of the graphics device. Called on the render thread.
	fn native_device(&self) -> DeviceHandle;

	/// Native handle of the window the active viewport draws to.
	fn active_window(&self) -> WindowHandle;

	/// Whether draw events (debug annotations) are emitted.
	fn draw_events_enabled(&self) -> bool;

	fn set_draw_events_enabled(&self, enabled: bool);

	/// Enqueues the rendering of the active viewport on the render thread and returns.
	fn redraw_active_viewport(&self);

	/// The project's `Saved` directory.
	fn project_saved_dir(&self) -> PathBuf;

	/// Whether the engine runs without a real renderer (servers, commandlets).
	fn uses_null_renderer(&self) -> bool { false }

	/// Shows a blocking message to the user.
	fn show_message(&self, message: &str) {
		log::warn!("{}", message);
	}

	/// Asks the shader compiler to keep debug information in compiled shaders.
	fn keep_shader_debug_info(&self, _keep: bool) {}
}
