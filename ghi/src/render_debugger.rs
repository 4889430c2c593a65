//! # Render Debugger
//!
//! The render debugger module provides facilities to connect to a render debugger and capture frames for analysis and debugging.
//! [`RenderDebugger`] is the seam the capture session talks to. It is implemented by a library loaded from disk
//! and by [`InjectedRenderDoc`], which attaches to a RenderDoc library that already lives in the process.

use std::path::{Path, PathBuf};

use log::{debug, trace, warn};
use renderdoc::{RenderDoc, V141};

/// Capture options understood by the render debugger. Values match `RENDERDOC_CaptureOption`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureOption {
	/// Allow the application to enable vsync.
	AllowVSync = 0,
	/// Allow the application to go fullscreen.
	AllowFullscreen = 1,
	/// Create the graphics device with the API's validation layer (debug device mode).
	ApiValidation = 2,
	/// Record a CPU callstack for every API event.
	CaptureCallstacks = 3,
	/// Only record callstacks for draw and dispatch events.
	CaptureCallstacksOnlyDraws = 4,
	/// Seconds to wait for a debugger to attach after launching.
	DelayForDebugger = 5,
	/// Verify buffer writes for out of bounds accesses.
	VerifyBufferAccess = 6,
	/// Hook child processes launched by the application.
	HookIntoChildren = 7,
	/// Include every live resource in the capture, referenced or not.
	RefAllResources = 8,
	/// Save the initial state of every resource at capture start.
	SaveAllInitials = 9,
	/// Capture all command lists recorded from the start of the application.
	CaptureAllCmdLists = 10,
	/// Mute API debug output while validation is on.
	DebugOutputMute = 11,
}

/// Keys the render debugger can bind for its own hot keys. Values match `RENDERDOC_InputButton`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputButton {
	F11 = 0x10A,
	F12 = 0x10B,
	PrintScreen = 0x10C,
}

bitflags::bitflags! {
	/// In-application overlay elements. Values match `RENDERDOC_OverlayBits`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct OverlayBits: u32 {
		const ENABLED = 0x1;
		const FRAME_RATE = 0x2;
		const FRAME_NUMBER = 0x4;
		const CAPTURE_LIST = 0x8;
		const DEFAULT = Self::ENABLED.bits() | Self::FRAME_RATE.bits() | Self::FRAME_NUMBER.bits() | Self::CAPTURE_LIST.bits();
	}
}

/// A capture the render debugger has written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInfo {
	/// Absolute path of the capture file.
	pub path: PathBuf,
	/// Seconds since the unix epoch at which the capture was made.
	pub timestamp: u64,
}

/// The render debugger allows the application to connect to a render debugger and capture frames for analysis and debugging.
/// It provides an abstraction over the API context of different render debugging tools.
///
/// Implementations must be callable from the main thread (options, queries) and from the render thread (frame capture brackets).
pub trait RenderDebugger: Send + Sync {
	/// Returns the `(major, minor, patch)` version of the debugger API.
	fn api_version(&self) -> (u32, u32, u32);

	/// Whether the debugger was injected by its own UI. Output paths and hot keys then belong to that UI.
	fn is_injected(&self) -> bool { false }

	/// Sets the path template captures are written to. `template` is a path prefix, the debugger appends `_frameN.rdc`.
	fn set_capture_file_path_template(&self, template: &Path);

	/// Sets a capture option. Returns `false` if the debugger rejected the option or the value.
	fn set_capture_option(&self, option: CaptureOption, value: u32) -> bool;

	/// Sets the keys that toggle which window is captured. An empty slice disables them.
	fn set_focus_toggle_keys(&self, keys: &[InputButton]);

	/// Sets the keys that trigger a capture. An empty slice disables them.
	fn set_capture_keys(&self, keys: &[InputButton]);

	/// Masks the overlay: `bits = (bits & and) | or`.
	fn mask_overlay_bits(&self, and: OverlayBits, or: OverlayBits);

	/// Captures the next frame presented.
	fn trigger_capture(&self);

	/// Starts a frame capture on the given device and window. Must be called on the render thread.
	fn start_frame_capture(&self, device: super::DeviceHandle, window: super::WindowHandle);

	/// Ends the frame capture started on the given device and window. Must be called on the render thread.
	fn end_frame_capture(&self, device: super::DeviceHandle, window: super::WindowHandle) -> bool;

	/// Returns the capture with the given index, `None` once `index` is past the last capture.
	fn capture(&self, index: u32) -> Option<CaptureInfo>;

	/// Whether a replay UI is already connected to this process.
	fn is_remote_access_connected(&self) -> bool;

	/// Launches the replay UI. Returns the process id of the UI, or zero on failure.
	fn launch_replay_ui(&self, connect: bool, command_line: Option<&str>) -> u32;
}

/// Returns every capture the debugger knows about, oldest first.
pub fn captures(debugger: &dyn RenderDebugger) -> Vec<CaptureInfo> {
	let mut captures = Vec::new();

	while let Some(capture) = debugger.capture(captures.len() as u32) {
		captures.push(capture);
	}

	captures
}

/// A RenderDoc library already loaded into the process, usually because the application was launched from the RenderDoc UI.
pub struct InjectedRenderDoc {
	renderdoc: parking_lot::Mutex<RenderDoc<V141>>,
}

// SAFETY: the RenderDoc API context is process global and internally synchronized, every call goes through the mutex.
unsafe impl Send for InjectedRenderDoc {}
unsafe impl Sync for InjectedRenderDoc {}

impl InjectedRenderDoc {
	/// Attaches to an injected RenderDoc library. Returns `None` if RenderDoc is not loaded in this process.
	pub fn attach() -> Option<InjectedRenderDoc> {
		match RenderDoc::<V141>::new() {
			Ok(renderdoc) => Some(InjectedRenderDoc { renderdoc: parking_lot::Mutex::new(renderdoc) }),
			Err(error) => {
				debug!("RenderDoc is not injected into this process: {:?}", error);
				None
			}
		}
	}
}

impl RenderDebugger for InjectedRenderDoc {
	fn api_version(&self) -> (u32, u32, u32) {
		self.renderdoc.lock().get_api_version()
	}

	fn is_injected(&self) -> bool { true }

	fn set_capture_file_path_template(&self, template: &Path) {
		trace!("Keeping the RenderDoc UI capture path, ignoring {}", template.display());
	}

	fn set_capture_option(&self, option: CaptureOption, value: u32) -> bool {
		let option = match option {
			CaptureOption::AllowVSync => renderdoc::CaptureOption::AllowVSync,
			CaptureOption::AllowFullscreen => renderdoc::CaptureOption::AllowFullscreen,
			CaptureOption::ApiValidation => renderdoc::CaptureOption::ApiValidation,
			CaptureOption::CaptureCallstacks => renderdoc::CaptureOption::CaptureCallstacks,
			CaptureOption::HookIntoChildren => renderdoc::CaptureOption::HookIntoChildren,
			CaptureOption::RefAllResources => renderdoc::CaptureOption::RefAllResources,
			CaptureOption::SaveAllInitials => renderdoc::CaptureOption::SaveAllInitials,
			CaptureOption::CaptureAllCmdLists => renderdoc::CaptureOption::CaptureAllCmdLists,
			option => {
				trace!("Leaving {:?} to the RenderDoc UI", option);
				return true;
			}
		};

		self.renderdoc.lock().set_capture_option_u32(option, value);

		true
	}

	fn set_focus_toggle_keys(&self, _: &[InputButton]) {}

	fn set_capture_keys(&self, _: &[InputButton]) {}

	fn mask_overlay_bits(&self, _: OverlayBits, _: OverlayBits) {}

	fn trigger_capture(&self) {
		self.renderdoc.lock().trigger_capture();
	}

	fn start_frame_capture(&self, device: super::DeviceHandle, window: super::WindowHandle) {
		self.renderdoc.lock().start_frame_capture(device.0, window.0);
	}

	fn end_frame_capture(&self, device: super::DeviceHandle, window: super::WindowHandle) -> bool {
		self.renderdoc.lock().end_frame_capture(device.0, window.0);

		true
	}

	fn capture(&self, index: u32) -> Option<CaptureInfo> {
		let (path, time) = self.renderdoc.lock().get_capture(index)?;
		let timestamp = time.duration_since(std::time::UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or(0);

		Some(CaptureInfo { path, timestamp })
	}

	fn is_remote_access_connected(&self) -> bool {
		self.renderdoc.lock().is_target_control_connected()
	}

	fn launch_replay_ui(&self, connect: bool, command_line: Option<&str>) -> u32 {
		match self.renderdoc.lock().launch_replay_ui(connect, command_line) {
			Ok(pid) => pid,
			Err(error) => {
				warn!("RenderDoc could not launch its replay UI: {:?}", error);
				0
			}
		}
	}
}
