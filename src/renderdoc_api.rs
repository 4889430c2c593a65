//! # RenderDoc API
//!
//! The C ABI exposed by the RenderDoc library. `RENDERDOC_GetAPI` fills a pointer to a table of function pointers,
//! [`RenderDocApi`] mirrors `RENDERDOC_API_1_0_0` field by field.
//! [`RenderDocLibrary`] owns the library handle together with that table and implements [`ghi::RenderDebugger`] on top of it.

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};

use ghi::{CaptureInfo, CaptureOption, DeviceHandle, InputButton, OverlayBits, RenderDebugger, WindowHandle};
use log::warn;

use crate::loader::DynamicLibrary;

/// Name of the factory exported by the RenderDoc library.
pub const GET_API_SYMBOL: &str = "RENDERDOC_GetAPI";

/// `eRENDERDOC_API_Version_1_0_0`. The table layout below is the one of this version.
pub const API_VERSION_1_0_0: u32 = 10000;

/// `int RENDERDOC_GetAPI(RENDERDOC_Version version, void **outAPIPointers)`. Returns 1 on success.
pub type GetApiFn = unsafe extern "C" fn(version: u32, out_api: *mut *mut c_void) -> c_int;

/// Function table returned by `RENDERDOC_GetAPI`, layout of `RENDERDOC_API_1_0_0`.
#[repr(C)]
pub struct RenderDocApi {
	pub get_api_version: unsafe extern "C" fn(major: *mut c_int, minor: *mut c_int, patch: *mut c_int),
	pub set_capture_option_u32: unsafe extern "C" fn(option: u32, value: u32) -> c_int,
	pub set_capture_option_f32: unsafe extern "C" fn(option: u32, value: f32) -> c_int,
	pub get_capture_option_u32: unsafe extern "C" fn(option: u32) -> u32,
	pub get_capture_option_f32: unsafe extern "C" fn(option: u32) -> f32,
	pub set_focus_toggle_keys: unsafe extern "C" fn(keys: *const u32, count: c_int),
	pub set_capture_keys: unsafe extern "C" fn(keys: *const u32, count: c_int),
	pub get_overlay_bits: unsafe extern "C" fn() -> u32,
	pub mask_overlay_bits: unsafe extern "C" fn(and: u32, or: u32),
	pub shutdown: unsafe extern "C" fn(),
	pub unload_crash_handler: unsafe extern "C" fn(),
	pub set_log_file_path_template: unsafe extern "C" fn(template: *const c_char),
	pub get_log_file_path_template: unsafe extern "C" fn() -> *const c_char,
	pub get_num_captures: unsafe extern "C" fn() -> u32,
	pub get_capture: unsafe extern "C" fn(index: u32, path: *mut c_char, path_length: *mut u32, timestamp: *mut u64) -> u32,
	pub trigger_capture: unsafe extern "C" fn(),
	pub is_remote_access_connected: unsafe extern "C" fn() -> u32,
	pub launch_replay_ui: unsafe extern "C" fn(connect: u32, command_line: *const c_char) -> u32,
	pub set_active_window: unsafe extern "C" fn(device: *const c_void, window: *const c_void),
	pub start_frame_capture: unsafe extern "C" fn(device: *const c_void, window: *const c_void),
	pub is_frame_capturing: unsafe extern "C" fn() -> u32,
	pub end_frame_capture: unsafe extern "C" fn(device: *const c_void, window: *const c_void) -> u32,
}

/// A loaded RenderDoc library and its API table.
/// The table is written once by the factory and only read afterwards. Dropping this value releases the library handle.
pub struct RenderDocLibrary {
	api: std::ptr::NonNull<RenderDocApi>,
	path: PathBuf,
	_library: Box<dyn DynamicLibrary>,
}

// SAFETY: the table is immutable after load and the RenderDoc entry points may be called from any thread.
unsafe impl Send for RenderDocLibrary {}
unsafe impl Sync for RenderDocLibrary {}

impl RenderDocLibrary {
	/// # Safety
	/// `api` must point to a table filled by `RENDERDOC_GetAPI` of `library`, valid for as long as `library` is loaded.
	pub(crate) unsafe fn new(library: Box<dyn DynamicLibrary>, api: std::ptr::NonNull<RenderDocApi>, path: PathBuf) -> RenderDocLibrary {
		RenderDocLibrary { api, path, _library: library }
	}

	/// Path of the library file this table was loaded from.
	pub fn path(&self) -> &Path { &self.path }

	fn api(&self) -> &RenderDocApi {
		// SAFETY: the table outlives the library handle we own.
		unsafe { self.api.as_ref() }
	}

	/// Number of captures made so far by this process.
	pub fn capture_count(&self) -> u32 {
		unsafe { (self.api().get_num_captures)() }
	}

	/// Whether a frame capture is in progress.
	pub fn is_frame_capturing(&self) -> bool {
		unsafe { (self.api().is_frame_capturing)() != 0 }
	}
}

impl RenderDebugger for RenderDocLibrary {
	fn api_version(&self) -> (u32, u32, u32) {
		let (mut major, mut minor, mut patch) = (0, 0, 0);

		unsafe { (self.api().get_api_version)(&mut major, &mut minor, &mut patch) };

		(major.max(0) as u32, minor.max(0) as u32, patch.max(0) as u32)
	}

	fn set_capture_file_path_template(&self, template: &Path) {
		let Ok(template) = CString::new(template.to_string_lossy().as_bytes()) else {
			warn!("Capture path template {} contains a nul byte", template.display());
			return;
		};

		unsafe { (self.api().set_log_file_path_template)(template.as_ptr()) };
	}

	fn set_capture_option(&self, option: CaptureOption, value: u32) -> bool {
		unsafe { (self.api().set_capture_option_u32)(option as u32, value) != 0 }
	}

	fn set_focus_toggle_keys(&self, keys: &[InputButton]) {
		let keys = keys.iter().map(|key| *key as u32).collect::<Vec<u32>>();

		unsafe { (self.api().set_focus_toggle_keys)(if keys.is_empty() { std::ptr::null() } else { keys.as_ptr() }, keys.len() as c_int) };
	}

	fn set_capture_keys(&self, keys: &[InputButton]) {
		let keys = keys.iter().map(|key| *key as u32).collect::<Vec<u32>>();

		unsafe { (self.api().set_capture_keys)(if keys.is_empty() { std::ptr::null() } else { keys.as_ptr() }, keys.len() as c_int) };
	}

	fn mask_overlay_bits(&self, and: OverlayBits, or: OverlayBits) {
		unsafe { (self.api().mask_overlay_bits)(and.bits(), or.bits()) };
	}

	fn trigger_capture(&self) {
		unsafe { (self.api().trigger_capture)() };
	}

	fn start_frame_capture(&self, device: DeviceHandle, window: WindowHandle) {
		unsafe { (self.api().start_frame_capture)(device.0, window.0) };
	}

	fn end_frame_capture(&self, device: DeviceHandle, window: WindowHandle) -> bool {
		unsafe { (self.api().end_frame_capture)(device.0, window.0) != 0 }
	}

	fn capture(&self, index: u32) -> Option<CaptureInfo> {
		let get_capture = self.api().get_capture;
		let mut length = 0u32;

		// First call only reports the path length, terminator included.
		if unsafe { get_capture(index, std::ptr::null_mut(), &mut length, std::ptr::null_mut()) } == 0 {
			return None;
		}

		let mut path = vec![0u8; (length as usize).max(1)];
		let mut timestamp = 0u64;

		if unsafe { get_capture(index, path.as_mut_ptr().cast(), &mut length, &mut timestamp) } == 0 {
			return None;
		}

		let path = CStr::from_bytes_until_nul(&path).ok()?.to_string_lossy().into_owned();

		Some(CaptureInfo { path: PathBuf::from(path), timestamp })
	}

	fn is_remote_access_connected(&self) -> bool {
		unsafe { (self.api().is_remote_access_connected)() != 0 }
	}

	fn launch_replay_ui(&self, connect: bool, command_line: Option<&str>) -> u32 {
		let command_line = match command_line.map(CString::new).transpose() {
			Ok(command_line) => command_line,
			Err(_) => {
				warn!("Replay UI command line contains a nul byte");
				return 0;
			}
		};

		let command_line = command_line.as_ref().map_or(std::ptr::null(), |command_line| command_line.as_ptr());

		unsafe { (self.api().launch_replay_ui)(connect as u32, command_line) }
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	struct Static;

	impl DynamicLibrary for Static {
		fn symbol(&self, _: &str) -> Option<*const c_void> { None }
	}

	fn library() -> RenderDocLibrary {
		let api = std::ptr::NonNull::from(&fake::API);

		unsafe { RenderDocLibrary::new(Box::new(Static), api, PathBuf::from("renderdoc")) }
	}

	#[test]
	fn reads_api_version() {
		assert_eq!(library().api_version(), (1, 6, 0));
	}

	#[test]
	fn reads_captures_in_order() {
		let library = library();

		let captures = ghi::captures(&library);

		assert_eq!(captures.len(), 2);
		assert_eq!(captures[0].path, PathBuf::from(fake::CAPTURES[0]));
		assert_eq!(captures[1].path, PathBuf::from(fake::CAPTURES[1]));
		assert_eq!(captures[1].timestamp, 1_704_067_201);
		assert_eq!(library.capture_count(), 2);
	}

	#[test]
	fn capture_past_the_end_is_none() {
		assert!(library().capture(2).is_none());
	}

	#[test]
	fn launch_replay_ui_forwards_command_line() {
		let library = library();

		assert_eq!(library.launch_replay_ui(true, Some("\"/captures/a.rdc\"")), fake::REPLAY_UI_PID);
		assert_eq!(library.launch_replay_ui(true, None), 0);
		assert_eq!(library.launch_replay_ui(true, Some("bad\0line")), 0);
	}

	#[test]
	fn accepted_option_reports_true() {
		let library = library();

		assert!(library.set_capture_option(CaptureOption::CaptureCallstacks, 1));
		assert!(!library.is_frame_capturing());
	}
}
