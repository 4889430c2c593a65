//! The G.H.I. module (graphics hardware interface) abstracts what a frame debugger needs from the graphics hardware.
//! It exposes the native device and window handles, the render debugger interface and the render command queue.

pub mod render_debugger;
pub mod render_thread;

pub use crate::render_debugger::*;
pub use crate::render_thread::*;

/// Opaque native graphics device pointer, as handed out by the graphics API (`ID3D11Device*`, `VkInstance` dispatch table, GL context...).
/// A null handle lets the render debugger pick the device on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(pub *const std::ffi::c_void);

/// Opaque native window handle (`HWND`, X11 `Window`...). A null handle matches any window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHandle(pub *const std::ffi::c_void);

// SAFETY: handles are never dereferenced on the Rust side, they are only forwarded to the render debugger which is thread safe.
unsafe impl Send for DeviceHandle {}
unsafe impl Sync for DeviceHandle {}
unsafe impl Send for WindowHandle {}
unsafe impl Sync for WindowHandle {}

impl DeviceHandle {
	pub fn null() -> Self { DeviceHandle(std::ptr::null()) }

	pub fn is_null(&self) -> bool { self.0.is_null() }
}

impl WindowHandle {
	pub fn null() -> Self { WindowHandle(std::ptr::null()) }

	pub fn is_null(&self) -> bool { self.0.is_null() }
}

impl Default for DeviceHandle {
	fn default() -> Self { Self::null() }
}

impl Default for WindowHandle {
	fn default() -> Self { Self::null() }
}
