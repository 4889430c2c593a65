//! # Capture Session
//!
//! Brackets render thread work with a frame capture.
//! The begin and end brackets are render commands, so they land between the draws enqueued before and after them.
//! The draw events flag is saved, forced on and restored by those same commands, in render thread order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ghi::{RenderCommandQueue, RenderDebugger, WindowHandle};
use log::{debug, trace, warn};

use crate::host::HostEngine;
use crate::launcher::{LaunchHandle, LaunchRequest};
use crate::settings::CaptureOptions;

struct ActiveCapture {
	window: WindowHandle,
	/// Written by the start command, read by the end command.
	draw_events_were_enabled: Arc<AtomicBool>,
}

pub struct CaptureSession {
	debugger: Arc<dyn RenderDebugger>,
	host: Arc<dyn HostEngine>,
	queue: Arc<dyn RenderCommandQueue>,
	launch: LaunchHandle,
	capture_directory: PathBuf,
	options: CaptureOptions,
	active: Option<ActiveCapture>,
}

impl CaptureSession {
	pub fn new(debugger: Arc<dyn RenderDebugger>, host: Arc<dyn HostEngine>, queue: Arc<dyn RenderCommandQueue>, launch: LaunchHandle, capture_directory: PathBuf, options: CaptureOptions) -> CaptureSession {
		CaptureSession { debugger, host, queue, launch, capture_directory, options, active: None }
	}

	pub fn debugger(&self) -> &Arc<dyn RenderDebugger> { &self.debugger }

	pub fn capture_directory(&self) -> &std::path::Path { &self.capture_directory }

	pub fn set_options(&mut self, options: CaptureOptions) {
		self.options = options;
	}

	pub fn is_capturing(&self) -> bool { self.active.is_some() }

	/// Starts a capture on the render thread. Draw events are forced on until the matching [`CaptureSession::end_capture`].
	/// Returns `false` if a capture is already open.
	pub fn begin_capture(&mut self) -> bool {
		if self.active.is_some() {
			warn!("A RenderDoc capture is already in progress");
			return false;
		}

		self.options.apply_or_report(self.debugger.as_ref());

		let window = self.host.active_window();
		let draw_events_were_enabled = Arc::new(AtomicBool::new(false));

		let debugger = self.debugger.clone();
		let host = self.host.clone();
		let saved = draw_events_were_enabled.clone();

		self.queue.enqueue("StartRenderDocCapture", Box::new(move || {
			saved.store(host.draw_events_enabled(), Ordering::Release);
			host.set_draw_events_enabled(true);

			let device = host.native_device();
			trace!("Starting RenderDoc frame capture");
			debugger.start_frame_capture(device, window);
		}));

		self.active = Some(ActiveCapture { window, draw_events_were_enabled });

		true
	}

	/// Ends the capture on the render thread, restores draw events and schedules the viewer launch.
	/// Returns `false` if no capture is open.
	pub fn end_capture(&mut self) -> bool {
		let Some(ActiveCapture { window, draw_events_were_enabled }) = self.active.take() else {
			warn!("No RenderDoc capture in progress");
			return false;
		};

		let debugger = self.debugger.clone();
		let host = self.host.clone();
		let launch = self.launch.clone();
		let request = LaunchRequest { capture_directory: self.capture_directory.clone() };

		self.queue.enqueue("EndRenderDocCapture", Box::new(move || {
			let device = host.native_device();
			let captured = debugger.end_frame_capture(device, window);

			host.set_draw_events_enabled(draw_events_were_enabled.load(Ordering::Acquire));

			if !captured {
				warn!("RenderDoc failed to end the frame capture, not opening the viewer");
				return;
			}

			if !launch.schedule(request) {
				debug!("RenderDoc viewer launch not scheduled");
			}
		}));

		true
	}
}

impl Drop for CaptureSession {
	fn drop(&mut self) {
		if self.active.is_some() {
			debug!("Closing RenderDoc capture left open");
			self.end_capture();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::path::Path;
	use std::time::Duration;

	use ghi::{CaptureInfo, CaptureOption, DeviceHandle, ImmediateQueue, InputButton, OverlayBits, RenderCommand};
	use parking_lot::Mutex;

	use super::*;
	use crate::launcher::{LaunchStrategy, ViewerLauncher};

	#[derive(Debug, Clone, PartialEq, Eq)]
	enum Event {
		Option(CaptureOption),
		Start,
		End,
		DrawEvents(bool),
		Launch(String),
	}

	#[derive(Default)]
	struct Journal(Mutex<Vec<Event>>);

	impl Journal {
		fn events(&self) -> Vec<Event> { self.0.lock().clone() }
		fn push(&self, event: Event) { self.0.lock().push(event) }
	}

	struct Debugger {
		journal: Arc<Journal>,
		/// What `end_frame_capture` reports.
		ends: bool,
		rejects: Option<CaptureOption>,
		captures: Vec<PathBuf>,
	}

	impl Debugger {
		fn new(journal: &Arc<Journal>) -> Debugger {
			Debugger { journal: journal.clone(), ends: true, rejects: None, captures: Vec::new() }
		}
	}

	impl RenderDebugger for Debugger {
		fn api_version(&self) -> (u32, u32, u32) { (1, 0, 0) }
		fn set_capture_file_path_template(&self, _: &Path) {}
		fn set_capture_option(&self, option: CaptureOption, _: u32) -> bool {
			self.journal.push(Event::Option(option));
			Some(option) != self.rejects
		}
		fn set_focus_toggle_keys(&self, _: &[InputButton]) {}
		fn set_capture_keys(&self, _: &[InputButton]) {}
		fn mask_overlay_bits(&self, _: OverlayBits, _: OverlayBits) {}
		fn trigger_capture(&self) {}
		fn start_frame_capture(&self, _: DeviceHandle, _: WindowHandle) { self.journal.push(Event::Start) }
		fn end_frame_capture(&self, _: DeviceHandle, _: WindowHandle) -> bool { self.journal.push(Event::End); self.ends }
		fn capture(&self, index: u32) -> Option<CaptureInfo> {
			self.captures.get(index as usize).map(|path| CaptureInfo { path: path.clone(), timestamp: index as u64 })
		}
		fn is_remote_access_connected(&self) -> bool { false }
		fn launch_replay_ui(&self, _: bool, command_line: Option<&str>) -> u32 {
			self.journal.push(Event::Launch(command_line.unwrap_or_default().to_string()));
			1
		}
	}

	struct Host {
		journal: Arc<Journal>,
		draw_events: Mutex<bool>,
	}

	impl HostEngine for Host {
		fn native_device(&self) -> DeviceHandle { DeviceHandle::null() }
		fn active_window(&self) -> WindowHandle { WindowHandle::null() }
		fn draw_events_enabled(&self) -> bool { *self.draw_events.lock() }
		fn set_draw_events_enabled(&self, enabled: bool) {
			*self.draw_events.lock() = enabled;
			self.journal.push(Event::DrawEvents(enabled));
		}
		fn redraw_active_viewport(&self) {}
		fn project_saved_dir(&self) -> PathBuf { PathBuf::from("/project/Saved") }
	}

	/// Holds commands until `run` is called, like a render thread that is still busy.
	#[derive(Default)]
	struct HeldQueue(Mutex<Vec<RenderCommand>>);

	impl HeldQueue {
		fn run(&self) {
			let commands = std::mem::take(&mut *self.0.lock());
			for command in commands {
				command();
			}
		}
	}

	impl RenderCommandQueue for HeldQueue {
		fn enqueue(&self, _: &'static str, command: RenderCommand) { self.0.lock().push(command); }
	}

	fn host(journal: &Arc<Journal>, draw_events: bool) -> Arc<Host> {
		Arc::new(Host { journal: journal.clone(), draw_events: Mutex::new(draw_events) })
	}

	fn capture_directory() -> PathBuf { PathBuf::from("/project/Saved/RenderDocCaptures") }

	fn session(draw_events: bool) -> (CaptureSession, Arc<Journal>) {
		let journal = Arc::new(Journal::default());

		let session = CaptureSession::new(Arc::new(Debugger::new(&journal)), host(&journal, draw_events), Arc::new(ImmediateQueue), LaunchHandle::disabled(), capture_directory(), CaptureOptions::default());

		(session, journal)
	}

	#[test]
	fn draw_events_are_forced_on_and_restored() {
		let (mut session, journal) = session(false);

		assert!(session.begin_capture());
		assert!(session.is_capturing());
		assert!(session.end_capture());

		let events = journal.events().into_iter().filter(|event| !matches!(event, Event::Option(_))).collect::<Vec<_>>();
		assert_eq!(events, [Event::DrawEvents(true), Event::Start, Event::End, Event::DrawEvents(false)]);
	}

	#[test]
	fn back_to_back_captures_restore_draw_events_in_render_order() {
		let journal = Arc::new(Journal::default());
		let host = host(&journal, false);
		let queue = Arc::new(HeldQueue::default());

		let mut session = CaptureSession::new(Arc::new(Debugger::new(&journal)), host.clone(), queue.clone(), LaunchHandle::disabled(), capture_directory(), CaptureOptions::default());

		assert!(session.begin_capture());
		assert!(session.end_capture());
		assert!(session.begin_capture());
		assert!(session.end_capture());

		queue.run();

		let events = journal.events().into_iter().filter(|event| !matches!(event, Event::Option(_))).collect::<Vec<_>>();
		assert_eq!(events, [
			Event::DrawEvents(true), Event::Start, Event::End, Event::DrawEvents(false),
			Event::DrawEvents(true), Event::Start, Event::End, Event::DrawEvents(false),
		]);
		assert!(!host.draw_events_enabled());
	}

	#[test]
	fn failed_capture_does_not_open_the_viewer() {
		let journal = Arc::new(Journal::default());
		let debugger = Arc::new(Debugger { ends: false, captures: vec![PathBuf::from("/c/previous_frame1.rdc")], ..Debugger::new(&journal) });

		let launcher = ViewerLauncher::spawn(LaunchStrategy::ReplayApi, debugger.clone(), Duration::ZERO).unwrap();
		let mut session = CaptureSession::new(debugger, host(&journal, true), Arc::new(ImmediateQueue), launcher.handle(), capture_directory(), CaptureOptions::default());

		assert!(session.begin_capture());
		assert!(session.end_capture());

		// Joins the worker after the launches already scheduled.
		drop(launcher);

		let events = journal.events();
		assert!(events.contains(&Event::End));
		assert!(!events.iter().any(|event| matches!(event, Event::Launch(_))));
		assert_eq!(events.last(), Some(&Event::DrawEvents(true)));
	}

	#[test]
	fn ended_capture_opens_the_viewer() {
		let journal = Arc::new(Journal::default());
		let debugger = Arc::new(Debugger { captures: vec![PathBuf::from("/c/new_frame1.rdc")], ..Debugger::new(&journal) });

		let launcher = ViewerLauncher::spawn(LaunchStrategy::ReplayApi, debugger.clone(), Duration::ZERO).unwrap();
		let mut session = CaptureSession::new(debugger, host(&journal, true), Arc::new(ImmediateQueue), launcher.handle(), capture_directory(), CaptureOptions::default());

		assert!(session.begin_capture());
		assert!(session.end_capture());

		drop(launcher);

		assert!(journal.events().contains(&Event::Launch("\"/c/new_frame1.rdc\"".to_string())));
	}

	#[test]
	#[cfg(debug_assertions)]
	#[should_panic]
	fn rejected_capture_option_fails_fast() {
		let journal = Arc::new(Journal::default());
		let debugger = Debugger { rejects: Some(CaptureOption::CaptureCallstacks), ..Debugger::new(&journal) };

		let mut session = CaptureSession::new(Arc::new(debugger), host(&journal, false), Arc::new(ImmediateQueue), LaunchHandle::disabled(), capture_directory(), CaptureOptions::default());

		session.begin_capture();
	}

	#[test]
	fn options_are_pushed_before_each_capture() {
		let (mut session, journal) = session(true);

		session.begin_capture();

		let events = journal.events();
		let start = events.iter().position(|event| *event == Event::Start).unwrap();
		assert_eq!(events[..start].iter().filter(|event| matches!(event, Event::Option(_))).count(), 12);
	}

	#[test]
	fn brackets_do_not_nest() {
		let (mut session, journal) = session(true);

		assert!(!session.end_capture());
		assert!(session.begin_capture());
		assert!(!session.begin_capture());
		assert!(session.end_capture());
		assert!(!session.end_capture());

		let starts = journal.events().iter().filter(|event| **event == Event::Start).count();
		assert_eq!(starts, 1);
	}

	#[test]
	fn dropping_an_open_session_ends_the_capture() {
		let (mut session, journal) = session(true);

		session.begin_capture();
		drop(session);

		assert_eq!(journal.events().last(), Some(&Event::DrawEvents(true)));
		assert!(journal.events().contains(&Event::End));
	}
}
