use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use ghi::{CaptureInfo, CaptureOption, DeviceHandle, InputButton, OverlayBits, RenderCommandQueue, RenderDebugger, RenderThread, WindowHandle};
use parking_lot::Mutex;
use renderdoc_plugin::config::{ConfigFile, ConfigStore};
use renderdoc_plugin::host::HostEngine;
use renderdoc_plugin::locator::{InstallationSource, Locator};
use renderdoc_plugin::settings::CaptureSettings;
use renderdoc_plugin::{PluginOptions, RenderDocPlugin, ViewerMode};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
	Template(PathBuf),
	FocusKeys(usize),
	CaptureKeys(usize),
	Overlay(u32, u32),
	Start(Option<String>),
	End(Option<String>),
	Draw(u32),
	Launch(String),
}

/// Records calls and the thread they were made on.
struct Recorder {
	calls: Mutex<Vec<Call>>,
	captures: Mutex<Vec<CaptureInfo>>,
	launched: Mutex<Option<Sender<String>>>,
}

impl Recorder {
	fn new() -> (Arc<Recorder>, Receiver<String>) {
		let (sender, receiver) = channel();
		let recorder = Recorder { calls: Mutex::new(Vec::new()), captures: Mutex::new(Vec::new()), launched: Mutex::new(Some(sender)) };

		(Arc::new(recorder), receiver)
	}

	fn push(&self, call: Call) { self.calls.lock().push(call); }

	fn calls(&self) -> Vec<Call> { self.calls.lock().clone() }
}

fn thread_name() -> Option<String> {
	std::thread::current().name().map(str::to_string)
}

impl RenderDebugger for Recorder {
	fn api_version(&self) -> (u32, u32, u32) { (1, 6, 0) }
	fn set_capture_file_path_template(&self, template: &Path) { self.push(Call::Template(template.to_path_buf())); }
	fn set_capture_option(&self, _: CaptureOption, _: u32) -> bool { true }
	fn set_focus_toggle_keys(&self, keys: &[InputButton]) { self.push(Call::FocusKeys(keys.len())); }
	fn set_capture_keys(&self, keys: &[InputButton]) { self.push(Call::CaptureKeys(keys.len())); }
	fn mask_overlay_bits(&self, and: OverlayBits, or: OverlayBits) { self.push(Call::Overlay(and.bits(), or.bits())); }
	fn trigger_capture(&self) {}

	fn start_frame_capture(&self, _: DeviceHandle, _: WindowHandle) {
		self.push(Call::Start(thread_name()));
	}

	fn end_frame_capture(&self, _: DeviceHandle, _: WindowHandle) -> bool {
		self.push(Call::End(thread_name()));

		let mut captures = self.captures.lock();
		let index = captures.len();
		captures.push(CaptureInfo { path: PathBuf::from(format!("/captures/flow_frame{}.rdc", index)), timestamp: index as u64 });

		true
	}

	fn capture(&self, index: u32) -> Option<CaptureInfo> { self.captures.lock().get(index as usize).cloned() }

	fn is_remote_access_connected(&self) -> bool { false }

	fn launch_replay_ui(&self, _: bool, command_line: Option<&str>) -> u32 {
		let command_line = command_line.unwrap_or_default().to_string();
		self.push(Call::Launch(command_line.clone()));

		if let Some(sender) = self.launched.lock().as_ref() {
			let _ = sender.send(command_line);
		}

		1234
	}
}

struct Host {
	recorder: Arc<Recorder>,
	render_thread: Arc<RenderThread>,
	saved: PathBuf,
	draw_events: Mutex<bool>,
	frame: Mutex<u32>,
}

impl HostEngine for Host {
	fn native_device(&self) -> DeviceHandle { DeviceHandle::null() }
	fn active_window(&self) -> WindowHandle { WindowHandle::null() }
	fn draw_events_enabled(&self) -> bool { *self.draw_events.lock() }
	fn set_draw_events_enabled(&self, enabled: bool) { *self.draw_events.lock() = enabled; }

	fn redraw_active_viewport(&self) {
		let frame = {
			let mut frame = self.frame.lock();
			*frame += 1;
			*frame
		};

		let recorder = self.recorder.clone();
		self.render_thread.enqueue("Draw", Box::new(move || recorder.push(Call::Draw(frame))));
	}

	fn project_saved_dir(&self) -> PathBuf { self.saved.clone() }
}

struct RenderThreadQueue(Arc<RenderThread>);

impl RenderCommandQueue for RenderThreadQueue {
	fn enqueue(&self, name: &'static str, command: ghi::RenderCommand) {
		self.0.enqueue(name, command);
	}
}

fn setup(project: &Path) -> (Arc<Recorder>, Receiver<String>, Arc<Host>, Arc<RenderThread>) {
	let (recorder, launched) = Recorder::new();
	let render_thread = Arc::new(RenderThread::spawn("RenderThread").unwrap());

	let host = Arc::new(Host {
		recorder: recorder.clone(),
		render_thread: render_thread.clone(),
		saved: project.join("Saved"),
		draw_events: Mutex::new(false),
		frame: Mutex::new(0),
	});

	(recorder, launched, host, render_thread)
}

#[test]
fn viewport_capture_brackets_the_redraw_and_opens_the_viewer() {
	let project = tempfile::tempdir().unwrap();
	let (recorder, launched, host, render_thread) = setup(project.path());

	let options = PluginOptions { attach_to_injected: false, launch_viewer: true, viewer_mode: ViewerMode::ReplayApi, launch_delay: None };
	let mut plugin = RenderDocPlugin::with_debugger(host.clone(), Arc::new(RenderThreadQueue(render_thread.clone())), recorder.clone(), None, CaptureSettings::default(), options).unwrap();

	host.redraw_active_viewport();
	assert!(plugin.capture_frame(1));
	host.redraw_active_viewport();

	let command_line = launched.recv_timeout(Duration::from_secs(10)).unwrap();
	assert_eq!(command_line, "\"/captures/flow_frame0.rdc\"");

	render_thread.flush();

	let render_thread_name = Some("RenderThread".to_string());
	let frames = recorder.calls().into_iter().filter(|call| matches!(call, Call::Start(_) | Call::End(_) | Call::Draw(_))).collect::<Vec<_>>();

	assert_eq!(frames, [
		Call::Draw(1),
		Call::Start(render_thread_name.clone()),
		Call::Draw(2),
		Call::End(render_thread_name),
		Call::Draw(3),
	]);

	assert!(!*host.draw_events.lock());
	assert!(project.path().join("Saved/RenderDocCaptures").is_dir());

	plugin.shutdown();
}

#[test]
fn back_to_back_viewport_captures_restore_draw_events() {
	let project = tempfile::tempdir().unwrap();
	let (recorder, _launched, host, render_thread) = setup(project.path());

	let options = PluginOptions { attach_to_injected: false, launch_viewer: false, ..PluginOptions::default() };
	let mut plugin = RenderDocPlugin::with_debugger(host.clone(), Arc::new(RenderThreadQueue(render_thread.clone())), recorder.clone(), None, CaptureSettings::default(), options).unwrap();

	// Keeps the render thread busy while both captures are requested.
	let (release, parked) = channel::<()>();
	render_thread.enqueue("Busy", Box::new(move || { let _ = parked.recv(); }));

	assert!(plugin.capture_frame(1));
	assert!(plugin.capture_frame(2));

	release.send(()).unwrap();
	render_thread.flush();

	assert!(!*host.draw_events.lock());

	let frames = recorder.calls().into_iter().filter(|call| matches!(call, Call::Start(_) | Call::End(_) | Call::Draw(_))).count();
	assert_eq!(frames, 6);

	plugin.shutdown();
}

#[test]
fn startup_takes_over_hot_keys_and_overlay() {
	let project = tempfile::tempdir().unwrap();
	let (recorder, _launched, host, render_thread) = setup(project.path());

	let options = PluginOptions { attach_to_injected: false, launch_viewer: false, ..PluginOptions::default() };
	let plugin = RenderDocPlugin::with_debugger(host, Arc::new(RenderThreadQueue(render_thread)), recorder.clone(), None, CaptureSettings::default(), options).unwrap();

	let calls = recorder.calls();

	let Some(Call::Template(template)) = calls.first() else { panic!("capture path template was not set first: {:?}", calls) };
	assert!(template.starts_with(project.path().join("Saved/RenderDocCaptures")));
	assert!(calls.contains(&Call::FocusKeys(0)));
	assert!(calls.contains(&Call::CaptureKeys(0)));
	assert!(calls.contains(&Call::Overlay(0, 0)));

	plugin.shutdown();
}

#[test]
fn whole_tick_capture_spans_every_draw_of_the_tick() {
	let project = tempfile::tempdir().unwrap();
	let (recorder, _launched, host, render_thread) = setup(project.path());

	let settings = CaptureSettings { capture_all_activity: true, ..CaptureSettings::default() };
	let options = PluginOptions { attach_to_injected: false, launch_viewer: false, ..PluginOptions::default() };
	let mut plugin = RenderDocPlugin::with_debugger(host.clone(), Arc::new(RenderThreadQueue(render_thread.clone())), recorder.clone(), None, settings, options).unwrap();

	for tick in 1..=4 {
		plugin.tick(tick);

		if tick == 1 {
			assert!(plugin.capture_frame(tick));
		}

		// Two viewports per tick.
		host.redraw_active_viewport();
		host.redraw_active_viewport();
	}

	render_thread.flush();

	let frames = recorder.calls().into_iter().filter_map(|call| match call {
		Call::Start(_) => Some("start".to_string()),
		Call::End(_) => Some("end".to_string()),
		Call::Draw(frame) => Some(frame.to_string()),
		_ => None,
	}).collect::<Vec<_>>();

	assert_eq!(frames, ["1", "2", "start", "3", "4", "end", "5", "6", "7", "8"]);

	plugin.shutdown();
}

struct Picked(PathBuf);

impl InstallationSource for Picked {
	fn name(&self) -> &str { "picked" }

	fn find(&mut self) -> Option<PathBuf> { Some(self.0.clone()) }
}

#[test]
fn discovered_installation_is_remembered_by_the_project() {
	let project = tempfile::tempdir().unwrap();
	let installation = tempfile::tempdir().unwrap();
	std::fs::write(installation.path().join(renderdoc_plugin::loader::LIBRARY_FILE_NAME), b"").unwrap();

	{
		let mut config = ConfigFile::project(project.path()).unwrap();
		let located = Locator::with_sources(&mut config, None, vec![Box::new(Picked(installation.path().join("qrenderdoc")))]).locate();

		assert_eq!(located.unwrap(), installation.path());
	}

	let config = ConfigFile::project(project.path()).unwrap();
	assert_eq!(config.binary_path(), Some(installation.path()));

	let located = {
		let mut config = config;
		Locator::with_sources(&mut config, None, Vec::new()).locate()
	};

	assert_eq!(located.unwrap(), installation.path());
}
