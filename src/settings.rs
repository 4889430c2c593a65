//! # Capture Settings
//!
//! User facing settings and the capture options derived from them.

use ghi::{CaptureOption, RenderDebugger};
use log::{error, trace};

use crate::config::{ConfigError, ConfigStore};

/// Persisted user settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSettings {
	pub capture_call_stacks: bool,
	pub ref_all_resources: bool,
	pub save_all_initials: bool,
	pub do_not_strip_shader_debug_data: bool,
	/// Capture a whole engine tick instead of a single viewport redraw.
	pub capture_all_activity: bool,
}

/// A boolean setting, named by its configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
	CaptureCallStacks,
	RefAllResources,
	SaveAllInitials,
	DoNotStripShaderDebugData,
	CaptureAllActivity,
}

impl Setting {
	pub const ALL: [Setting; 5] = [Setting::CaptureCallStacks, Setting::RefAllResources, Setting::SaveAllInitials, Setting::DoNotStripShaderDebugData, Setting::CaptureAllActivity];

	pub fn key(self) -> &'static str {
		match self {
			Setting::CaptureCallStacks => "CaptureCallStacks",
			Setting::RefAllResources => "RefAllResources",
			Setting::SaveAllInitials => "SaveAllInitials",
			Setting::DoNotStripShaderDebugData => "DoNotStripShaderDebugData",
			Setting::CaptureAllActivity => "CaptureAllActivity",
		}
	}
}

impl std::str::FromStr for Setting {
	type Err = String;

	fn from_str(key: &str) -> Result<Self, Self::Err> {
		Setting::ALL.into_iter().find(|setting| setting.key().eq_ignore_ascii_case(key)).ok_or_else(|| format!("unknown setting '{}'", key))
	}
}

impl CaptureSettings {
	pub fn load(store: &dyn ConfigStore) -> CaptureSettings {
		let section = store.section();

		CaptureSettings {
			capture_call_stacks: section.capture_call_stacks,
			ref_all_resources: section.ref_all_resources,
			save_all_initials: section.save_all_initials,
			do_not_strip_shader_debug_data: section.do_not_strip_shader_debug_data,
			capture_all_activity: section.capture_all_activity,
		}
	}

	/// Writes the settings to `store` and flushes it.
	pub fn save(&self, store: &mut dyn ConfigStore) -> Result<(), ConfigError> {
		let section = store.section_mut();

		section.capture_call_stacks = self.capture_call_stacks;
		section.ref_all_resources = self.ref_all_resources;
		section.save_all_initials = self.save_all_initials;
		section.do_not_strip_shader_debug_data = self.do_not_strip_shader_debug_data;
		section.capture_all_activity = self.capture_all_activity;

		store.flush()
	}

	pub fn get(&self, setting: Setting) -> bool {
		match setting {
			Setting::CaptureCallStacks => self.capture_call_stacks,
			Setting::RefAllResources => self.ref_all_resources,
			Setting::SaveAllInitials => self.save_all_initials,
			Setting::DoNotStripShaderDebugData => self.do_not_strip_shader_debug_data,
			Setting::CaptureAllActivity => self.capture_all_activity,
		}
	}

	pub fn set(&mut self, setting: Setting, value: bool) {
		let field = match setting {
			Setting::CaptureCallStacks => &mut self.capture_call_stacks,
			Setting::RefAllResources => &mut self.ref_all_resources,
			Setting::SaveAllInitials => &mut self.save_all_initials,
			Setting::DoNotStripShaderDebugData => &mut self.do_not_strip_shader_debug_data,
			Setting::CaptureAllActivity => &mut self.capture_all_activity,
		};

		*field = value;
	}

	/// Flips a setting and returns its new value.
	pub fn toggle(&mut self, setting: Setting) -> bool {
		let value = !self.get(setting);
		self.set(setting, value);
		value
	}

	pub fn capture_options(&self) -> CaptureOptions {
		CaptureOptions {
			capture_callstacks: self.capture_call_stacks,
			ref_all_resources: self.ref_all_resources,
			save_all_initials: self.save_all_initials,
			..CaptureOptions::default()
		}
	}
}

/// Every capture option the library understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
	pub allow_vsync: bool,
	pub allow_fullscreen: bool,
	pub api_validation: bool,
	pub capture_callstacks: bool,
	pub capture_callstacks_only_draws: bool,
	/// Seconds.
	pub delay_for_debugger: u32,
	pub verify_buffer_access: bool,
	pub hook_into_children: bool,
	pub ref_all_resources: bool,
	pub save_all_initials: bool,
	pub capture_all_cmd_lists: bool,
	pub debug_output_mute: bool,
}

impl Default for CaptureOptions {
	fn default() -> Self {
		CaptureOptions {
			allow_vsync: true,
			allow_fullscreen: true,
			api_validation: false,
			capture_callstacks: false,
			capture_callstacks_only_draws: false,
			delay_for_debugger: 0,
			verify_buffer_access: false,
			hook_into_children: false,
			ref_all_resources: false,
			save_all_initials: false,
			capture_all_cmd_lists: false,
			debug_output_mute: true,
		}
	}
}

/// The library rejected an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionApplyFailed {
	pub option: CaptureOption,
	pub value: u32,
}

impl std::fmt::Display for OptionApplyFailed {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "RenderDoc rejected capture option {:?} = {}", self.option, self.value)
	}
}

impl CaptureOptions {
	pub fn values(&self) -> [(CaptureOption, u32); 12] {
		[
			(CaptureOption::AllowVSync, self.allow_vsync as u32),
			(CaptureOption::AllowFullscreen, self.allow_fullscreen as u32),
			(CaptureOption::ApiValidation, self.api_validation as u32),
			(CaptureOption::CaptureCallstacks, self.capture_callstacks as u32),
			(CaptureOption::CaptureCallstacksOnlyDraws, self.capture_callstacks_only_draws as u32),
			(CaptureOption::DelayForDebugger, self.delay_for_debugger),
			(CaptureOption::VerifyBufferAccess, self.verify_buffer_access as u32),
			(CaptureOption::HookIntoChildren, self.hook_into_children as u32),
			(CaptureOption::RefAllResources, self.ref_all_resources as u32),
			(CaptureOption::SaveAllInitials, self.save_all_initials as u32),
			(CaptureOption::CaptureAllCmdLists, self.capture_all_cmd_lists as u32),
			(CaptureOption::DebugOutputMute, self.debug_output_mute as u32),
		]
	}

	/// Pushes every option into the debugger, stopping at the first one it rejects.
	pub fn apply(&self, debugger: &dyn RenderDebugger) -> Result<(), OptionApplyFailed> {
		for (option, value) in self.values() {
			trace!("Setting RenderDoc capture option {:?} = {}", option, value);

			if !debugger.set_capture_option(option, value) {
				return Err(OptionApplyFailed { option, value });
			}
		}

		Ok(())
	}

	/// Applies the options. A rejection means the library and this plugin disagree on the option table.
	pub(crate) fn apply_or_report(&self, debugger: &dyn RenderDebugger) {
		if let Err(failure) = self.apply(debugger) {
			error!("{}", failure);
			debug_assert!(false, "{}", failure);
		}
	}
}
