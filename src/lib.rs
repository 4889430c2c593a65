//! # RenderDoc Plugin
//! Frame capture for engines and editors through RenderDoc. The plugin finds and loads the RenderDoc library at runtime,
//! brackets rendered frames with captures and opens the newest capture in the RenderDoc viewer.
//!
//! The host engine is reached through [`host::HostEngine`] and [`ghi::RenderCommandQueue`], the plugin itself is [`plugin::RenderDocPlugin`].

pub mod config;
pub mod host;
pub mod launcher;
pub mod loader;
pub mod locator;
pub mod paths;
pub mod plugin;
pub mod renderdoc_api;
pub mod session;
pub mod settings;
pub mod tick;

pub use plugin::{take_greeting, PluginOptions, RenderDocPlugin, StartupError, ViewerMode};
