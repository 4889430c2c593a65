use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use renderdoc_plugin::config::{ConfigFile, ConfigStore};
use renderdoc_plugin::launcher::{self, RemoteAccess};
use renderdoc_plugin::locator::Locator;
use renderdoc_plugin::paths;
use renderdoc_plugin::settings::{CaptureSettings, Setting};

#[derive(Parser)]
#[command(version, about = "Finds RenderDoc, lists and opens frame captures", long_about = None)]
struct Cli {
	/// The project directory. Example: ./MyGame
	#[arg(short, long, default_value = ".")]
	project: PathBuf,

	/// The engine directory, whose configuration is consulted when the project does not name a RenderDoc installation.
	#[arg(short, long)]
	engine: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Prints the RenderDoc installation directory, looking for one if none is configured
	Locate {
		/// Also load the RenderDoc library and print its API version
		#[arg(long)]
		check: bool,
	},
	/// Lists the project's captures, newest first
	List {
		/// Print the list as JSON
		#[arg(long)]
		json: bool,
	},
	/// Opens a capture in the RenderDoc viewer, the newest one by default
	Open {
		/// The capture to open
		capture: Option<PathBuf>,
		/// Connect the viewer to the application running on this machine
		#[arg(long)]
		remote_access: bool,
	},
	/// Shows or changes capture settings
	Settings {
		#[command(subcommand)]
		command: SettingsCommands,
	},
}

#[derive(Subcommand)]
enum SettingsCommands {
	/// Prints every setting
	Show {},
	/// Changes a setting
	Set {
		/// The setting's configuration key. Example: CaptureCallStacks
		key: String,
		#[arg(action = clap::ArgAction::Set)]
		value: bool,
	},
}

#[derive(Debug, serde::Serialize)]
struct CaptureEntry {
	path: PathBuf,
	/// Seconds since the unix epoch.
	modified: u64,
	size: u64,
}

/// Every `.rdc` file under `directory`, newest first.
fn list_captures(directory: &Path) -> Vec<CaptureEntry> {
	let mut captures = paths::files_under(directory).into_iter()
		.filter(|(path, _)| path.extension().is_some_and(|extension| extension == "rdc"))
		.map(|(path, metadata)| {
			let modified = metadata.modified().ok().and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok()).map_or(0, |elapsed| elapsed.as_secs());
			CaptureEntry { path, modified, size: metadata.len() }
		})
		.collect::<Vec<_>>();

	captures.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));

	captures
}

fn open_config(cli: &Cli) -> Result<(ConfigFile, Option<ConfigFile>), i32> {
	let project = ConfigFile::project(&cli.project).map_err(|error| {
		log::error!("Failed to read project configuration. Error: {}", error);
		1
	})?;

	let engine = match &cli.engine {
		Some(engine) => Some(ConfigFile::engine(engine).map_err(|error| {
			log::error!("Failed to read engine configuration. Error: {}", error);
			1
		})?),
		None => None,
	};

	Ok((project, engine))
}

fn locate(cli: &Cli) -> Result<PathBuf, i32> {
	let (mut project, engine) = open_config(cli)?;

	let located = Locator::new(&mut project, engine.as_ref().map(|engine| engine as &dyn ConfigStore)).locate();

	located.map_err(|error| {
		println!("Failed to locate RenderDoc. Error: {}", error);
		1
	})
}

fn main() -> Result<(), i32> {
	let _ = simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Warn).env().init();

	let cli = Cli::parse();

	let capture_directory = paths::capture_directory(&cli.project.join("Saved"));

	match &cli.command {
		Commands::Locate { check } => {
			let installation = locate(&cli)?;

			println!("{}", installation.display());

			if *check {
				match renderdoc_plugin::loader::load(&installation) {
					Ok(library) => {
						let (major, minor, patch) = ghi::RenderDebugger::api_version(&library);
						println!("RenderDoc API v{}.{}.{}", major, minor, patch);
					}
					Err(error) => {
						println!("Failed to load RenderDoc. Error: {}", error);
						return Err(1);
					}
				}
			}

			Ok(())
		}
		Commands::List { json } => {
			let captures = list_captures(&capture_directory);

			if *json {
				match serde_json::to_string_pretty(&captures) {
					Ok(json) => println!("{}", json),
					Err(error) => {
						println!("Failed to serialize captures. Error: {}", error);
						return Err(1);
					}
				}

				return Ok(());
			}

			if captures.is_empty() {
				println!("No captures found in {}.", capture_directory.display());
			}

			for capture in captures {
				println!("{}", capture.path.display());
			}

			Ok(())
		}
		Commands::Open { capture, remote_access } => {
			let installation = locate(&cli)?;

			let Some(viewer) = paths::find_viewer(&installation) else {
				println!("No RenderDoc viewer in {}.", installation.display());
				return Err(1);
			};

			let remote_access = remote_access.then(RemoteAccess::default);

			let result = match capture {
				Some(capture) => launcher::viewer_command(&viewer, remote_access.as_ref(), capture).spawn().map(|child| Some(child.id())).map_err(|error| launcher::LaunchError::SpawnFailed { viewer: viewer.clone(), error }),
				None => launcher::launch_external(&viewer, remote_access.as_ref(), &capture_directory),
			};

			match result {
				Ok(Some(pid)) => {
					println!("Launched RenderDoc (pid {}).", pid);
					Ok(())
				}
				Ok(None) => {
					println!("No captures found in {}.", capture_directory.display());
					Ok(())
				}
				Err(error) => {
					println!("Failed to open capture. Error: {}", error);
					Err(1)
				}
			}
		}
		Commands::Settings { command } => {
			let (mut project, _) = open_config(&cli)?;

			match command {
				SettingsCommands::Show {} => {
					let settings = CaptureSettings::load(&project);

					match project.binary_path() {
						Some(path) => println!("BinaryPath = {}", path.display()),
						None => println!("BinaryPath is not set"),
					}

					for setting in Setting::ALL {
						println!("{} = {}", setting.key(), settings.get(setting));
					}

					Ok(())
				}
				SettingsCommands::Set { key, value } => {
					let setting = key.parse::<Setting>().map_err(|error| {
						println!("{}", error);
						1
					})?;

					let mut settings = CaptureSettings::load(&project);
					settings.set(setting, *value);

					match settings.save(&mut project) {
						Ok(()) => {
							println!("{} = {}", setting.key(), value);
							Ok(())
						}
						Err(error) => {
							println!("Failed to save settings. Error: {}", error);
							Err(1)
						}
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, SystemTime};

	use super::*;

	fn capture(path: &Path, age: u64) {
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		let file = std::fs::File::create(path).unwrap();
		file.set_modified(SystemTime::now() - Duration::from_secs(age)).unwrap();
	}

	#[test]
	fn captures_are_listed_newest_first() {
		let directory = tempfile::tempdir().unwrap();

		capture(&directory.path().join("a_frame1.rdc"), 600);
		capture(&directory.path().join("b/b_frame2.rdc"), 10);
		capture(&directory.path().join("notes.txt"), 0);

		let captures = list_captures(directory.path());

		let paths = captures.iter().map(|capture| capture.path.clone()).collect::<Vec<_>>();
		assert_eq!(paths, [directory.path().join("b/b_frame2.rdc"), directory.path().join("a_frame1.rdc")]);
	}

	#[test]
	fn capture_list_serializes_to_json() {
		let captures = vec![CaptureEntry { path: PathBuf::from("/c/a_frame1.rdc"), modified: 42, size: 7 }];

		let json: serde_json::Value = serde_json::to_value(&captures).unwrap();

		assert_eq!(json[0]["path"], "/c/a_frame1.rdc");
		assert_eq!(json[0]["modified"], 42);
	}

	#[test]
	fn cli_parses_settings_set() {
		let cli = Cli::try_parse_from(["rdcap", "--project", "/game", "settings", "set", "CaptureAllActivity", "true"]).unwrap();

		assert_eq!(cli.project, PathBuf::from("/game"));
		assert!(matches!(cli.command, Commands::Settings { command: SettingsCommands::Set { ref key, value: true } } if key == "CaptureAllActivity"));
	}
}
