//! Capture directory layout and viewer executable names.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Name of the capture directory inside the project's `Saved` directory.
pub const CAPTURE_DIRECTORY_NAME: &str = "RenderDocCaptures";

/// Viewer executables, preferred first. `renderdocui` is the viewer of RenderDoc releases before 1.0.
#[cfg(target_os = "windows")]
pub const VIEWER_EXECUTABLES: [&str; 2] = ["qrenderdoc.exe", "renderdocui.exe"];
#[cfg(not(target_os = "windows"))]
pub const VIEWER_EXECUTABLES: [&str; 2] = ["qrenderdoc", "renderdocui"];

pub fn capture_directory(saved_dir: &Path) -> PathBuf {
	saved_dir.join(CAPTURE_DIRECTORY_NAME)
}

/// Path prefix of the captures made from now on. RenderDoc appends `_frameN.rdc`.
pub fn capture_path_template(capture_directory: &Path, now: NaiveDateTime) -> PathBuf {
	capture_directory.join(format_timestamp(now))
}

/// Formats `time` as `YYYY.MM.DD-HH.MM.SS`.
pub fn format_timestamp(time: NaiveDateTime) -> String {
	time.format("%Y.%m.%d-%H.%M.%S").to_string()
}

/// Local wall clock time, the time capture files are named after.
pub fn now() -> NaiveDateTime {
	chrono::Local::now().naive_local()
}

/// Finds the viewer executable of the installation at `install_dir`.
pub fn find_viewer(install_dir: &Path) -> Option<PathBuf> {
	VIEWER_EXECUTABLES.iter().map(|name| install_dir.join(name)).find(|path| path.is_file())
}

/// Every file under `directory`, searched recursively, with its metadata. Unreadable entries are skipped.
pub fn files_under(directory: &Path) -> Vec<(PathBuf, std::fs::Metadata)> {
	fn visit(directory: &Path, files: &mut Vec<(PathBuf, std::fs::Metadata)>) {
		let Ok(entries) = std::fs::read_dir(directory) else { return; };

		for entry in entries.flatten() {
			let path = entry.path();
			let Ok(metadata) = entry.metadata() else { continue; };

			if metadata.is_dir() {
				visit(&path, files);
			} else {
				files.push((path, metadata));
			}
		}
	}

	let mut files = Vec::new();
	visit(directory, &mut files);

	files
}
