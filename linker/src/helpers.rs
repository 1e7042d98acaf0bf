use std::path::{Path, PathBuf};

use common::constants::EXECUTABLE_EXT;

/// Name of the linked executable: the explicit name if given, otherwise the
/// first input's name up to its first '.', either way ending in ".exe".
pub fn output_path(first_input: &Path, explicit: Option<&str>) -> PathBuf {
    let path = match explicit {
        Some(name) => PathBuf::from(name),
        None => {
            let stem = first_input
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            let stem = stem.split('.').next().unwrap_or_default();
            first_input.with_file_name(stem)
        }
    };

    if path.extension().is_some_and(|e| e == EXECUTABLE_EXT) {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(".");
    name.push(EXECUTABLE_EXT);
    PathBuf::from(name)
}
