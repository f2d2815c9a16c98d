// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use std::path::{Path, PathBuf};

use path_clean::clean;

pub const DEFAULT_CONFIG_NAME: &str = "cmarket.config.yaml";

pub type FindInParent = fn(&Path, &str) -> Option<PathBuf>;

/// Walk up from `path` looking for `filename`
pub fn find_in_parent(path: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = path.to_path_buf();

    loop {
        let file_path = current.join(filename);
        if file_path.exists() {
            return Some(file_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// An explicit cli path wins, then the nearest file above cwd, then the OS config dir
pub fn resolve_config_path(
    find_in_parent: FindInParent,
    cwd: &Path,
    default_config_dir: &Path,
    default_filename: &str,
    cli_file: Option<&Path>,
) -> PathBuf {
    if let Some(cli_file) = cli_file {
        if cli_file.is_absolute() {
            return cli_file.to_path_buf();
        }
        return clean(cwd.join(cli_file));
    }

    if let Some(found) = find_in_parent(cwd, default_filename) {
        return found;
    }

    clean(default_config_dir.join(default_filename))
}
