// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use sled::{Db, Tree};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::info;

// Only one handle per db file may be open within a process
static SLED_CACHE: Lazy<Arc<Mutex<HashMap<String, Db>>>> =
    Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));

// Canonicalizes the parent directory if the target path does not yet exist.
fn canonical_key(path: &Path) -> String {
    if path.exists() {
        return path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned();
    }
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let base: PathBuf = parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf());
    let tail = path.file_name().map(|s| s.to_owned()).unwrap_or_default();
    base.join(tail).to_string_lossy().into_owned()
}

fn get_or_open_db(path: &Path) -> Result<Db> {
    let _ = std::fs::create_dir_all(path);
    let key = canonical_key(path);
    let mut cache = SLED_CACHE
        .lock()
        .map_err(|_| anyhow!("sled cache lock poisoned"))?;
    if let Some(db) = cache.get(&key) {
        return Ok(db.clone());
    }
    let db = sled::open(path).with_context(|| {
        format!(
            "Could not open database at path '{}'",
            path.to_string_lossy()
        )
    })?;
    cache.insert(key, db.clone());
    if db.was_recovered() {
        info!(path=?path, "recovered db");
    } else {
        info!(path=?path, "created db");
    }

    Ok(db)
}

pub(crate) fn get_or_open_db_tree(path: &Path, tree: &str) -> Result<Tree> {
    let db = get_or_open_db(path)?;
    Ok(db.open_tree(tree)?)
}

pub(crate) fn clear_all_caches() {
    if let Ok(mut cache) = SLED_CACHE.lock() {
        cache.clear();
    }
}
