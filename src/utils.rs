use std::{
    env, fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;

const DATA_DIR_ENV: &str = "CONCERT_SYNC_DATA_DIR";
const APP_DIR: &str = "concert-sync";

static DATA_ROOT: Lazy<PathBuf> =
    Lazy::new(|| resolve_data_root(env::var_os(DATA_DIR_ENV).map(PathBuf::from), dirs::data_dir()));

/// An explicit directory is used as is; the platform one gets an app folder.
fn resolve_data_root(explicit: Option<PathBuf>, platform: Option<PathBuf>) -> PathBuf {
    match explicit.filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => platform.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR),
    }
}

pub fn database_path() -> PathBuf {
    DATA_ROOT.join("concert-sync.sqlite")
}

pub fn config_path() -> PathBuf {
    DATA_ROOT.join("config.json")
}

pub fn ensure_parent(path: &Path) {
    let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
        return;
    };
    if let Err(err) = fs::create_dir_all(parent) {
        log::warn!("could not create {}: {err}", parent.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins_over_platform_dir() {
        let root = resolve_data_root(Some(PathBuf::from("/srv/concerts")), Some(PathBuf::from("/home/a/.local/share")));
        assert_eq!(root, PathBuf::from("/srv/concerts"));
    }

    #[test]
    fn platform_dir_gets_app_folder() {
        let root = resolve_data_root(Some(PathBuf::new()), Some(PathBuf::from("/home/a/.local/share")));
        assert_eq!(root, PathBuf::from("/home/a/.local/share/concert-sync"));
        assert_eq!(resolve_data_root(None, None), PathBuf::from("./concert-sync"));
    }

    #[test]
    fn ensure_parent_creates_nested_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a/b/concert-sync.sqlite");
        ensure_parent(&file);
        assert!(file.parent().expect("parent").is_dir());
        ensure_parent(Path::new("bare.json"));
    }
}
