use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "pilgrim_map_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

/// Pins every setting the binary reads so a developer `.env` cannot leak in.
pub fn apply_map_test_env(command: &mut Command, log_dir: &Path) {
    command.env("MAPS_API_KEY", "test-key");
    command.env("MAP_DEFAULT_DESTINATION", "Ujjain");
    command.env("MAP_POINT_COUNT", "25");
    command.env("MAP_POINT_SEED", "7");
    command.env("MAP_REFRESH_POLICY", "rebuild");
    command.env("MAP_CONTROL_SYNC", "detached");
    command.env_remove("MAP_POI_FILE");
    command.env("RUST_LOG", "error");
    command.env("PILGRIM_FILE_LOG", "error");
    command.env("PILGRIM_LOG_DIR", log_dir.as_os_str());
}
