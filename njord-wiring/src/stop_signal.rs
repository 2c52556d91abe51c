//! File-sentinel stop request, mirroring the kill-switch's dual-sentinel
//! idiom (`njord_killswitch`) so `njord stop <service>` can signal a
//! separately-running `njord start <service>` process without requiring
//! any cross-process RPC.

use std::path::{Path, PathBuf};

pub fn sentinel_path(run_dir: &Path, service: &str) -> PathBuf {
    run_dir.join(format!("{service}.stop"))
}

pub fn request_stop(run_dir: &Path, service: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(run_dir)?;
    std::fs::write(sentinel_path(run_dir, service), b"")
}

pub fn stop_requested(run_dir: &Path, service: &str) -> bool {
    sentinel_path(run_dir, service).exists()
}

pub fn clear(run_dir: &Path, service: &str) -> std::io::Result<()> {
    let path = sentinel_path(run_dir, service);
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn request_then_detect_then_clear() {
        let dir = tempdir().unwrap();
        assert!(!stop_requested(dir.path(), "risk"));
        request_stop(dir.path(), "risk").unwrap();
        assert!(stop_requested(dir.path(), "risk"));
        clear(dir.path(), "risk").unwrap();
        assert!(!stop_requested(dir.path(), "risk"));
    }

    #[test]
    fn distinct_services_have_distinct_sentinels() {
        let dir = tempdir().unwrap();
        request_stop(dir.path(), "risk").unwrap();
        assert!(!stop_requested(dir.path(), "broker"));
    }
}
