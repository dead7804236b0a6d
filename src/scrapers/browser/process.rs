//! Cleanup of stale browser processes and profiles before a launch.

use std::path::Path;

use tracing::{debug, info, warn};

const BROWSER_NAMES: [&str; 3] = ["chrome", "chromium", "chromedriver"];

fn is_browser_process(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    BROWSER_NAMES.iter().any(|b| name.contains(b))
}

/// SIGKILL every process whose name looks like a Chrome/Chromium binary.
/// Returns the number of processes signalled.
#[cfg(target_os = "linux")]
pub fn kill_lingering_browsers() -> usize {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    let own_pid = std::process::id();
    let mut killed = 0;

    for entry in entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        if pid == own_pid {
            continue;
        }
        let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        if !is_browser_process(&comm) {
            continue;
        }
        let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
            continue;
        };
        // SAFETY: kill(2) with a pid read from /proc has no memory effects.
        let rc = unsafe { libc::kill(raw_pid, libc::SIGKILL) };
        if rc == 0 {
            debug!("Killed lingering {} ({})", comm.trim(), pid);
            killed += 1;
        }
    }
    if killed > 0 {
        info!("Killed {} lingering browser processes", killed);
    }
    killed
}

#[cfg(not(target_os = "linux"))]
pub fn kill_lingering_browsers() -> usize {
    0
}

/// Delete and recreate a browser profile directory.
pub async fn reset_profile(dir: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!("Could not remove profile {}: {}", dir.display(), e);
        }
    }
    tokio::fs::create_dir_all(dir).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_process_names() {
        assert!(is_browser_process("chrome\n"));
        assert!(is_browser_process("chromium-browse"));
        assert!(is_browser_process("chromedriver"));
        assert!(!is_browser_process("smq"));
    }

    #[tokio::test]
    async fn test_reset_profile_empties_directory() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile");
        tokio::fs::create_dir_all(profile.join("Default")).await.unwrap();
        tokio::fs::write(profile.join("Default/Cookies"), b"x").await.unwrap();

        reset_profile(&profile).await.unwrap();
        assert!(profile.is_dir());
        assert_eq!(std::fs::read_dir(&profile).unwrap().count(), 0);
    }
}
