//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/daymind/data
//!   macOS:   ~/Library/Application Support/daymind/data
//!   Linux:   $XDG_CONFIG_HOME/daymind/data (default ~/.config)

use std::path::PathBuf;

/// Get the DayMind data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_config_base().join("daymind").join("data")
}

/// Directory for rolling log files inside a data directory.
pub fn get_log_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("logs")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% (typically C:\Users\<user>\AppData\Roaming)
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_ends_with_app_folder() {
        let dir = get_data_dir();
        assert!(dir.ends_with(PathBuf::from("daymind").join("data")));
    }

    #[test]
    fn test_log_dir_is_inside_data_dir() {
        let data = PathBuf::from("/tmp/daymind-data");
        assert_eq!(get_log_dir(&data), data.join("logs"));
    }
}
