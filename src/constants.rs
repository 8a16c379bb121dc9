//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// File locations for settings, storage and the daemon socket
pub mod paths {
    /// Directory name under the platform config/data/runtime dirs
    pub const APP_DIR: &str = "preset-handler";

    /// Serialized preset collection
    pub const PRESETS_FILE: &str = "presets.json";

    /// User settings
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Daemon socket file name
    pub const SOCKET_FILE: &str = "daemon.sock";

    /// Suffix for the scratch file written before the atomic rename
    pub const TEMP_SUFFIX: &str = "tmp";
}

/// Persistence timing
pub mod persist {
    /// Quiet period after the last mutation before the collection is written
    pub const DEBOUNCE_MS: u64 = 1000;
}

/// IPC framing
pub mod ipc {
    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Socket permissions (owner only)
    pub const SOCKET_MODE: u32 = 0o700;
}

/// Application lookup
pub mod apps {
    /// Suggestions returned by "find as you type" search
    pub const SUGGESTION_LIMIT: usize = 5;

    /// Bundle extension probed on macOS
    pub const MACOS_BUNDLE_EXT: &str = "app";

    /// Desktop entry extension probed on other Unix systems
    pub const DESKTOP_ENTRY_EXT: &str = "desktop";

    /// Application names treated as web browsers
    pub const KNOWN_BROWSERS: &[&str] = &[
        "Safari",
        "Google Chrome",
        "Firefox",
        "Microsoft Edge",
        "Brave Browser",
        "Arc",
        "Opera",
        "Chromium",
        "Vivaldi",
    ];
}

/// Well-known installation directories, probed in order
pub mod install_dirs {
    /// macOS application folders (user folder is added at runtime)
    pub const MACOS: &[&str] = &[
        "/Applications",
        "/System/Applications",
        "/System/Applications/Utilities",
        "/Applications/Utilities",
    ];

    /// XDG desktop entry folders (user folder is added at runtime)
    pub const XDG: &[&str] = &[
        "/usr/share/applications",
        "/usr/local/share/applications",
        "/var/lib/flatpak/exports/share/applications",
        "/var/lib/snapd/desktop/applications",
    ];
}

/// External commands used by the desktop platform
pub mod commands {
    /// macOS launcher (`open -a <path>` / `open -b <bundle id>`)
    pub const MACOS_OPEN: &str = "open";

    /// macOS scripting host, used for window placement
    pub const OSASCRIPT: &str = "osascript";

    /// GLib launcher for desktop entries (`gio launch <file.desktop>`)
    pub const GIO: &str = "gio";

    /// Identifier-based launch on Linux goes through flatpak app ids
    pub const FLATPAK: &str = "flatpak";

    /// EWMH window mover
    pub const WMCTRL: &str = "wmctrl";

    /// Process listing on non-procfs systems
    pub const PS: &str = "ps";
}
