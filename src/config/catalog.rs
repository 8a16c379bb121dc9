//! Bundled seed presets, used when no preset file exists yet

use crate::types::{AppEntry, Preset};

fn apps(names: &[&str]) -> Vec<AppEntry> {
    names.iter().map(|n| AppEntry::new(*n)).collect()
}

pub fn default_catalog() -> Vec<Preset> {
    vec![
        Preset::new(
            "Work",
            "Productivity and development workspace",
            apps(&["Safari", "Xcode", "Terminal", "Slack", "Notes"]),
            true,
        )
        .with_icon("briefcase"),
        Preset::new(
            "School",
            "Educational and learning workspace",
            apps(&["Safari", "Pages", "Keynote", "Numbers", "Mail"]),
            true,
        )
        .with_icon("graduationcap"),
        Preset::new(
            "Gaming",
            "Gaming and entertainment workspace",
            apps(&["Steam", "Discord", "Spotify", "Safari"]),
            false,
        )
        .with_icon("gamecontroller"),
        Preset::new(
            "Relax",
            "Relaxation and social media workspace",
            apps(&["Safari", "Messages", "Photos", "Music", "TV"]),
            false,
        )
        .with_icon("leaf"),
    ]
}
