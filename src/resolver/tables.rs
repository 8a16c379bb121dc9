//! Fixed lookup tables for the resolver
//!
//! Order matters in [`ALIASES`]: the first key that matches wins.

/// Shorthand (lowercase) → canonical application name
pub const ALIASES: &[(&str, &str)] = &[
    ("chrome", "Google Chrome"),
    ("vscode", "Visual Studio Code"),
    ("vs code", "Visual Studio Code"),
    ("teams", "Microsoft Teams"),
    ("word", "Microsoft Word"),
    ("excel", "Microsoft Excel"),
    ("powerpoint", "Microsoft PowerPoint"),
    ("outlook", "Microsoft Outlook"),
    ("edge", "Microsoft Edge"),
    ("brave", "Brave Browser"),
    ("iterm", "iTerm"),
    ("zoom", "zoom.us"),
];

/// Canonical name → macOS bundle identifier (`open -b`)
pub const MACOS_BUNDLE_IDS: &[(&str, &str)] = &[
    ("Google Chrome", "com.google.Chrome"),
    ("Safari", "com.apple.Safari"),
    ("Firefox", "org.mozilla.firefox"),
    ("Microsoft Edge", "com.microsoft.edgemac"),
    ("Brave Browser", "com.brave.Browser"),
    ("Microsoft Teams", "com.microsoft.teams2"),
    ("Microsoft Word", "com.microsoft.Word"),
    ("Microsoft Excel", "com.microsoft.Excel"),
    ("Microsoft PowerPoint", "com.microsoft.Powerpoint"),
    ("Microsoft Outlook", "com.microsoft.Outlook"),
    ("Visual Studio Code", "com.microsoft.VSCode"),
    ("Slack", "com.tinyspeck.slackmacgap"),
    ("Discord", "com.hnc.Discord"),
    ("Spotify", "com.spotify.client"),
    ("Steam", "com.valvesoftware.steam"),
    ("zoom.us", "us.zoom.xos"),
    ("iTerm", "com.googlecode.iterm2"),
    ("Terminal", "com.apple.Terminal"),
    ("Xcode", "com.apple.dt.Xcode"),
    ("Notes", "com.apple.Notes"),
    ("Mail", "com.apple.mail"),
    ("Messages", "com.apple.MobileSMS"),
    ("Photos", "com.apple.Photos"),
    ("Music", "com.apple.Music"),
    ("TV", "com.apple.TV"),
    ("Pages", "com.apple.iWork.Pages"),
    ("Keynote", "com.apple.iWork.Keynote"),
    ("Numbers", "com.apple.iWork.Numbers"),
];

/// Canonical name → flatpak application id (`flatpak run`)
pub const FLATPAK_IDS: &[(&str, &str)] = &[
    ("Google Chrome", "com.google.Chrome"),
    ("Firefox", "org.mozilla.firefox"),
    ("Microsoft Edge", "com.microsoft.Edge"),
    ("Brave Browser", "com.brave.Browser"),
    ("Visual Studio Code", "com.visualstudio.code"),
    ("Slack", "com.slack.Slack"),
    ("Discord", "com.discordapp.Discord"),
    ("Spotify", "com.spotify.Client"),
    ("Steam", "com.valvesoftware.Steam"),
    ("zoom.us", "us.zoom.Zoom"),
];
