use std::env;
use std::path::PathBuf;

/// Resolves an XDG base directory: the variable's value when set and
/// non-empty, otherwise `$HOME` joined with `home_relative`, otherwise `/tmp`.
fn xdg_base(xdg: Option<String>, home: Option<String>, home_relative: &str) -> PathBuf {
    match (xdg.filter(|dir| !dir.is_empty()), home) {
        (Some(dir), _) => PathBuf::from(dir),
        (None, Some(home)) => PathBuf::from(home).join(home_relative),
        (None, None) => PathBuf::from("/tmp"),
    }
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    xdg_base(env::var(var).ok(), env::var("HOME").ok(), home_relative)
}

/// `$XDG_CONFIG_HOME/pipette`, where `config.toml` is looked up.
pub fn pipette_config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("pipette")
}

/// `$XDG_DATA_HOME/pipette/logs`.
pub fn pipette_log_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
        .join("pipette")
        .join("logs")
}
