use std::{fs, path::Path, path::PathBuf};

pub const SETTINGS_FILE: &str = "controller.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen_port: u16,
    pub send_port: u16,
    pub show_path: PathBuf,
    pub startup_delay_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_port: 12346,
            send_port: 12345,
            show_path: PathBuf::from("player.json"),
            startup_delay_ms: 3000,
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_with(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// File values override defaults, environment overrides both. Values that
/// fail to parse leave the previous value in place.
pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<toml::Table>(&raw) {
            let get = |key: &str| file_cfg.get(key).and_then(scalar_to_string);
            apply(&mut settings.listen_port, get("listen_port"));
            apply(&mut settings.send_port, get("send_port"));
            apply(&mut settings.startup_delay_ms, get("startup_delay_ms"));
            if let Some(v) = get("show_path") {
                settings.show_path = PathBuf::from(v);
            }
            if let Some(v) = get("log_filter") {
                settings.log_filter = v;
            }
        }
    }

    apply(&mut settings.listen_port, env("APP__LISTEN_PORT"));
    apply(&mut settings.send_port, env("APP__SEND_PORT"));
    apply(&mut settings.startup_delay_ms, env("APP__STARTUP_DELAY_MS"));

    if let Some(v) = env("SHOW_PATH") {
        settings.show_path = PathBuf::from(v);
    }
    if let Some(v) = env("APP__SHOW_PATH") {
        settings.show_path = PathBuf::from(v);
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }

    settings
}

fn apply<T: std::str::FromStr>(slot: &mut T, raw: Option<String>) {
    if let Some(parsed) = raw.and_then(|v| v.trim().parse::<T>().ok()) {
        *slot = parsed;
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
