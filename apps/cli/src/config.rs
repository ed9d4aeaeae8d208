use std::{collections::HashMap, fs, time::Duration};

use client_core::DEFAULT_PAGE_SIZE;
use tracing::warn;

pub const SETTINGS_FILE: &str = "tasks.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub user_id: Option<String>,
    pub session_cookie: Option<String>,
    pub request_timeout_secs: u64,
    pub page_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api".into(),
            user_id: None,
            session_cookie: None,
            request_timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Defaults, then `tasks.toml` in the working directory, then the environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut ClientSettings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(file = SETTINGS_FILE, error = %err, "ignoring unreadable settings file");
            return;
        }
    };
    let text = |key: &str| file_cfg.get(key).and_then(value_text);

    if let Some(v) = text("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = text("user_id") {
        settings.user_id = Some(v);
    }
    if let Some(v) = text("session_cookie") {
        settings.session_cookie = Some(v);
    }
    if let Some(v) = text("request_timeout_secs").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = text("page_size").and_then(|v| parse_page_size(&v)) {
        settings.page_size = v;
    }
}

fn apply_env(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("TASKS_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("TASKS_USER_ID") {
        settings.user_id = Some(v);
    }
    if let Some(v) = var("APP__USER_ID") {
        settings.user_id = Some(v);
    }

    if let Some(v) = var("TASKS_SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }
    if let Some(v) = var("APP__SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = var("APP__PAGE_SIZE") {
        if let Some(parsed) = parse_page_size(&v) {
            settings.page_size = parsed;
        }
    }
}

fn value_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn parse_page_size(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|size| *size > 0)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
