use std::{collections::HashMap, fs};

pub const SETTINGS_FILE: &str = "live_results.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    /// Derived from `api_url` when unset.
    pub ws_url: Option<String>,
    pub quiz_name: Option<String>,
    pub private_key: Option<String>,
    pub nickname: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000/api/v1".into(),
            ws_url: None,
            quiz_name: None,
            private_key: None,
            nickname: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("ws_url") {
        settings.ws_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("quiz_name") {
        settings.quiz_name = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("private_key") {
        settings.private_key = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("nickname") {
        settings.nickname = Some(v.clone());
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("LIVE_RESULTS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("LIVE_RESULTS_WS_URL") {
        settings.ws_url = Some(v);
    }
    if let Some(v) = var("APP__WS_URL") {
        settings.ws_url = Some(v);
    }

    if let Some(v) = var("APP__QUIZ_NAME") {
        settings.quiz_name = Some(v);
    }
    if let Some(v) = var("APP__PRIVATE_KEY") {
        settings.private_key = Some(v);
    }
}
