use std::{env, path::PathBuf};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";
pub const DEFAULT_STORE_PATH: &str = "data/winter-arc-storage.json";
pub const DEFAULT_AUTH_URL: &str = "https://auth.emergentagent.com/";

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub store_path: PathBuf,
    pub auth_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            auth_url: DEFAULT_AUTH_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let backend_url = env::var("WINTER_ARC_BACKEND_URL")
            .or_else(|_| env::var("EXPO_PUBLIC_BACKEND_URL"))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let store_path = env::var("WINTER_ARC_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_PATH));

        let auth_url =
            env::var("WINTER_ARC_AUTH_URL").unwrap_or_else(|_| DEFAULT_AUTH_URL.to_string());

        Self {
            backend_url,
            store_path,
            auth_url,
        }
    }

    pub fn api_base(&self) -> String {
        api_base(&self.backend_url)
    }
}

pub fn api_base(backend_url: &str) -> String {
    format!("{}/api", backend_url.trim_end_matches('/'))
}
