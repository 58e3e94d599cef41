use std::{env, path::PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/tracker.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    /// Email that receives the admin role when it signs up.
    pub bootstrap_admin: Option<String>,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let port = match env::var("PORT") {
            Ok(value) => value.parse::<u16>().unwrap_or_else(|_| {
                warn!(value = %value, "invalid PORT, using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        let data_path = env::var("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_PATH));

        let bootstrap_admin = env::var("APP_BOOTSTRAP_ADMIN")
            .ok()
            .map(|email| normalize_email(&email))
            .filter(|email| !email.is_empty());

        let secure_cookies = env::var("APP_SECURE_COOKIES")
            .ok()
            .and_then(|value| parse_flag(&value))
            .unwrap_or(!cfg!(debug_assertions));

        Self {
            port,
            data_path,
            bootstrap_admin,
            secure_cookies,
        }
    }

    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.bootstrap_admin
            .as_deref()
            .is_some_and(|admin| admin == normalize_email(email))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            bootstrap_admin: None,
            secure_cookies: false,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
