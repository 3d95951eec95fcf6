//! Environment for the live tests.
//!
//! The live tests talk to the authority's test environment and need a real
//! certificate, so they only run when `SIFEN_LIVE_CERT` is set. A
//! repository-root `.env` file is loaded first; variables already present
//! in the process environment win.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_LIVE_CERT: &str = "SIFEN_LIVE_CERT";
pub const ENV_LIVE_PASSWORD: &str = "SIFEN_LIVE_PASSWORD";
pub const ENV_LIVE_CDC: &str = "SIFEN_LIVE_CDC";

/// Load `KEY=VALUE` lines from `<repo>/.env` without overwriting anything.
pub fn load_dotenv_if_present() {
    let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        env::set_var(key, value);
    }
}

/// Certificate and password for the live tests, if configured.
pub struct LiveCredentials {
    pub cert_path: PathBuf,
    pub password: Option<String>,
}

pub fn live_credentials() -> Option<LiveCredentials> {
    load_dotenv_if_present();
    let cert_path = PathBuf::from(env::var(ENV_LIVE_CERT).ok()?);
    Some(LiveCredentials {
        cert_path,
        password: env::var(ENV_LIVE_PASSWORD).ok(),
    })
}
