use std::net::SocketAddr;
use std::path::PathBuf;

const SETTINGS_PATH: &str = "PING_MONITOR_SETTINGS";

pub fn get_settings_path() -> Option<PathBuf> {
    std::env::var(SETTINGS_PATH).ok().map(PathBuf::from)
}

const API_ADDR: &str = "PING_MONITOR_API_ADDR";

pub fn get_api_addr() -> Option<SocketAddr> {
    let addr_from_env = std::env::var(API_ADDR);
    addr_from_env.ok().and_then(|res| res.parse().ok())
}

const API_TOKEN: &str = "PING_MONITOR_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(API_TOKEN);
    token_from_env.ok().filter(|t| !t.is_empty())
}
