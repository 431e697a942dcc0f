// Application configuration, loaded from environment variables.

use crate::engine::config::{DEFAULT_HEIGHT, DEFAULT_TICK_MS, DEFAULT_WIDTH};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Grid width in tiles.
    pub width: usize,
    /// Grid height in tiles.
    pub height: usize,
    /// Number of resource-base tiles seeded at world creation.
    pub resource_tiles: usize,
    /// Tick interval in milliseconds.
    pub tick_ms: u64,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Whether to skip JWT validation (`ALLOW_INSECURE_AUTH=true`).
    pub skip_auth: bool,
    /// Cognito region, e.g. `us-east-1`.
    pub cognito_region: String,
    /// Cognito user pool id.
    pub cognito_user_pool_id: String,
    /// Cognito app client id, validated as the token audience when set.
    pub cognito_app_client_id: String,
    /// Allowed CORS origin; permissive when unset.
    pub cors_allowed_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `GAME_WIDTH` / `GAME_HEIGHT` - grid dimensions (default: 64x64)
    /// - `GAME_RESOURCE_TILES` - resource bases (default: width*height/10)
    /// - `GAME_TICK_MS` - tick interval (default: 1000)
    /// - `PORT` - HTTP server port (default: 8080)
    /// - `ALLOW_INSECURE_AUTH` - `true` disables JWT validation
    /// - `COGNITO_REGION`, `COGNITO_USER_POOL_ID`, `COGNITO_APP_CLIENT_ID`
    /// - `CORS_ALLOWED_ORIGIN` - single allowed origin
    pub fn load() -> Self {
        let width = env_usize("GAME_WIDTH", DEFAULT_WIDTH);
        let height = env_usize("GAME_HEIGHT", DEFAULT_HEIGHT);
        let resource_tiles = env_usize("GAME_RESOURCE_TILES", width * height / 10);
        let tick_ms = std::env::var("GAME_TICK_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TICK_MS);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let skip_auth = std::env::var("ALLOW_INSECURE_AUTH")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Config {
            width,
            height,
            resource_tiles,
            tick_ms,
            port,
            skip_auth,
            cognito_region: std::env::var("COGNITO_REGION").unwrap_or_default(),
            cognito_user_pool_id: std::env::var("COGNITO_USER_POOL_ID").unwrap_or_default(),
            cognito_app_client_id: std::env::var("COGNITO_APP_CLIENT_ID").unwrap_or_default(),
            cors_allowed_origin: std::env::var("CORS_ALLOWED_ORIGIN").ok().filter(|v| !v.is_empty()),
        }
    }
}

fn env_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_usize_fallback() {
        assert_eq!(env_usize("SPHERES_TEST_UNSET_VAR", 64), 64);
        std::env::set_var("SPHERES_TEST_SET_VAR", "32");
        assert_eq!(env_usize("SPHERES_TEST_SET_VAR", 64), 32);
        std::env::set_var("SPHERES_TEST_SET_VAR", "not-a-number");
        assert_eq!(env_usize("SPHERES_TEST_SET_VAR", 64), 64);
        std::env::remove_var("SPHERES_TEST_SET_VAR");
    }
}
