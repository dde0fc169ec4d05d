use std::path::PathBuf;

use color_eyre::eyre::WrapErr as _;

use crate::session::SessionKey;

/// Spotify OAuth + API configuration. The authorize/token/API endpoints are
/// overridable so tests and local dev can point at the fixtures provider.
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    /// Explicit callback URI; when unset the callback URI is derived from the
    /// request host. Must match what the provider has registered byte-for-byte.
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl SpotifyConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let client_id =
            std::env::var("SPOTIFY_CLIENT_ID").wrap_err("SPOTIFY_CLIENT_ID must be set")?;

        let scopes = std::env::var("ALLOWED_SCOPES")
            .unwrap_or_else(|_| {
                "user-top-read user-read-recently-played playlist-read-private".to_string()
            })
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            client_id,
            redirect_uri: std::env::var("SPOTIFY_REDIRECT_URI").ok(),
            scopes,
            auth_url: std::env::var("SPOTIFY_AUTH_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com/authorize".to_string()),
            token_url: std::env::var("SPOTIFY_TOKEN_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com/api/token".to_string()),
            api_base: std::env::var("SPOTIFY_API_BASE")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
        })
    }

    /// The callback URI sent to the provider. `/login` and `/callback` both go
    /// through here so the token exchange presents the exact URI the
    /// authorization request carried.
    pub fn resolve_redirect_uri(&self, protocol: &str, host: &str) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{protocol}://{host}/callback"))
    }
}

/// Stability image generation configuration
#[derive(Clone)]
pub struct StabilityConfig {
    /// API key; generation endpoints report `missing_api_key` when unset
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    /// Directory generated images are written to and served from
    pub generated_dir: PathBuf,
}

impl StabilityConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("STABILITY_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("STABILITY_MODEL")
                .unwrap_or_else(|_| "stable-diffusion-xl-1024-v1-0".to_string()),
            api_base: std::env::var("STABILITY_API_BASE")
                .unwrap_or_else(|_| "https://api.stability.ai".to_string()),
            generated_dir: std::env::var("GENERATED_DIR")
                .unwrap_or_else(|_| "generated".to_string())
                .into(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub spotify: SpotifyConfig,
    pub stability: StabilityConfig,
    pub session_key: SessionKey,
    pub client: reqwest::Client,
    pub protocol: String,
}

impl AppState {
    pub fn from_env() -> color_eyre::Result<Self> {
        let secret = std::env::var("SESSION_SECRET").wrap_err(
            "SESSION_SECRET must be set; run the generate-secret binary to mint one",
        )?;

        Ok(Self {
            spotify: SpotifyConfig::from_env()?,
            stability: StabilityConfig::from_env(),
            session_key: SessionKey::new(secret.as_bytes()),
            client: build_http_client()?,
            protocol: std::env::var("PROTO").unwrap_or_else(|_| "https".to_string()),
        })
    }

    /// Whether cookies carry the Secure flag (anything served over TLS)
    pub fn secure_cookies(&self) -> bool {
        self.protocol == "https"
    }
}

/// Shared outbound HTTP client. The 30s timeout bounds every provider call;
/// a hung token exchange fails the login instead of wedging the request.
pub fn build_http_client() -> color_eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .timeout(std::time::Duration::from_secs(30))
        .use_rustls_tls()
        .build()
        .wrap_err("Failed to build HTTP client")
}
