//! In-process fakes for soundprint's external collaborators: a Spotify
//! authorize + token + API endpoint and a Stability generation endpoint.
//! Integration tests spawn these on ephemeral ports; the binaries run them
//! standalone for local development.

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// The only authorization code the fake provider ever issues
pub const AUTH_CODE: &str = "fixture-auth-code";
pub const ACCESS_TOKEN: &str = "fixture-access-token";
pub const REFRESHED_ACCESS_TOKEN: &str = "fixture-refreshed-access-token";
pub const REFRESH_TOKEN: &str = "fixture-refresh-token";
pub const SCOPE: &str = "user-top-read";

/// A real 1x1 PNG so consumers that sniff magic bytes are satisfied
pub const PNG_1X1_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Routes mimicking the slices of Spotify the app touches
pub fn spotify_router() -> Router {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/api/token", post(token))
        .route("/v1/me/top/artists", get(top_artists))
        .route("/v1/me/top/tracks", get(top_tracks))
}

/// Routes mimicking the Stability generation endpoint
pub fn stability_router() -> Router {
    Router::new().route("/v1/generation/:model/text-to-image", post(generation))
}

/// Serve a router on an ephemeral localhost port and return its address
pub async fn spawn(router: Router) -> anyhow::Result<std::net::SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            tracing::error!("fixture server exited: {err}");
        }
    });

    Ok(addr)
}

#[derive(Deserialize)]
struct AuthorizeParams {
    redirect_uri: String,
    state: Option<String>,
    code_challenge: Option<String>,
}

/// The user always consents instantly in fixture land
async fn authorize(Query(params): Query<AuthorizeParams>) -> impl IntoResponse {
    if params.code_challenge.as_deref().unwrap_or("").is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "code_challenge_required" })),
        )
            .into_response();
    }

    let mut target = format!("{}?code={}", params.redirect_uri, AUTH_CODE);
    if let Some(state) = params.state {
        target.push_str("&state=");
        target.push_str(&state);
    }
    Redirect::to(&target).into_response()
}

#[derive(Deserialize)]
struct TokenRequest {
    grant_type: String,
    code: Option<String>,
    code_verifier: Option<String>,
    refresh_token: Option<String>,
}

async fn token(Form(form): Form<TokenRequest>) -> impl IntoResponse {
    match form.grant_type.as_str() {
        "authorization_code" => {
            if form.code.as_deref() != Some(AUTH_CODE)
                || form.code_verifier.as_deref().unwrap_or("").is_empty()
            {
                return invalid_grant();
            }

            Json(json!({
                "access_token": ACCESS_TOKEN,
                "refresh_token": REFRESH_TOKEN,
                "expires_in": 3600,
                "scope": SCOPE,
                "token_type": "Bearer",
            }))
            .into_response()
        }
        "refresh_token" => {
            if form.refresh_token.as_deref() != Some(REFRESH_TOKEN) {
                return invalid_grant();
            }

            // Spotify omits the refresh token on refresh responses
            Json(json!({
                "access_token": REFRESHED_ACCESS_TOKEN,
                "expires_in": 3600,
                "scope": SCOPE,
                "token_type": "Bearer",
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response(),
    }
}

fn invalid_grant() -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant" })),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn is_authorized(headers: &HeaderMap) -> bool {
    matches!(
        bearer_token(headers),
        Some(ACCESS_TOKEN) | Some(REFRESHED_ACCESS_TOKEN)
    )
}

async fn top_artists(headers: HeaderMap) -> impl IntoResponse {
    if !is_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({
        "items": [
            { "name": "Slowdive", "genres": ["shoegaze", "dream pop"], "popularity": 55 },
            { "name": "Boards of Canada", "genres": ["techno"], "popularity": 48 },
        ]
    }))
    .into_response()
}

async fn top_tracks(headers: HeaderMap) -> impl IntoResponse {
    if !is_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({
        "items": [
            {
                "name": "Alison",
                "popularity": 60,
                "explicit": false,
                "duration_ms": 222000,
                "album": { "release_date": "1993-05-17" },
            },
            {
                "name": "Roygbiv",
                "popularity": 45,
                "explicit": false,
                "duration_ms": 148000,
                "album": { "release_date": "1998-04-20" },
            },
        ]
    }))
    .into_response()
}

async fn generation() -> impl IntoResponse {
    Json(json!({ "artifacts": [{ "base64": PNG_1X1_BASE64 }] }))
}
