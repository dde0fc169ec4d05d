use color_eyre::eyre::{eyre, WrapErr as _};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::state::AppState;

/// Token endpoint response for both the authorization-code and refresh grants
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Serialize)]
struct ExchangeParams<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshParams<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// Exchange an authorization code plus its PKCE verifier for a token set.
/// One-shot: no retries, and the caller discards the verifier regardless of
/// the outcome. The redirect URI must match the authorization request exactly.
pub async fn exchange_code_for_token(
    state: &AppState,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> color_eyre::Result<TokenResponse> {
    let params = ExchangeParams {
        client_id: &state.spotify.client_id,
        grant_type: "authorization_code",
        code,
        redirect_uri,
        code_verifier,
    };

    post_token_request(state, &params).await
}

/// Trade a refresh token for a new token set (`grant_type=refresh_token`)
pub async fn refresh_access_token(
    state: &AppState,
    refresh_token: &str,
) -> color_eyre::Result<TokenResponse> {
    let params = RefreshParams {
        client_id: &state.spotify.client_id,
        grant_type: "refresh_token",
        refresh_token,
    };

    post_token_request(state, &params).await
}

async fn post_token_request<P: Serialize>(
    state: &AppState,
    params: &P,
) -> color_eyre::Result<TokenResponse> {
    let response = state
        .client
        .post(&state.spotify.token_url)
        .form(params)
        .send()
        .await
        .wrap_err("Token endpoint unreachable")?;

    let status = response.status();
    if !status.is_success() {
        // Status and body go to the log for operators; the user never sees them raw
        let body = response.text().await.unwrap_or_default();
        error!(%status, %body, "Token exchange failed");
        return Err(eyre!("Token exchange failed with status {status}"));
    }

    response
        .json::<TokenResponse>()
        .await
        .wrap_err("Token endpoint returned invalid JSON")
}
