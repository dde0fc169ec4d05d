use axum::{
    extract::{Host, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{error, info};

use crate::{
    cookies::CookieJar,
    errors::{ServerResult, WithRedirect as _},
    oauth::{
        exchange_code_for_token, pkce, pkce::PkcePair, refresh_access_token, LoginState,
        LOGIN_COOKIE_NAME, LOGIN_MAX_AGE_SECS,
    },
    session::{unix_now, Session, SESSION_COOKIE_NAME, SESSION_DURATION_DAYS},
    state::{AppState, SpotifyConfig},
};

#[derive(Serialize)]
struct AuthUrlParams<'a> {
    client_id: &'a str,
    response_type: &'static str,
    redirect_uri: &'a str,
    scope: &'a str,
    state: &'a str,
    code_challenge_method: &'static str,
    code_challenge: &'a str,
}

/// Start the login flow: mint a PKCE pair and a CSRF state value, stash both
/// in the short-lived login cookie, and send the browser to the provider.
pub async fn login(
    State(state): State<AppState>,
    Host(host): Host,
    cookies: CookieJar,
) -> ServerResult<impl IntoResponse, StatusCode> {
    let pair = PkcePair::generate();
    let login_state = LoginState::new(pair.verifier);

    let redirect_uri = state.spotify.resolve_redirect_uri(&state.protocol, &host);
    let authorize_url = build_authorize_url(
        &state.spotify,
        &redirect_uri,
        &login_state.state,
        &pair.challenge,
    )?;

    let cookie_value = state.session_key.encode_login_state(&login_state)?;
    cookies.add_site_cookie(
        LOGIN_COOKIE_NAME,
        cookie_value,
        Duration::seconds(LOGIN_MAX_AGE_SECS as i64),
    );

    info!("Starting login, redirecting to provider authorize endpoint");
    Ok(Redirect::to(&authorize_url))
}

fn build_authorize_url(
    spotify: &SpotifyConfig,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> color_eyre::Result<String> {
    let scope = spotify.scopes.join(" ");
    let query = serde_urlencoded::to_string(AuthUrlParams {
        client_id: &spotify.client_id,
        response_type: "code",
        redirect_uri,
        scope: &scope,
        state,
        code_challenge_method: pkce::CHALLENGE_METHOD,
        code_challenge: challenge,
    })?;

    Ok(format!("{}?{}", spotify.auth_url, query))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish the login flow. Every failure branch lands on `/?error=<code>`;
/// only a successful token exchange mints a session cookie. The login cookie
/// is removed no matter what: a verifier is spent the moment a callback
/// touches it.
pub async fn callback(
    State(state): State<AppState>,
    Host(host): Host,
    cookies: CookieJar,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Response, Redirect> {
    let login_cookie = cookies.get(LOGIN_COOKIE_NAME);
    cookies.remove_site_cookie(LOGIN_COOKIE_NAME);

    if let Some(provider_error) = &params.error {
        info!("Provider returned error on callback: {provider_error}");
        return Ok(flow_error(provider_error).into_response());
    }

    let Some(login_cookie) = login_cookie else {
        info!("Callback arrived with no login cookie");
        return Ok(flow_error("missing_verifier").into_response());
    };

    let login_state = match state.session_key.decode_login_state(login_cookie.value()) {
        Ok(login_state) => login_state,
        Err(err) => {
            info!("Rejecting login cookie: {err}");
            return Ok(flow_error("missing_verifier").into_response());
        }
    };

    if login_state.is_expired_at(unix_now()) {
        info!("Login attempt expired before the callback arrived");
        return Ok(flow_error("missing_verifier").into_response());
    }

    if params.state.as_deref() != Some(login_state.state.as_str()) {
        info!("Callback state does not match the value bound to this login attempt");
        return Ok(flow_error("state_mismatch").into_response());
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        info!("Callback arrived without an authorization code");
        return Ok(flow_error("missing_code").into_response());
    };

    // Recomputed the same way /login computed it; the provider rejects the
    // exchange unless the two match byte-for-byte
    let redirect_uri = state.spotify.resolve_redirect_uri(&state.protocol, &host);

    let token_response =
        match exchange_code_for_token(&state, code, &redirect_uri, &login_state.verifier).await {
            Ok(token_response) => token_response,
            Err(err) => {
                error!("Token exchange failed: {err:?}");
                return Ok(flow_error("token_exchange_failed").into_response());
            }
        };

    let session = Session::from_token_response(token_response, unix_now());
    let cookie_value = state
        .session_key
        .encode_session(&session)
        .with_redirect(flow_error("session_error"))?;

    cookies.add_site_cookie(
        SESSION_COOKIE_NAME,
        cookie_value,
        Duration::days(SESSION_DURATION_DAYS),
    );

    info!("Authentication successful, session minted");
    Ok(Redirect::to("/").into_response())
}

/// Re-mint the session from its stored refresh token. Deliberately explicit:
/// the session accessor never refreshes on its own, an expired session reads
/// as anonymous until something calls this.
pub async fn refresh(
    State(state): State<AppState>,
    cookies: CookieJar,
) -> ServerResult<Response, Redirect> {
    let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) else {
        return Ok(flow_error("no_session").into_response());
    };

    // Decode without the expiry check; an expired-but-genuine session is
    // exactly what refresh exists for
    let session = match state.session_key.decode_session(cookie.value()) {
        Ok(session) => session,
        Err(err) => {
            info!("Rejecting session cookie on refresh: {err}");
            cookies.remove_site_cookie(SESSION_COOKIE_NAME);
            return Ok(flow_error("no_session").into_response());
        }
    };

    let Some(refresh_token) = session.refresh_token else {
        info!("Session has no refresh token, a full login is required");
        return Ok(flow_error("no_refresh_token").into_response());
    };

    let token_response = match refresh_access_token(&state, &refresh_token).await {
        Ok(token_response) => token_response,
        Err(err) => {
            error!("Refresh token exchange failed: {err:?}");
            return Ok(flow_error("token_exchange_failed").into_response());
        }
    };

    let mut refreshed = Session::from_token_response(token_response, unix_now());
    // Spotify omits the refresh token from refresh responses; keep the old one
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = Some(refresh_token);
    }

    let cookie_value = state
        .session_key
        .encode_session(&refreshed)
        .with_redirect(flow_error("session_error"))?;

    cookies.add_site_cookie(
        SESSION_COOKIE_NAME,
        cookie_value,
        Duration::days(SESSION_DURATION_DAYS),
    );

    info!("Session refreshed");
    Ok(Redirect::to("/").into_response())
}

/// Clear the session cookie and return home
pub async fn logout(cookies: CookieJar) -> impl IntoResponse {
    cookies.remove_site_cookie(SESSION_COOKIE_NAME);
    info!("User logged out, session cookie removed");
    Redirect::to("/")
}

/// The uniform failure contract for the auth flow: every failure redirects to
/// the index with an error code the page can turn into a friendly message
fn flow_error(code: &str) -> Redirect {
    Redirect::to(&format!("/?error={}", urlencoding::encode(code)))
}
