use std::net::SocketAddr;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use soundprint::{
    oauth::pkce::challenge_s256,
    routes::routes,
    session::{unix_now, Session, SessionKey},
    state::{build_http_client, AppState, SpotifyConfig, StabilityConfig},
};

const TEST_SECRET: &[u8] = b"integration-test-secret";
const TEST_HOST: &str = "soundprint.test";

/// An unroutable address for collaborators a test must never reach
const DEAD_ADDR: &str = "127.0.0.1:9";

fn test_state(
    provider: Option<SocketAddr>,
    stability: Option<SocketAddr>,
    generated_dir: PathBuf,
) -> AppState {
    let provider_base = provider
        .map(|a| format!("http://{a}"))
        .unwrap_or_else(|| format!("http://{DEAD_ADDR}"));
    let stability_base = stability
        .map(|a| format!("http://{a}"))
        .unwrap_or_else(|| format!("http://{DEAD_ADDR}"));

    AppState {
        spotify: SpotifyConfig {
            client_id: "test-client".to_string(),
            redirect_uri: None,
            scopes: vec!["user-top-read".to_string()],
            auth_url: format!("{provider_base}/authorize"),
            token_url: format!("{provider_base}/api/token"),
            api_base: format!("{provider_base}/v1"),
        },
        stability: StabilityConfig {
            api_key: Some("test-stability-key".to_string()),
            model: "test-model".to_string(),
            api_base: stability_base,
            generated_dir,
        },
        session_key: SessionKey::new(TEST_SECRET),
        client: build_http_client().unwrap(),
        protocol: "http".to_string(),
    }
}

async fn get(app: &Router, uri: &str, cookies: &[String]) -> Response {
    let mut builder = Request::builder().uri(uri).header(header::HOST, TEST_HOST);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies.join("; "));
    }

    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Value of the named cookie among the response's Set-Cookie headers
fn set_cookie_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let pair = raw.split(';').next()?;
            let (cookie_name, value) = pair.split_once('=')?;
            (cookie_name == name).then(|| value.to_string())
        })
}

fn raw_set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|kv| {
        let (key, value) = kv.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

fn session_cookie(key: &SessionKey, session: &Session) -> String {
    format!("session={}", key.encode_session(session).unwrap())
}

fn valid_session(expires_at: u64) -> Session {
    Session {
        access_token: fixtures::ACCESS_TOKEN.to_string(),
        refresh_token: Some(fixtures::REFRESH_TOKEN.to_string()),
        expires_at,
        scope: fixtures::SCOPE.to_string(),
        token_type: "Bearer".to_string(),
    }
}

#[tokio::test]
async fn login_sets_login_cookie_and_builds_a_pkce_authorize_url() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let response = get(&app, "/login", &[]).await;

    assert!(response.status().is_redirection());

    let raw_cookie = raw_set_cookie(&response, "pkce_verifier").expect("login cookie not set");
    assert!(raw_cookie.contains("HttpOnly"));
    assert!(raw_cookie.contains("SameSite=Lax"));
    assert!(raw_cookie.contains("Max-Age=600"));

    let cookie_value = set_cookie_value(&response, "pkce_verifier").unwrap();
    let login_state = state
        .session_key
        .decode_login_state(&cookie_value)
        .expect("login cookie is not a signed login state");

    let authorize_url = location(&response);
    assert!(authorize_url.starts_with(&state.spotify.auth_url));
    assert_eq!(
        query_param(&authorize_url, "code_challenge_method").as_deref(),
        Some("S256")
    );
    assert_eq!(
        query_param(&authorize_url, "code_challenge").as_deref(),
        Some(challenge_s256(&login_state.verifier).as_str())
    );
    assert_eq!(
        query_param(&authorize_url, "state").as_deref(),
        Some(login_state.state.as_str())
    );
    assert_eq!(
        query_param(&authorize_url, "response_type").as_deref(),
        Some("code")
    );
}

#[tokio::test]
async fn two_logins_never_reuse_a_verifier() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let first = get(&app, "/login", &[]).await;
    let second = get(&app, "/login", &[]).await;

    let first_login = state
        .session_key
        .decode_login_state(&set_cookie_value(&first, "pkce_verifier").unwrap())
        .unwrap();
    let second_login = state
        .session_key
        .decode_login_state(&set_cookie_value(&second, "pkce_verifier").unwrap())
        .unwrap();

    assert_ne!(first_login.verifier, second_login.verifier);
    assert_ne!(first_login.state, second_login.state);
}

#[tokio::test]
async fn callback_without_login_cookie_fails_with_missing_verifier() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let response = get(&app, "/callback?code=anything&state=anything", &[]).await;

    assert_eq!(location(&response), "/?error=missing_verifier");
    assert!(set_cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn callback_with_tampered_login_cookie_fails_with_missing_verifier() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let cookie = "pkce_verifier=not-a-signed-token".to_string();
    let response = get(&app, "/callback?code=anything&state=anything", &[cookie]).await;

    assert_eq!(location(&response), "/?error=missing_verifier");
    assert!(set_cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn provider_error_short_circuits_before_the_token_exchange() {
    let dir = tempfile::tempdir().unwrap();
    // Token endpoint is unreachable: reaching it would fail as
    // token_exchange_failed, so the assertion below proves it was never tried
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let login = get(&app, "/login", &[]).await;
    let cookie = format!(
        "pkce_verifier={}",
        set_cookie_value(&login, "pkce_verifier").unwrap()
    );

    let response = get(&app, "/callback?error=access_denied", &[cookie]).await;

    assert_eq!(location(&response), "/?error=access_denied");
    assert!(set_cookie_value(&response, "session").is_none());

    // The spent login cookie is cleared even on failure
    let removal = raw_set_cookie(&response, "pkce_verifier").unwrap();
    assert!(removal.starts_with("pkce_verifier=;"));
}

#[tokio::test]
async fn callback_with_wrong_state_fails_with_state_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let login = get(&app, "/login", &[]).await;
    let cookie = format!(
        "pkce_verifier={}",
        set_cookie_value(&login, "pkce_verifier").unwrap()
    );

    let response = get(&app, "/callback?code=anything&state=forged-value", &[cookie]).await;

    assert_eq!(location(&response), "/?error=state_mismatch");
    assert!(set_cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn full_login_flow_mints_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let provider = fixtures::spawn(fixtures::spotify_router()).await.unwrap();
    let state = test_state(Some(provider), None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let login = get(&app, "/login", &[]).await;
    let cookie = format!(
        "pkce_verifier={}",
        set_cookie_value(&login, "pkce_verifier").unwrap()
    );
    let csrf_state = query_param(&location(&login), "state").unwrap();

    let before = unix_now();
    let callback_uri = format!("/callback?code={}&state={csrf_state}", fixtures::AUTH_CODE);
    let response = get(&app, &callback_uri, &[cookie]).await;

    assert_eq!(location(&response), "/");

    let session = state
        .session_key
        .decode_session(&set_cookie_value(&response, "session").unwrap())
        .expect("session cookie is not a signed session");

    assert_eq!(session.access_token, fixtures::ACCESS_TOKEN);
    assert_eq!(session.refresh_token.as_deref(), Some(fixtures::REFRESH_TOKEN));
    assert_eq!(session.token_type, "Bearer");
    assert!(session.expires_at >= before + 3600);
    assert!(session.expires_at <= unix_now() + 3600);

    // The one-shot verifier is gone
    let removal = raw_set_cookie(&response, "pkce_verifier").unwrap();
    assert!(removal.starts_with("pkce_verifier=;"));

    let raw_session = raw_set_cookie(&response, "session").unwrap();
    assert!(raw_session.contains("HttpOnly"));
    assert!(raw_session.contains("SameSite=Lax"));
}

#[tokio::test]
async fn exchange_failure_redirects_with_token_exchange_failed() {
    let dir = tempfile::tempdir().unwrap();
    let provider = fixtures::spawn(fixtures::spotify_router()).await.unwrap();
    let state = test_state(Some(provider), None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let login = get(&app, "/login", &[]).await;
    let cookie = format!(
        "pkce_verifier={}",
        set_cookie_value(&login, "pkce_verifier").unwrap()
    );
    let csrf_state = query_param(&location(&login), "state").unwrap();

    let response = get(
        &app,
        &format!("/callback?code=not-the-right-code&state={csrf_state}"),
        &[cookie],
    )
    .await;

    assert_eq!(location(&response), "/?error=token_exchange_failed");
    assert!(set_cookie_value(&response, "session").is_none());
}

#[tokio::test]
async fn expired_session_is_anonymous_to_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let expired = valid_session(unix_now() - 10);
    let cookie = session_cookie(&state.session_key, &expired);

    let response = get(&app, "/api/preview", &[cookie]).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_remints_an_expired_session() {
    let dir = tempfile::tempdir().unwrap();
    let provider = fixtures::spawn(fixtures::spotify_router()).await.unwrap();
    let state = test_state(Some(provider), None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let expired = valid_session(unix_now() - 10);
    let cookie = session_cookie(&state.session_key, &expired);

    let response = get(&app, "/refresh", &[cookie]).await;

    assert_eq!(location(&response), "/");

    let refreshed = state
        .session_key
        .decode_session(&set_cookie_value(&response, "session").unwrap())
        .unwrap();

    assert_eq!(refreshed.access_token, fixtures::REFRESHED_ACCESS_TOKEN);
    // The provider omitted the refresh token; the old one is carried forward
    assert_eq!(refreshed.refresh_token.as_deref(), Some(fixtures::REFRESH_TOKEN));
    assert!(refreshed.expires_at > unix_now());
}

#[tokio::test]
async fn refresh_without_a_session_redirects_home_with_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let response = get(&app, "/refresh", &[]).await;

    assert_eq!(location(&response), "/?error=no_session");
}

#[tokio::test]
async fn preview_returns_canvas_parameters_for_a_live_session() {
    let dir = tempfile::tempdir().unwrap();
    let provider = fixtures::spawn(fixtures::spotify_router()).await.unwrap();
    let state = test_state(Some(provider), None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let cookie = session_cookie(&state.session_key, &valid_session(unix_now() + 3600));
    let response = get(&app, "/api/preview", &[cookie]).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let params = &json["params"];
    assert_eq!(params["palette"].as_array().unwrap().len(), 4);
    assert!(params["density"].as_f64().unwrap() >= 0.2);
    assert!(params["seed"].as_str().unwrap().contains('|'));
}

#[tokio::test]
async fn generate_stores_and_serves_a_png() {
    let dir = tempfile::tempdir().unwrap();
    let provider = fixtures::spawn(fixtures::spotify_router()).await.unwrap();
    let stability = fixtures::spawn(fixtures::stability_router()).await.unwrap();
    let state = test_state(
        Some(provider),
        Some(stability),
        dir.path().to_path_buf(),
    );
    let app = routes(state.clone());

    let cookie = session_cookie(&state.session_key, &valid_session(unix_now() + 3600));
    let response = get(&app, "/api/generate?theme=vaporwave", &[cookie]).await;

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["theme"], "vaporwave");
    assert!(json["prompt"].as_str().unwrap().contains("vaporwave"));

    let image_url = json["image_url"].as_str().unwrap();
    assert!(image_url.starts_with("/generated/"));

    let image = get(&app, image_url, &[]).await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(
        image.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn generate_requires_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let response = get(&app, "/api/generate", &[]).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn generated_route_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let response = get(&app, "/generated/%2e%2e%2fsecrets.txt", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_reports_version_and_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let app = routes(test_state(None, None, dir.path().to_path_buf()));

    let response = get(&app, "/healthz", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["model"], "test-model");
    assert_eq!(json["stability_key_present"], true);
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(None, None, dir.path().to_path_buf());
    let app = routes(state.clone());

    let cookie = session_cookie(&state.session_key, &valid_session(unix_now() + 3600));
    let response = get(&app, "/logout", &[cookie]).await;

    assert_eq!(location(&response), "/");
    let removal = raw_set_cookie(&response, "session").unwrap();
    assert!(removal.starts_with("session=;"));
}
