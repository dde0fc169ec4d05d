use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse as _, Response},
};
use reqwest::StatusCode;
use time::Duration;
use tracing::error;

pub use tower_cookies::Cookie;
use tower_cookies::cookie::SameSite;

use crate::state::AppState;

/// Request cookie jar carrying the site-wide cookie policy: everything we set
/// is HTTP-only, SameSite=Lax, scoped to `/`, and Secure whenever the site is
/// served over https.
pub struct CookieJar {
    cookies: tower_cookies::Cookies,
    state: AppState,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CookieJar {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = match tower_cookies::Cookies::from_request_parts(parts, state).await {
            Ok(cookies) => cookies,
            Err(_) => {
                error!("Failed to extract cookies from request");
                return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
        };

        Ok(CookieJar {
            cookies,
            state: state.clone(),
        })
    }
}

impl CookieJar {
    /// Get a cookie by name
    pub fn get(&self, name: &str) -> Option<Cookie<'static>> {
        self.cookies.get(name).map(Cookie::into_owned)
    }

    /// Set a cookie with the site-wide flags and the given lifetime
    pub fn add_site_cookie(&self, name: &str, value: String, max_age: Duration) {
        let mut cookie = Cookie::new(name.to_string(), value);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.state.secure_cookies());
        cookie.set_max_age(max_age);
        self.cookies.add(cookie);
    }

    /// Remove a cookie set by [`CookieJar::add_site_cookie`]
    pub fn remove_site_cookie(&self, name: &str) {
        let mut cookie = Cookie::new(name.to_string(), String::new());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_secure(self.state.secure_cookies());
        self.cookies.remove(cookie);
    }
}
