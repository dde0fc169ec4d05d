use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    components::{
        layout::{Card, Page},
        ui::{button::Button, heading::Heading},
    },
    session::OptionalSession,
    state::AppState,
    taste,
};

pub mod auth;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        // Pages
        .route("/", get(index_page))
        .route("/about", get(about_page))
        .route("/healthz", get(healthz))
        // Auth flow
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/refresh", get(auth::refresh))
        .route("/logout", get(auth::logout))
        // Art API
        .route("/api/preview", get(crate::generate::preview))
        .route("/api/generate", get(crate::generate::generate_art))
        .route("/generated/:file", get(crate::generate::serve_generated))
        // Static files route
        .route(
            "/static/*path",
            get(crate::static_assets::serve_static_file),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_cookies::CookieManagerLayer::new())
        .with_state(app_state)
}

#[derive(Deserialize)]
struct IndexParams {
    error: Option<String>,
}

/// Index page: the whole app lives here. Anonymous visitors get the connect
/// button; authenticated ones get the canvas and the generator controls.
async fn index_page(
    OptionalSession(session): OptionalSession,
    State(_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Page {
    use maud::Render;

    let error_banner = params.error.as_deref().map(|code| {
        maud::html! {
            div class="mb-6 px-4 py-3 rounded-md bg-red-950 border border-red-800 text-red-200 text-sm" {
                (friendly_error(code))
            }
        }
    });

    let body = match session {
        Some(_) => maud::html! {
            p class="text-neutral-400 mb-6" { "Connected to Spotify. Preview your print, or render it properly." }

            canvas id="art" width="960" height="400" class="w-full rounded-md bg-black mb-4" {}
            p id="status" class="text-sm text-neutral-500 mb-4" {}

            div class="flex flex-wrap items-center gap-3 mb-6" {
                select id="theme" class="bg-neutral-800 text-neutral-100 rounded-md px-3 py-2.5" {
                    @for theme in taste::THEMES {
                        option value=(theme) { (theme) }
                    }
                }
                (Button::primary("Generate artwork").id("generate").render())
                (Button::new("Redraw preview").id("refresh").render())
            }

            img id="generated" class="w-full rounded-md hidden" alt="Generated artwork";
            p id="prompt" class="text-xs text-neutral-500 mt-2" {}

            div class="mt-8 pt-4 border-t border-neutral-800 flex gap-4 text-sm" {
                a href="/refresh" class="text-emerald-400 hover:text-emerald-300" { "Refresh session" }
                a href="/logout" class="text-neutral-400 hover:text-neutral-200" { "Disconnect" }
            }
        },
        None => maud::html! {
            p class="text-neutral-400 mb-8" {
                "Connect your Spotify account and soundprint turns your listening history into generative art."
            }

            (Button::primary("Connect with Spotify").href("/login").render())
        },
    };

    let content = maud::html! {
        div class="px-6 sm:px-10 py-8" {
            (Heading::h1("soundprint").render())

            @if let Some(banner) = error_banner { (banner) }

            (body)

            div class="mt-6 text-sm" {
                a href="/about" class="text-neutral-500 hover:text-neutral-300" { "About" }
            }
        }
    };

    Page::new(
        "soundprint".to_string(),
        Box::new(maud::html! {
            (Card::new(content).with_max_width("max-w-3xl").render())
            (crate::static_assets::art_script())
        }),
    )
}

/// About page handler
async fn about_page() -> Page {
    use maud::Render;

    let content = maud::html! {
        div class="px-6 sm:px-10 py-8" {
            (Heading::h1("About soundprint").render())

            div class="space-y-4 text-neutral-300" {
                p {
                    "soundprint reads your Spotify top artists and tracks, distills them into a "
                    "compact taste profile, and uses it to drive a generative-art pipeline: an "
                    "instant canvas preview in the browser and a full render through Stability."
                }

                (Heading::h2("Where your data lives").render())
                p {
                    "Your session lives entirely in a signed cookie in your browser. "
                    "We keep no accounts and no database; disconnecting deletes everything."
                }
            }

            div class="mt-8" {
                (Button::new("Back to home").href("/").render())
            }
        }
    };

    Page::new(
        "About - soundprint".to_string(),
        Box::new(Card::new(content).with_max_width("max-w-2xl")),
    )
}

/// Liveness + configuration probe
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "stability_key_present": state.stability.api_key.is_some(),
        "model": state.stability.model,
    }))
}

/// Turn a flow error code into something worth showing a person
fn friendly_error(code: &str) -> String {
    match code {
        "access_denied" => "You declined the Spotify authorization, so nothing was connected.".to_string(),
        "missing_verifier" => {
            "That login attempt expired or was already used. Start again from the connect button.".to_string()
        }
        "state_mismatch" => {
            "The login response did not match the attempt this browser started. Start again.".to_string()
        }
        "missing_code" => "Spotify did not send an authorization code back. Start again.".to_string(),
        "token_exchange_failed" => {
            "Spotify rejected the login exchange. Try again in a moment.".to_string()
        }
        "no_session" => "You are not connected yet.".to_string(),
        "no_refresh_token" => {
            "This session cannot be refreshed; connect with Spotify again.".to_string()
        }
        other => format!("Login failed ({other})."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flow_error_code_has_a_message() {
        for code in [
            "access_denied",
            "missing_verifier",
            "state_mismatch",
            "missing_code",
            "token_exchange_failed",
            "no_session",
            "no_refresh_token",
        ] {
            assert!(!friendly_error(code).contains('('), "{code} fell through to the generic message");
        }
    }

    #[test]
    fn unknown_codes_still_render_something() {
        assert!(friendly_error("weird_code").contains("weird_code"));
    }
}
