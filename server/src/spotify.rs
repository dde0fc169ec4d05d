use color_eyre::eyre::{eyre, WrapErr as _};
use serde::Deserialize;

use crate::session::Session;
use crate::state::AppState;

/// A Spotify artist, trimmed to the fields the taste vector consumes
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
}

/// A Spotify track, trimmed to the fields the taste vector consumes
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub name: String,
    pub popularity: Option<u32>,
    #[serde(default)]
    pub explicit: bool,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub album: Album,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub release_date: String,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Paged<T> {
    #[serde(default)]
    items: Vec<T>,
}

/// The user's top artists and tracks, the raw material of a taste profile
#[derive(Debug, Clone)]
pub struct TopItems {
    pub artists: Vec<Artist>,
    pub tracks: Vec<Track>,
}

/// Fetch the user's top artists and tracks with the session's bearer token.
/// Any upstream failure is an error here; callers treat it as "not
/// authenticated" rather than guessing at partial data.
pub async fn fetch_top(state: &AppState, session: &Session) -> color_eyre::Result<TopItems> {
    let artists = get_paged::<Artist>(state, session, "me/top/artists?limit=20").await?;
    let tracks = get_paged::<Track>(state, session, "me/top/tracks?limit=20").await?;

    Ok(TopItems { artists, tracks })
}

async fn get_paged<T: serde::de::DeserializeOwned>(
    state: &AppState,
    session: &Session,
    path: &str,
) -> color_eyre::Result<Vec<T>> {
    let url = format!("{}/{path}", state.spotify.api_base);

    let response = state
        .client
        .get(&url)
        .bearer_auth(&session.access_token)
        .send()
        .await
        .wrap_err_with(|| format!("Spotify API unreachable for {path}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(eyre!("Spotify returned {status} for {path}"));
    }

    let page = response
        .json::<Paged<T>>()
        .await
        .wrap_err_with(|| format!("Spotify returned invalid JSON for {path}"))?;

    Ok(page.items)
}
