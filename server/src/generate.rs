use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use color_eyre::eyre::{eyre, WrapErr as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    errors::{ServerResult, WithStatus as _},
    session::{OptionalSession, Session},
    spotify,
    state::AppState,
    taste::{self, StableRng},
};

#[derive(Deserialize)]
pub struct GenerateParams {
    pub theme: Option<String>,
}

/// Canvas preview parameters for the logged-in listener. Anonymous and
/// stale-token requests both read as `not_authed`; the client shows the
/// connect button instead of retrying.
pub async fn preview(
    State(state): State<AppState>,
    OptionalSession(session): OptionalSession,
) -> Response {
    let Some(session) = session else {
        return json_error(StatusCode::UNAUTHORIZED, "not_authed");
    };

    let top = match spotify::fetch_top(&state, &session).await {
        Ok(top) => top,
        Err(err) => {
            error!("Failed to fetch top items for preview: {err:?}");
            return json_error(StatusCode::UNAUTHORIZED, "not_authed");
        }
    };

    let taste = taste::build_taste_vector(&top.artists, &top.tracks);
    let visuals = taste::map_to_visuals(&taste, &fingerprint(&session));

    Json(json!({ "params": visuals })).into_response()
}

/// Generate a piece of taste-driven art via Stability and store it for
/// serving. Returns the image URL plus the prompt that produced it.
pub async fn generate_art(
    State(state): State<AppState>,
    OptionalSession(session): OptionalSession,
    Query(params): Query<GenerateParams>,
) -> Response {
    let Some(api_key) = state.stability.api_key.clone() else {
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "missing_api_key");
    };

    let Some(session) = session else {
        return json_error(StatusCode::UNAUTHORIZED, "not_authed");
    };

    let top = match spotify::fetch_top(&state, &session).await {
        Ok(top) => top,
        Err(err) => {
            error!("Failed to fetch top items for generation: {err:?}");
            return json_error(StatusCode::UNAUTHORIZED, "not_authed");
        }
    };

    let taste = taste::build_taste_vector(&top.artists, &top.tracks);
    let theme = taste::normalize_theme(params.theme.as_deref().unwrap_or_default());

    let fingerprint = fingerprint(&session);
    let mut rng = StableRng::new(taste::stable_seed(&fingerprint));
    let (genre, pop, era) = taste::three_words(&taste, &mut rng);

    let prompt = format!(
        "{genre} {pop} {era}, {theme}, abstract digital art, high detail, \
         volumetric lighting, vector shapes, generative aesthetic, 4k"
    );

    let png = match request_image(&state, &api_key, &prompt).await {
        Ok(png) => png,
        Err(err) => {
            error!("Image generation failed: {err:?}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "generation_failed");
        }
    };

    let filename = format!("{}.png", Uuid::new_v4());
    if let Err(err) = store_image(&state, &filename, &png).await {
        error!("Failed to store generated image: {err:?}");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_failed");
    }

    info!("Generated {} from prompt: {prompt}", filename);

    Json(json!({
        "image_url": format!("/generated/{filename}"),
        "prompt": prompt,
        "theme": theme,
        "three_words": format!("{genre} {pop} {era}"),
    }))
    .into_response()
}

/// Serve a previously generated image from disk
pub async fn serve_generated(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ServerResult<Response, StatusCode> {
    // Filenames are UUIDs we minted; anything else has no business here
    if file.contains("..")
        || !file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let path = state.stability.generated_dir.join(&file);
    let contents = tokio::fs::read(&path)
        .await
        .wrap_err_with(|| format!("No generated image at {}", path.display()))
        .with_status(StatusCode::NOT_FOUND)?;

    let mime_type = mime_guess::from_path(&file).first_or_octet_stream().to_string();

    Ok((
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        contents,
    )
        .into_response())
}

#[derive(Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: f32,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Deserialize)]
struct GenerationResponse {
    artifacts: Vec<GenerationArtifact>,
}

#[derive(Deserialize)]
struct GenerationArtifact {
    base64: String,
}

async fn request_image(
    state: &AppState,
    api_key: &str,
    prompt: &str,
) -> color_eyre::Result<Vec<u8>> {
    let url = format!(
        "{}/v1/generation/{}/text-to-image",
        state.stability.api_base, state.stability.model
    );

    let body = GenerationRequest {
        text_prompts: vec![TextPrompt {
            text: prompt,
            weight: 1.0,
        }],
        cfg_scale: 7,
        height: 640,
        width: 1536,
        samples: 1,
        steps: 30,
    };

    let response = state
        .client
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .wrap_err("Stability API unreachable")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, %body, "Stability generation request rejected");
        return Err(eyre!("Stability returned {status}"));
    }

    let generation = response
        .json::<GenerationResponse>()
        .await
        .wrap_err("Stability returned invalid JSON")?;

    let artifact = generation
        .artifacts
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("Stability returned no artifacts"))?;

    let bytes = STANDARD
        .decode(artifact.base64)
        .wrap_err("Artifact is not valid base64")?;

    // The bytes get written to disk and served back; insist they really are a PNG
    if infer::get(&bytes).map(|t| t.mime_type()) != Some("image/png") {
        return Err(eyre!("Artifact did not decode to a PNG"));
    }

    Ok(bytes)
}

async fn store_image(state: &AppState, filename: &str, png: &[u8]) -> color_eyre::Result<()> {
    let dir = &state.stability.generated_dir;
    tokio::fs::create_dir_all(dir)
        .await
        .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
    tokio::fs::write(dir.join(filename), png)
        .await
        .wrap_err("Failed to write generated image")?;
    Ok(())
}

/// One-way listener fingerprint for seeding; never the token itself
fn fingerprint(session: &Session) -> String {
    format!("{:08x}", taste::stable_seed(&session.access_token))
}

fn json_error(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}
