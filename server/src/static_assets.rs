use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
};
use include_dir::{include_dir, Dir};
use maud::Markup;
use mime_guess::from_path;

// Include the static directory in the binary
static STATIC_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

// Serve static files from the embedded directory
pub async fn serve_static_file(Path(path): Path<String>) -> impl IntoResponse {
    if let Some(file) = STATIC_DIR.get_file(&path) {
        let contents = file.contents().to_vec();

        let mime_type = from_path(&path).first_or_octet_stream().to_string();

        (
            [
                (header::CONTENT_TYPE, mime_type),
                (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
            ],
            contents,
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Script tag for the embedded canvas renderer
pub fn art_script() -> Markup {
    maud::html! {
        script src="/static/art.js" defer {}
    }
}
