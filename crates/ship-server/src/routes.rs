//! HTTP routes for serving deployed sites

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::gateway::AppState;

/// GET /site/{slug} serves the site's index page.
pub async fn serve_site_index(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    serve_file(&state, &slug, "index.html").await
}

/// GET /site/{slug}/{path} serves one file from a deployed site.
pub async fn serve_site_file(
    State(state): State<AppState>,
    Path((slug, path)): Path<(String, String)>,
) -> Response {
    serve_file(&state, &slug, &path).await
}

async fn serve_file(state: &AppState, slug: &str, path: &str) -> Response {
    let storage_path = format!("sites/{}/{}", slug, path);
    match state.storage.get_file_stream(&storage_path).await {
        Ok(stream) if stream.exists => {
            ([(header::CONTENT_TYPE, stream.content_type)], stream.data).into_response()
        }
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::debug!(path = %storage_path, error = %e, "site file lookup failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// GET /site/{slug}/download returns the whole site as a zip archive.
pub async fn download_site(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let dir = format!("sites/{}", slug);
    match state.storage.create_zip_from_directory(&dir).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.zip\"", slug),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(ship_storage::Error::DirectoryNotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(%slug, error = %e, "zip export failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
