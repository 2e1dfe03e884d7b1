use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use actix_web::http::header::ContentDisposition;
use actix_web::web::Bytes;
use actix_web::{get, web, HttpResponse};
use futures::stream;
use image::ImageFormat;
use tokio::io::AsyncReadExt;

use crate::endpoints::ApiError;
use crate::AppData;

const CHUNK_SIZE: usize = 64 * 1024;

#[get("/static/{filename:.*}")]
pub async fn static_file(
    filename: web::Path<String>,
    data: web::Data<AppData>,
) -> Result<HttpResponse, ApiError> {
    let path = resolve(data.static_dir(), &filename)
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;
    file_response(&path, None).await
}

fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain || relative.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(relative))
}

/// Streams the file at `path` in fixed-size chunks.
pub(crate) async fn file_response(
    path: &Path,
    disposition: Option<ContentDisposition>,
) -> Result<HttpResponse, ApiError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".into()))
        }
        Err(e) => {
            log::error!("Failed to open {}: {}", path.display(), e);
            return Err(ApiError::InternalError("Failed to read file".into()));
        }
    };
    let metadata = file.metadata().await.map_err(|e| {
        log::error!("Failed to stat {}: {}", path.display(), e);
        ApiError::InternalError("Failed to read file".into())
    })?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound("File not found".into()));
    }

    let body = stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok::<_, std::io::Error>(Some((Bytes::from(buf), file)))
    });

    let mut response = HttpResponse::Ok();
    response.content_type(content_type(path));
    if let Some(disposition) = disposition {
        response.insert_header(disposition);
    }
    Ok(response.no_chunking(metadata.len()).streaming(body))
}

pub(crate) fn content_type(path: &Path) -> &'static str {
    if let Ok(format) = ImageFormat::from_path(path) {
        return format.to_mime_type();
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
