use actix_multipart::MultipartError;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};

use crate::modpack_zip::ArchiveError;
use crate::modpacks::ModpackError;
use crate::types::api::ErrorBody;

pub mod assets;
pub mod health;
pub mod modpacks;
pub mod mods;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn as_response(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(..) | ApiError::InternalError(..) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::Unauthorized = self {
            response.insert_header((
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"modpack-index\""),
            ));
        }
        response.json(self.as_response())
    }
}

impl From<ModpackError> for ApiError {
    fn from(err: ModpackError) -> ApiError {
        match err {
            ModpackError::UnsupportedFileType
            | ModpackError::Upload(..)
            | ModpackError::InvalidData(..)
            | ModpackError::MissingField(..)
            | ModpackError::InvalidIdentifier(..)
            | ModpackError::EmptyModList
            | ModpackError::UnsupportedImageType => ApiError::BadRequest(err.to_string()),
            ModpackError::Archive(ArchiveError::Io(e)) => {
                log::error!("Failed to unpack upload: {}", e);
                ApiError::InternalError(e.to_string())
            }
            ModpackError::Archive(e) => ApiError::BadRequest(e.to_string()),
            ModpackError::TooLarge(..) => ApiError::PayloadTooLarge(err.to_string()),
            ModpackError::NotFound(..) => ApiError::NotFound(err.to_string()),
            ModpackError::IconNotFound(..) => ApiError::NotFound("Icon not found".into()),
            ModpackError::ModFetch { .. } => {
                log::error!("{}", err);
                ApiError::Upstream(err.to_string())
            }
            ModpackError::Storage(..)
            | ModpackError::Encode(..)
            | ModpackError::Io(..)
            | ModpackError::Task(..) => {
                log::error!("{}", err);
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> ApiError {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err))
    }
}

/// Registers every route of the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(modpacks::index)
        .service(modpacks::create)
        .service(modpacks::upload)
        .service(modpacks::get)
        .service(modpacks::download)
        .service(modpacks::icon)
        .service(modpacks::delete)
        .service(mods::search)
        .service(mods::popular)
        .service(assets::static_file)
        .service(health::health);
}
