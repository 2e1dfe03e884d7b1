use actix_web::{error::QueryPayloadError, HttpRequest};
use serde::{Deserialize, Serialize};

use crate::endpoints::ApiError;

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    pub success: bool,
    pub id: String,
}

impl Created {
    pub fn new(id: String) -> Created {
        Created { success: true, id }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub success: bool,
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}
