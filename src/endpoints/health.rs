use actix_web::{get, web, Responder};

use crate::endpoints::ApiError;

#[get("/")]
pub async fn health() -> Result<impl Responder, ApiError> {
    Ok(web::Json("The modpack index is running"))
}
