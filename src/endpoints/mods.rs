use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::endpoints::ApiError;
use crate::integration::modrinth::DEFAULT_LIMIT;
use crate::AppData;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    query: String,
    mc_version: Option<String>,
    modloader: Option<String>,
}

#[derive(Deserialize)]
pub struct PopularQuery {
    mc_version: Option<String>,
    modloader: Option<String>,
    limit: Option<u32>,
}

fn filter(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[get("/api/mods/search")]
pub async fn search(
    data: web::Data<AppData>,
    query: web::Query<SearchQuery>,
) -> Result<impl Responder, ApiError> {
    let text = query.query.trim();
    let mc_version = filter(&query.mc_version);
    let modloader = filter(&query.modloader);
    log::info!(
        "Mod search: query='{}', mc_version={:?}, modloader={:?}",
        text,
        mc_version,
        modloader
    );

    let results = data
        .mods()
        .search(text, mc_version, modloader, DEFAULT_LIMIT)
        .await;
    log::info!("Found {} results", results.len());
    Ok(web::Json(results))
}

#[get("/api/mods/popular")]
pub async fn popular(
    data: web::Data<AppData>,
    query: web::Query<PopularQuery>,
) -> Result<impl Responder, ApiError> {
    let results = data
        .mods()
        .popular(
            filter(&query.mc_version),
            filter(&query.modloader),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await;
    Ok(web::Json(results))
}
