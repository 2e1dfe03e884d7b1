use actix_multipart::{Field, Multipart};
use actix_web::http::header::ContentDisposition;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use futures::TryStreamExt;

use crate::endpoints::assets::file_response;
use crate::endpoints::ApiError;
use crate::extractors::auth::Admin;
use crate::modpacks::builder::Logo;
use crate::modpack_zip::ARCHIVE_EXTENSION;
use crate::types::api::{Created, Deleted};
use crate::AppData;

#[get("/api/modpacks")]
pub async fn index(data: web::Data<AppData>) -> Result<impl Responder, ApiError> {
    Ok(web::Json(data.modpacks().list().await))
}

#[get("/api/modpacks/{id}")]
pub async fn get(id: web::Path<String>, data: web::Data<AppData>) -> Result<impl Responder, ApiError> {
    Ok(web::Json(data.modpacks().get(&id).await?))
}

#[post("/api/modpacks")]
pub async fn upload(
    admin: Admin,
    data: web::Data<AppData>,
    mut payload: Multipart,
) -> Result<impl Responder, ApiError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some("file") {
            drain(&mut field).await?;
            continue;
        }

        let filename = filename(&field).unwrap_or_default();
        if filename.is_empty() {
            return Err(ApiError::BadRequest("No file selected".into()));
        }

        log::info!("{} is uploading {}", admin.username(), filename);
        let id = data.modpacks().upload(&filename, field).await?;
        return Ok(web::Json(Created::new(id)));
    }

    Err(ApiError::BadRequest("No file provided".into()))
}

#[post("/api/modpacks/create")]
pub async fn create(
    admin: Admin,
    data: web::Data<AppData>,
    mut payload: Multipart,
) -> Result<impl Responder, ApiError> {
    let limit = data.modpacks().storage().max_upload_bytes();
    let mut draft: Option<String> = None;
    let mut logo: Option<Logo> = None;

    while let Some(mut field) = payload.try_next().await? {
        match field.name() {
            Some("data") => {
                let bytes = read_field(&mut field, limit).await?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| ApiError::BadRequest("Modpack data must be UTF-8 text".into()))?;
                draft = Some(text);
            }
            Some("logo") => {
                let name = filename(&field).unwrap_or_default();
                let bytes = read_field(&mut field, limit).await?;
                if !name.is_empty() {
                    logo = Some(Logo {
                        filename: name,
                        bytes,
                    });
                }
            }
            _ => drain(&mut field).await?,
        }
    }

    let draft = draft
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No data provided".into()))?;
    log::info!("{} is building a modpack", admin.username());
    let id = data.modpacks().build(&draft, logo).await?;
    Ok(web::Json(Created::new(id)))
}

#[get("/api/modpacks/{id}/download")]
pub async fn download(
    id: web::Path<String>,
    data: web::Data<AppData>,
) -> Result<HttpResponse, ApiError> {
    let archive = data.modpacks().record_download(&id).await?;
    let disposition = ContentDisposition::attachment(format!("{}.{}", id, ARCHIVE_EXTENSION));
    file_response(&archive, Some(disposition)).await
}

#[get("/api/modpacks/{id}/icon")]
pub async fn icon(id: web::Path<String>, data: web::Data<AppData>) -> Result<HttpResponse, ApiError> {
    let icon = data.modpacks().icon(&id).await?;
    file_response(&icon, None).await
}

#[delete("/api/modpacks/{id}")]
pub async fn delete(
    admin: Admin,
    id: web::Path<String>,
    data: web::Data<AppData>,
) -> Result<impl Responder, ApiError> {
    data.modpacks().delete(&id).await?;
    log::info!("{} deleted modpack {}", admin.username(), id);
    Ok(web::Json(Deleted { success: true }))
}

fn filename(field: &Field) -> Option<String> {
    field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_string)
}

async fn read_field(field: &mut Field, limit: u64) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if (bytes.len() + chunk.len()) as u64 > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "Upload exceeds the {} MB limit",
                limit / (1024 * 1024)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn drain(field: &mut Field) -> Result<(), ApiError> {
    while field.try_next().await?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::ZipArchive;

    use crate::config::Config;
    use crate::endpoints::configure;
    use crate::test_support::{modpack_fixture, png_bytes, write_file, zip_fixture};
    use crate::types::models::modpack::ModpackRecord;
    use crate::AppData;

    const BOUNDARY: &str = "----modpack-index-test";

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        body: &'a [u8],
    }

    fn multipart(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part.filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(part.body);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn content_type() -> (header::HeaderName, String) {
        (
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
    }

    fn auth(user: &str, pass: &str) -> (header::HeaderName, String) {
        let token = STANDARD.encode(format!("{}:{}", user, pass));
        (header::AUTHORIZATION, format!("Basic {}", token))
    }

    fn admin() -> (header::HeaderName, String) {
        auth("admin", "letmein")
    }

    fn app_data(dir: &TempDir, index_url: &str) -> AppData {
        let root = dir.path().join("modpacks").to_string_lossy().into_owned();
        let static_dir = dir.path().join("static").to_string_lossy().into_owned();
        let index_url = index_url.to_string();
        let config = Config::from_lookup(|key| match key {
            "ADMIN_PASSWORD" => Some("letmein".into()),
            "MODPACKS_DIR" => Some(root.clone()),
            "STATIC_DIR" => Some(static_dir.clone()),
            "MODRINTH_API_URL" => Some(index_url.clone()),
            "MAX_UPLOAD_MB" => Some("1".into()),
            _ => None,
        })
        .unwrap();
        AppData::new(&config).unwrap()
    }

    macro_rules! service {
        ($data:expr) => {
            test::init_service(
                App::new()
                    .app_data(actix_web::web::Data::new($data))
                    .configure(configure),
            )
            .await
        };
    }

    fn upload_request(archive: &[u8], filename: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/modpacks")
            .insert_header(content_type())
            .insert_header(admin())
            .set_payload(multipart(&[Part {
                name: "file",
                filename: Some(filename),
                body: archive,
            }]))
    }

    #[actix_web::test]
    async fn upload_then_list_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));

        let archive = modpack_fixture("skyblock", None);
        let resp = test::call_service(&app, upload_request(&archive, "skyblock.zip").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "success": true, "id": "skyblock" }));

        let list: Vec<ModpackRecord> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/modpacks").to_request(),
        )
        .await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].download_url, "/api/modpacks/skyblock/download");

        let record: ModpackRecord = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/modpacks/skyblock").to_request(),
        )
        .await;
        assert_eq!(record.mod_count, 2);
        assert_eq!(record.download_count, 0);
    }

    #[actix_web::test]
    async fn upload_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let archive = modpack_fixture("skyblock", None);

        let req = test::TestRequest::post()
            .uri("/api/modpacks")
            .insert_header(content_type())
            .set_payload(multipart(&[Part {
                name: "file",
                filename: Some("skyblock.zip"),
                body: &archive,
            }]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let req = upload_request(&archive, "skyblock.zip")
            .insert_header(auth("admin", "wrong"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn upload_intake_errors() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));

        let req = test::TestRequest::post()
            .uri("/api/modpacks")
            .insert_header(content_type())
            .insert_header(admin())
            .set_payload(multipart(&[Part {
                name: "other",
                filename: None,
                body: b"x",
            }]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No file provided");

        let resp = test::call_service(&app, upload_request(b"zip", "").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No file selected");

        let resp = test::call_service(&app, upload_request(b"zip", "pack.rar").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let no_manifest = zip_fixture(&[("mods/a.jar", &b"jar"[..])]);
        let resp =
            test::call_service(&app, upload_request(&no_manifest, "pack.zip").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No manifest.json found in modpack");
    }

    #[actix_web::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let big = vec![0u8; 1024 * 1024 + 1];

        let resp = test::call_service(&app, upload_request(&big, "big.zip").to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn download_streams_archive_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let archive = modpack_fixture("skyblock", None);
        test::call_service(&app, upload_request(&archive, "skyblock.zip").to_request()).await;

        for _ in 0..2 {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri("/api/modpacks/skyblock/download")
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
            let disposition = resp.headers().get(header::CONTENT_DISPOSITION).unwrap();
            assert!(disposition.to_str().unwrap().contains("skyblock.zip"));
            let body = test::read_body(resp).await;
            assert_eq!(body.as_ref(), archive.as_slice());
            assert!(ZipArchive::new(Cursor::new(body.to_vec())).is_ok());
        }

        let record: ModpackRecord = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/modpacks/skyblock").to_request(),
        )
        .await;
        assert_eq!(record.download_count, 2);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/modpacks/ghost/download").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn icon_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let default_icon = png_bytes();
        write_file(&dir.path().join("static"), "default-icon.png", &default_icon);
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/modpacks/unknown/icon").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
            "image/png"
        );
        assert_eq!(test::read_body(resp).await.as_ref(), default_icon.as_slice());
    }

    #[actix_web::test]
    async fn icon_without_default_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/modpacks/unknown/icon").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn serves_uploaded_icon() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let icon = png_bytes();
        let archive = modpack_fixture("skyblock", Some(&icon));
        test::call_service(&app, upload_request(&archive, "skyblock.zip").to_request()).await;

        let body = test::call_and_read_body(
            &app,
            test::TestRequest::get().uri("/api/modpacks/skyblock/icon").to_request(),
        )
        .await;
        assert_eq!(body.as_ref(), icon.as_slice());
    }

    #[actix_web::test]
    async fn delete_requires_admin_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let archive = modpack_fixture("skyblock", None);
        test::call_service(&app, upload_request(&archive, "skyblock.zip").to_request()).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri("/api/modpacks/skyblock").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::delete()
            .uri("/api/modpacks/skyblock")
            .insert_header(admin())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "success": true }));
        assert!(!dir.path().join("modpacks").join("skyblock").exists());

        let req = test::TestRequest::delete()
            .uri("/api/modpacks/skyblock")
            .insert_header(admin())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/modpacks/skyblock").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn create_builds_from_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version/v100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "v100",
                "project_id": "AANobbMI",
                "name": "Sodium 0.5.3",
                "version_number": "0.5.3",
                "game_versions": ["1.20.1"],
                "files": [{ "url": format!("{}/cdn/sodium.jar", server.uri()), "filename": "sodium.jar" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/sodium.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, &server.uri()));
        let draft = json!({
            "id": "speedy",
            "name": "Speedy",
            "version": "1.0.0",
            "mc_versions": ["1.20.1"],
            "author": "Me",
            "description": "Fast",
            "modloader": "fabric",
            "mods": [{ "id": "sodium", "version_id": "v100" }]
        })
        .to_string();
        let logo = png_bytes();

        let req = test::TestRequest::post()
            .uri("/api/modpacks/create")
            .insert_header(content_type())
            .insert_header(admin())
            .set_payload(multipart(&[
                Part {
                    name: "data",
                    filename: None,
                    body: draft.as_bytes(),
                },
                Part {
                    name: "logo",
                    filename: Some("logo.png"),
                    body: &logo,
                },
            ]))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "success": true, "id": "speedy" }));

        let record: ModpackRecord = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/modpacks/speedy").to_request(),
        )
        .await;
        assert_eq!(record.mod_count, 1);
        assert_eq!(record.modloader.as_deref(), Some("fabric"));
        assert_eq!(record.icon_url.as_deref(), Some("/api/modpacks/speedy/icon"));
    }

    #[actix_web::test]
    async fn create_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, "http://127.0.0.1:9"));
        let call = |parts: Vec<u8>| {
            test::TestRequest::post()
                .uri("/api/modpacks/create")
                .insert_header(content_type())
                .insert_header(admin())
                .set_payload(parts)
                .to_request()
        };

        let resp = test::call_service(
            &app,
            call(multipart(&[Part {
                name: "comment",
                filename: None,
                body: b"hello",
            }])),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No data provided");

        let empty_mods = json!({
            "id": "p", "name": "P", "version": "1", "mc_versions": [], "author": "a",
            "description": "d", "modloader": "forge", "mods": []
        })
        .to_string();
        let resp = test::call_service(
            &app,
            call(multipart(&[Part {
                name: "data",
                filename: None,
                body: empty_mods.as_bytes(),
            }])),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Modpack must contain at least one mod");
        assert!(!dir.path().join("modpacks").join("p").exists());
    }

    #[actix_web::test]
    async fn create_reports_failed_mod() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let app = service!(app_data(&dir, &server.uri()));
        let draft = json!({
            "id": "broken", "name": "Broken", "version": "1", "mc_versions": ["1.20.1"],
            "author": "a", "description": "d", "modloader": "fabric",
            "mods": [{ "id": "sodium" }]
        })
        .to_string();

        let req = test::TestRequest::post()
            .uri("/api/modpacks/create")
            .insert_header(content_type())
            .insert_header(admin())
            .set_payload(multipart(&[Part {
                name: "data",
                filename: None,
                body: draft.as_bytes(),
            }]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("sodium"));

        let list: Vec<ModpackRecord> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/modpacks").to_request(),
        )
        .await;
        assert!(list.is_empty());
    }
}
