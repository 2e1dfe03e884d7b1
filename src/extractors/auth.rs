use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, FromRequest, HttpRequest};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::{ready, Ready};
use ring::hmac;
use ring::rand::SystemRandom;

use crate::config::{AdminCredentials, AppData};
use crate::endpoints::ApiError;

/// Proof that the request carried the admin's HTTP basic credentials.
#[derive(Debug)]
pub struct Admin {
    username: String,
}

impl Admin {
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl FromRequest for Admin {
    type Error = ApiError;
    type Future = Ready<Result<Admin, ApiError>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<AppData>>() {
            Some(data) => authenticate(req.headers(), data.admin()),
            None => {
                log::error!("Application data missing while authenticating");
                Err(ApiError::InternalError("Server misconfigured".into()))
            }
        };
        ready(result)
    }
}

fn authenticate(headers: &HeaderMap, admin: &AdminCredentials) -> Result<Admin, ApiError> {
    let (username, password) = parse_basic(headers).ok_or(ApiError::Unauthorized)?;

    let key = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new()).map_err(|_| {
        log::error!("Failed to generate a credential comparison key");
        ApiError::InternalError("Failed to check credentials".into())
    })?;

    // `&` so both comparisons always run.
    let user_ok = same_secret(&key, &username, admin.username());
    let pass_ok = same_secret(&key, &password, admin.password());
    if user_ok & pass_ok {
        Ok(Admin { username })
    } else {
        log::warn!("Rejected admin credentials for user '{}'", username);
        Err(ApiError::Unauthorized)
    }
}

// Constant-time, and independent of where the inputs first differ.
fn same_secret(key: &hmac::Key, given: &str, expected: &str) -> bool {
    let tag = hmac::sign(key, expected.as_bytes());
    hmac::verify(key, given.as_bytes(), tag.as_ref()).is_ok()
}

fn parse_basic(map: &HeaderMap) -> Option<(String, String)> {
    let value = map.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
