//! Registration, login and cookie sessions.
//!
//! Sessions are stateless: the `__session` cookie carries
//! `base64url(user_id|issued_at)` followed by a hex HMAC-SHA256 of that
//! payload, keyed with the configured session secret.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::validation::validate_registration;
use crate::config::AuthConfig;
use crate::db::{LoginRequest, RegisterRequest, User, UserResponse};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "__session";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
/// Clock skew tolerated for cookies issued "in the future"
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn session_mac(secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

/// Signed cookie value for a user session issued at `issued_at` (unix seconds)
pub fn sign_session(secret: &str, user_id: &str, issued_at: i64) -> Option<String> {
    let payload = URL_SAFE_NO_PAD.encode(format!("{}|{}", user_id, issued_at));
    let mut mac = session_mac(secret)?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Some(format!("{}.{}", payload, signature))
}

/// User id carried by a cookie value, if the signature matches and the
/// session has not expired at `now`
pub fn verify_session(secret: &str, value: &str, ttl_days: i64, now: i64) -> Option<String> {
    let (payload, signature) = value.split_once('.')?;
    let signature = hex::decode(signature).ok()?;

    let mut mac = session_mac(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).ok()?;

    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
    let (user_id, issued_at) = decoded.rsplit_once('|')?;
    let issued_at: i64 = issued_at.parse().ok()?;

    if issued_at > now + MAX_CLOCK_SKEW_SECS {
        return None;
    }
    if now - issued_at > ttl_days * SECONDS_PER_DAY {
        return None;
    }
    Some(user_id.to_string())
}

/// Session cookie for a freshly authenticated user
pub fn session_cookie(config: &AuthConfig, user_id: &str) -> Result<Cookie<'static>, ApiError> {
    let value = sign_session(&config.session_secret, user_id, chrono::Utc::now().timestamp())
        .ok_or_else(|| ApiError::internal("Failed to sign session"))?;

    Ok(Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .build())
}

/// Cookie jar with the session cookie removed
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Resolve the session user from the request cookies
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Result<Option<User>, sqlx::Error> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some(user_id) = verify_session(
        &state.config.auth.session_secret,
        cookie.value(),
        state.config.auth.session_ttl_days,
        chrono::Utc::now().timestamp(),
    ) else {
        return Ok(None);
    };
    User::find_by_id(&state.db, &user_id).await
}

/// Validate and store a new account
pub async fn register_user(state: &AppState, req: &RegisterRequest) -> Result<User, ApiError> {
    validate_registration(req).map_err(ApiError::bad_request)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::conflict("User with this email already exists"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let user = User::create(&state.db, &req.name, &req.email, &password_hash)
        .await
        .map_err(|e| match ApiError::from(e) {
            err if err.status() == StatusCode::CONFLICT => {
                ApiError::conflict("User with this email already exists")
            }
            err => err,
        })?;

    info!(user_id = %user.id, "Registered new user");
    Ok(user)
}

/// Check credentials; every failure reads the same
pub async fn authenticate(state: &AppState, req: &LoginRequest) -> Result<User, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid credentials");

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(invalid());
    }
    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }
    Ok(user)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(CookieJar, (StatusCode, Json<UserResponse>)), ApiError> {
    let user = register_user(&state, &req).await?;
    let cookie = session_cookie(&state.config.auth, &user.id)?;
    Ok((jar.add(cookie), (StatusCode::CREATED, Json(user.into()))))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let user = authenticate(&state, &req).await?;
    let cookie = session_cookie(&state.config.auth, &user.id)?;
    Ok((jar.add(cookie), Json(user.into())))
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (clear_session(jar), StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(user.into())
}

/// Rejects API requests without a valid session and hands the user to
/// handlers through request extensions
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(request.headers());
    let user = current_user(&state, &jar)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for the authenticated user of an API request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(user.clone());
        }
        let jar = CookieJar::from_headers(&parts.headers);
        current_user(state, &jar)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_session_round_trip() {
        let value = sign_session(SECRET, "user-1", 1_000).unwrap();
        assert_eq!(
            verify_session(SECRET, &value, 7, 1_000 + 3_600).as_deref(),
            Some("user-1")
        );
    }

    #[test]
    fn test_session_rejects_tampering() {
        let value = sign_session(SECRET, "user-1", 1_000).unwrap();
        let (_, signature) = value.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode("user-2|1000");
        let forged = format!("{}.{}", forged_payload, signature);

        assert!(verify_session(SECRET, &forged, 7, 1_000).is_none());
        assert!(verify_session("other-secret", &value, 7, 1_000).is_none());
        assert!(verify_session(SECRET, "garbage", 7, 1_000).is_none());
        assert!(verify_session(SECRET, "abc.zz", 7, 1_000).is_none());
    }

    #[test]
    fn test_session_expiry() {
        let value = sign_session(SECRET, "user-1", 0).unwrap();
        assert!(verify_session(SECRET, &value, 7, 7 * SECONDS_PER_DAY).is_some());
        assert!(verify_session(SECRET, &value, 7, 7 * SECONDS_PER_DAY + 1).is_none());
        // Issued well in the future
        assert!(verify_session(SECRET, &value, 7, -3_600).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = AuthConfig {
            session_secret: SECRET.to_string(),
            session_ttl_days: 7,
            secure_cookies: true,
        };
        let cookie = session_cookie(&config, "user-1").unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
    }
}
