use crate::auth::AuthService;
use crate::checkin::CheckinService;
use crate::config::Config;
use crate::errors::WorkshopError;
use crate::ledger::Ledger;
use crate::metrics;
use crate::models::{
    ChangeEmailRequest, ChangePasswordRequest, LoginRequest, RegisterRequest,
    UpdateProfileRequest,
};
use crate::security::AuthedUser;
use crate::user::UserService;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Uniform response envelope shared by every endpoint.
fn success<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "code": 200,
        "message": message,
        "data": data
    }))
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "workshop-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Client IP for per-IP registration limits: first X-Forwarded-For hop,
/// then X-Real-IP, then the peer address.
fn client_ip(req: &HttpRequest) -> Option<String> {
    let from_header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
            .map(str::to_string)
    };

    from_header("X-Forwarded-For")
        .or_else(|| from_header("X-Real-IP"))
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
}

// ---- auth ----

pub async fn register(
    service: web::Data<Arc<AuthService>>,
    request: web::Json<RegisterRequest>,
    http_request: HttpRequest,
) -> Result<HttpResponse, WorkshopError> {
    let ip = client_ip(&http_request);
    let response = service.register(request.into_inner(), ip).await?;
    metrics::REGISTRATIONS_TOTAL.inc();
    Ok(success("Registration successful", response))
}

pub async fn login(
    service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, WorkshopError> {
    let response = service.login(request.into_inner()).await?;
    metrics::LOGINS_TOTAL.inc();
    Ok(success("Login successful", response))
}

// ---- check-in ----

pub async fn checkin(
    service: web::Data<Arc<CheckinService>>,
    user: AuthedUser,
) -> Result<HttpResponse, WorkshopError> {
    let response = service.checkin(user.user_id).await?;
    metrics::CHECKINS_TOTAL.inc();
    metrics::CHECKIN_DROPS_TOTAL.inc_by(response.drops as u64);
    Ok(success("Checked in", response))
}

pub async fn checkin_status(
    service: web::Data<Arc<CheckinService>>,
    user: AuthedUser,
) -> Result<HttpResponse, WorkshopError> {
    let response = service.status(user.user_id).await?;
    Ok(success("OK", response))
}

// ---- profile ----

pub async fn get_profile(
    service: web::Data<Arc<UserService>>,
    user: AuthedUser,
) -> Result<HttpResponse, WorkshopError> {
    let profile = service.profile(user.user_id).await?;
    Ok(success("OK", profile))
}

pub async fn update_profile(
    service: web::Data<Arc<UserService>>,
    user: AuthedUser,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, WorkshopError> {
    let profile = service
        .update_profile(user.user_id, request.into_inner())
        .await?;
    Ok(success("Profile updated", profile))
}

pub async fn change_password(
    service: web::Data<Arc<UserService>>,
    user: AuthedUser,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, WorkshopError> {
    service
        .change_password(user.user_id, request.into_inner())
        .await?;
    Ok(success("Password changed", ()))
}

pub async fn change_email(
    service: web::Data<Arc<UserService>>,
    user: AuthedUser,
    request: web::Json<ChangeEmailRequest>,
) -> Result<HttpResponse, WorkshopError> {
    service
        .change_email(user.user_id, request.into_inner())
        .await?;
    Ok(success("Email changed", ()))
}

// ---- ledger ----

pub async fn get_ledger(
    ledger: web::Data<Arc<Ledger>>,
    user: AuthedUser,
) -> Result<HttpResponse, WorkshopError> {
    let entries = ledger.entries_for_user(user.user_id).await?;
    let reconciliation = ledger.reconcile(user.user_id).await?;

    Ok(success(
        "OK",
        json!({
            "entries": entries,
            "reconciliation": reconciliation
        }),
    ))
}

// ---- avatar ----

pub async fn upload_avatar(
    service: web::Data<Arc<UserService>>,
    config: web::Data<Config>,
    user: AuthedUser,
    mut payload: Multipart,
) -> Result<HttpResponse, WorkshopError> {
    let max_bytes = config.storage.max_avatar_bytes;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| WorkshopError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != "file" {
            continue;
        }

        let extension = field
            .content_disposition()
            .get_filename()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_string())
            .ok_or_else(|| {
                WorkshopError::Validation("Upload filename has no extension".to_string())
            })?;

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| WorkshopError::Validation(format!("Upload read failed: {}", e)))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(WorkshopError::Validation(format!(
                    "Avatar exceeds {} bytes",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let key = service.upload_avatar(user.user_id, &extension, bytes).await?;
        return Ok(success("Avatar uploaded", key));
    }

    Err(WorkshopError::Validation(
        "Missing 'file' field in upload".to_string(),
    ))
}

pub async fn get_avatar(
    service: web::Data<Arc<UserService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, WorkshopError> {
    let (bytes, content_type) = service.fetch_avatar(*user_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(("Cache-Control", "public, max-age=86400"))
        .body(bytes))
}

pub async fn remove_avatar(
    service: web::Data<Arc<UserService>>,
    user: AuthedUser,
) -> Result<HttpResponse, WorkshopError> {
    service.remove_avatar(user.user_id).await?;
    Ok(success("Avatar removed", ()))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "code": 500,
            "message": format!("Failed to gather metrics: {}", e),
            "data": null
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login)),
    )
    .service(
        web::scope("/checkin")
            .route("", web::post().to(checkin))
            .route("/status", web::get().to(checkin_status)),
    )
    .service(
        web::scope("/user")
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(update_profile))
            .route("/password", web::post().to(change_password))
            .route("/email", web::post().to(change_email))
            .route("/ledger", web::get().to(get_ledger))
            .route("/avatar", web::post().to(upload_avatar))
            .route("/avatar", web::delete().to(remove_avatar))
            .route("/avatar/{user_id}", web::get().to(get_avatar)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
