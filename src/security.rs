//! JWT issuance and verification middleware.
//!
//! Tokens carry (user id, username, role) and are opaque to everything
//! downstream of this module; handlers receive the identity through the
//! `AuthedUser` extractor.

use crate::errors::WorkshopError;
use crate::models::User;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: usize,
}

/// Create a bearer token for an authenticated user.
pub fn issue_token(secret: &str, expiry_hours: i64, user: &User) -> crate::errors::Result<String> {
    let expiry = Utc::now() + Duration::hours(expiry_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role.as_str().to_string(),
        exp: expiry.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| WorkshopError::Internal(format!("Failed to issue token: {}", e)))
}

/// Identity of the caller, populated by `JwtAuth` from validated claims.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: i64,
    pub username: String,
    pub role: String,
}

impl FromRequest for AuthedUser {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();

        ready(match claims {
            Some(claims) => match claims.sub.parse::<i64>() {
                Ok(user_id) => Ok(AuthedUser {
                    user_id,
                    username: claims.username,
                    role: claims.role,
                }),
                Err(_) => Err(actix_web::error::ErrorUnauthorized("Malformed token subject")),
            },
            None => Err(actix_web::error::ErrorUnauthorized("Not authenticated")),
        })
    }
}

/// Paths served without a token.
fn is_public(req: &ServiceRequest) -> bool {
    let path = req.path();

    req.method() == actix_web::http::Method::OPTIONS
        || path == "/health"
        || path == "/metrics"
        || path.starts_with("/auth/")
        || (req.method() == actix_web::http::Method::GET && path.starts_with("/user/avatar/"))
}

pub struct JwtAuth {
    secret: String,
}

impl JwtAuth {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(&req) {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await });
        }

        let auth_header = req.headers().get("Authorization");

        let token = match auth_header {
            Some(value) => {
                let auth_str = value.to_str().unwrap_or("");
                if let Some(token) = auth_str.strip_prefix("Bearer ") {
                    token.to_string()
                } else {
                    return Box::pin(async {
                        Err(actix_web::error::ErrorUnauthorized(
                            "Invalid auth header format",
                        ))
                    });
                }
            }
            None => {
                return Box::pin(async {
                    Err(actix_web::error::ErrorUnauthorized(
                        "Missing Authorization header",
                    ))
                });
            }
        };

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(
            &token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => {
                req.extensions_mut().insert(token_data.claims);

                let fut = self.service.call(req);
                Box::pin(async move { fut.await })
            }
            Err(err) => {
                tracing::warn!("JWT validation failed: {:?}", err);
                Box::pin(async {
                    Err(actix_web::error::ErrorUnauthorized(
                        "Invalid or expired token",
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};

    fn sample_user() -> User {
        User {
            id: 42,
            username: "spelunker".to_string(),
            nickname: "Spelunker".to_string(),
            email: "spelunker@example.com".to_string(),
            password_hash: String::new(),
            avatar: None,
            bio: None,
            role: UserRole::User,
            level: 1,
            lightning: 0,
            drops: 0,
            invite_code: "ABCD1234".to_string(),
            inviter_id: None,
            status: UserStatus::Active,
            ban_reason: None,
            registration_ip: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let secret = "0123456789abcdef0123456789abcdef";
        let token = issue_token(secret, 24, &sample_user()).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.username, "spelunker");
        assert_eq!(decoded.claims.role, "USER");
    }

    #[actix_web::test]
    async fn test_public_path_with_trailing_slash_passes_auth() {
        use actix_web::{middleware::NormalizePath, test, web, App, HttpResponse};

        // Same middleware order as the server: NormalizePath registered
        // after JwtAuth, so it trims the path before the public check.
        let app = test::init_service(
            App::new()
                .wrap(JwtAuth::new("0123456789abcdef0123456789abcdef".to_string()))
                .wrap(NormalizePath::trim())
                .route(
                    "/health",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let request = test::TestRequest::get().uri("/health/").to_request();
        let response = test::call_service(&app, request).await;
        assert!(response.status().is_success());
    }

    #[actix_web::test]
    async fn test_protected_path_without_token_rejected() {
        use actix_web::{middleware::NormalizePath, test, web, App, HttpResponse};

        let app = test::init_service(
            App::new()
                .wrap(JwtAuth::new("0123456789abcdef0123456789abcdef".to_string()))
                .wrap(NormalizePath::trim())
                .route(
                    "/user/profile",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let request = test::TestRequest::get().uri("/user/profile").to_request();
        let result = test::try_call_service(&app, request).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("0123456789abcdef0123456789abcdef", 24, &sample_user()).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"another-secret-another-secret-32"),
            &Validation::new(Algorithm::HS256),
        );

        assert!(result.is_err());
    }
}
