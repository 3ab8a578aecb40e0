/// Authentication Routes
///
/// HTTP surface of the session lifecycle: register, login, refresh, logout
/// and the current user. Access tokens travel in JSON bodies; the refresh
/// token only in the refresh cookie.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, SessionService};
use crate::cookies::RefreshCookie;
use crate::error::{AppError, ErrorContext};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: Invalid email, weak password or mismatched confirmation
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let registered = sessions
        .register(&form.email, &form.password, form.confirm_password.as_deref())
        .await
        .inspect_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Created()
        .cookie(cookie.issue(&registered.tokens.refresh_token))
        .json(SessionResponse {
            message: "User registered successfully".to_string(),
            access_token: registered.tokens.access_token,
            token_type: "Bearer".to_string(),
        }))
}

/// POST /auth/login
///
/// Same 401 for an unknown email and a wrong password.
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let logged_in = sessions
        .login(&form.email, &form.password)
        .await
        .inspect_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Ok()
        .cookie(cookie.issue(&logged_in.tokens.refresh_token))
        .json(SessionResponse {
            message: "Login successful".to_string(),
            access_token: logged_in.tokens.access_token,
            token_type: "Bearer".to_string(),
        }))
}

/// POST /auth/refresh
///
/// Reads the refresh cookie and returns a new access token. The cookie is
/// left untouched.
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let refresh_token = cookie.read(&req);

    let refreshed = sessions
        .refresh(refresh_token.as_deref())
        .await
        .inspect_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token: refreshed.access_token,
        token_type: "Bearer".to_string(),
    }))
}

/// POST /auth/logout
///
/// **Requires a valid access token**; revokes the refresh cookie's token and
/// clears the cookie.
pub async fn logout(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout").with_user_id(claims.sub.clone());
    let refresh_token = cookie.read(&req);

    sessions
        .logout(&claims, refresh_token.as_deref())
        .await
        .inspect_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Ok()
        .cookie(cookie.clear())
        .json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }))
}

/// GET /auth/me
///
/// **Requires a valid access token**
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let profile = sessions.current_user(&claims).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: profile.id.to_string(),
        email: profile.email,
        created_at: profile.created_at.to_rfc3339(),
    }))
}
