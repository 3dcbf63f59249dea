use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::modules::auth::{
    interface::{AuthError, AuthUser, LoginResult},
    schema::{
        ApiResponse, Enable2faResponse, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RegisterRequest, ResetPasswordRequest, TokenResponse, UserEnvelope, UserResponse,
        Verify2faRequest, VerifyEmailQuery,
    },
};
use crate::services::session::REFRESH_TOKEN_DAYS;
use crate::services::validation::ValidatedJson;
use crate::AppState;

pub const REFRESH_COOKIE: &str = "refreshToken";

fn refresh_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(cookie::time::Duration::days(REFRESH_TOKEN_DAYS))
        .build()
}

fn expired_refresh_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, "")).path("/").build()
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserEnvelope>>), AuthError> {
    let user = state.auth.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::data(UserEnvelope {
                user: UserResponse::from(&user),
            })
            .with_message("Registration successful. Please check your email to verify your account."),
        ),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Response, AuthError> {
    let grant = match state.auth.login(&req).await? {
        LoginResult::Success(grant) => grant,
        LoginResult::Requires2fa => return Err(AuthError::TwoFactorRequired),
    };

    let jar = jar.add(refresh_cookie(grant.refresh_token, state.cookie_secure));
    let body = ApiResponse::data(LoginResponse {
        token: grant.access_token,
        expires_in: grant.expires_in,
        user: UserResponse::from(&grant.user),
    });

    Ok((jar, Json(body)).into_response())
}

pub async fn refresh_token(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let Some(presented) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        return AuthError::NoToken.into_response();
    };

    match state.auth.refresh(&presented).await {
        Ok(pair) => {
            let jar = jar.add(refresh_cookie(pair.refresh_token, state.cookie_secure));
            let body = ApiResponse::data(TokenResponse {
                token: pair.access_token,
                expires_in: pair.expires_in,
            });
            (jar, Json(body)).into_response()
        }
        Err(e) => (jar.remove(expired_refresh_cookie()), e).into_response(),
    }
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<()>>), AuthError> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    state.auth.logout(presented.as_deref()).await?;

    Ok((
        jar.remove(expired_refresh_cookie()),
        Json(ApiResponse::message("Logged out successfully")),
    ))
}

pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    let token = query.token.unwrap_or_default();
    state.auth.verify_email(&token).await?;
    Ok(Json(ApiResponse::message("Email verified successfully")))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(ApiResponse::message(
        "If an account exists with that email, a password reset link has been sent.",
    )))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.auth.reset_password(&req.token, &req.new_password).await?;
    Ok(Json(ApiResponse::message("Password has been reset successfully")))
}

pub async fn enable_2fa(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Enable2faResponse>>, AuthError> {
    let enrollment = state.auth.enable_2fa(&user).await?;

    Ok(Json(
        ApiResponse::data(Enable2faResponse {
            secret: enrollment.secret,
            qr_code: enrollment.qr_code,
            otpauth_url: enrollment.otpauth_url,
        })
        .with_message("Scan the QR code, then confirm with a code to finish enabling 2FA"),
    ))
}

pub async fn verify_2fa(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<Verify2faRequest>,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.auth.verify_2fa(&user, &req.token).await?;
    Ok(Json(ApiResponse::message("2FA enabled successfully")))
}

pub async fn disable_2fa(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.auth.disable_2fa(&user).await?;
    Ok(Json(ApiResponse::message("2FA disabled successfully")))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserEnvelope>>, AuthError> {
    let user = state.auth.current_user(&user).await?;
    Ok(Json(ApiResponse::data(UserEnvelope {
        user: UserResponse::from(&user),
    })))
}
