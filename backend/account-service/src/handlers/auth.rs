/// Public authentication endpoints
use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::{
    error::AccountError,
    handlers::client_ip,
    models::{
        ApiResponse, EmailRequest, LoginRequest, RefreshRequest, ReferenceResponse,
        RegisterRequest, ResetPasswordRequest, TokenResponse, UserResponse, VerifyOtpRequest,
    },
    security::AuthenticatedUser,
    AppState,
};

pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AccountError> {
    let user = state.accounts.register(payload.into_inner()).await?;
    let message = format!(
        "We sent an email with a verification code to {}",
        user.email
    );

    Ok(HttpResponse::Created().json(ApiResponse::new(201, message, UserResponse::from(&user))))
}

pub async fn verify_email(
    state: web::Data<AppState>,
    code: web::Path<String>,
) -> Result<HttpResponse, AccountError> {
    state.accounts.verify_email(&code).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Email verified successfully")))
}

pub async fn resend_verification(
    state: web::Data<AppState>,
    payload: web::Json<EmailRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    state.accounts.resend_verification(&payload.email).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(
        200,
        "A new verification email has been sent",
    )))
}

pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    let (_, pair) = state
        .accounts
        .login(&payload.identity, &payload.password, client_ip(&req))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        "Logged in successfully",
        TokenResponse::from(pair),
    )))
}

pub async fn refresh(
    state: web::Data<AppState>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    let pair = state.accounts.refresh(&payload.refresh_token).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        "Token refreshed",
        TokenResponse::from(pair),
    )))
}

pub async fn logout(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<HttpResponse, AccountError> {
    state.accounts.logout(&caller).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Logged out successfully")))
}

pub async fn forgot_password(
    state: web::Data<AppState>,
    payload: web::Json<EmailRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    state.accounts.forgot_password(&payload.email).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(
        200,
        "We sent an OTP code to your email",
    )))
}

pub async fn verify_forgot_password_otp(
    state: web::Data<AppState>,
    payload: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    let reference_no = state.accounts.verify_reset_otp(&payload.otp).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        "OTP verified",
        ReferenceResponse { reference_no },
    )))
}

pub async fn reset_password(
    state: web::Data<AppState>,
    payload: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AccountError> {
    state.accounts.reset_password(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Password has been reset")))
}
