/// Endpoints acting on the caller's own account
use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::{
    error::AccountError,
    models::{
        ApiResponse, ChangePasswordRequest, ConfirmDeletionRequest, ReferenceResponse,
        UpdateProfileRequest, UserResponse, VerifyOtpRequest,
    },
    security::AuthenticatedUser,
    AppState,
};

pub async fn me(caller: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::new(200, "OK", UserResponse::from(&caller.user)))
}

pub async fn update_profile(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AccountError> {
    let user = state
        .accounts
        .update_profile(&caller.user, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "Profile updated", UserResponse::from(&user))))
}

pub async fn change_password(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AccountError> {
    state
        .accounts
        .change_password(&caller.user, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Password changed successfully")))
}

pub async fn request_deletion(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
) -> Result<HttpResponse, AccountError> {
    state.accounts.request_account_deletion(&caller.user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(
        200,
        "We sent an OTP code to your email",
    )))
}

pub async fn verify_deletion(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    let reference_no = state.accounts.verify_deletion_otp(&caller.user, &payload.otp).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        200,
        "OTP verified",
        ReferenceResponse { reference_no },
    )))
}

pub async fn confirm_deletion(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<ConfirmDeletionRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    state
        .accounts
        .delete_account(&caller, &payload.reference_no)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Your account has been deleted")))
}
