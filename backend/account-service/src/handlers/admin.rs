/// Staff-only user administration
use actix_web::{web, HttpResponse};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AccountError,
    middleware::StaffUser,
    models::{ApiResponse, PageParams, RestoreUserRequest, UserResponse},
    AppState,
};

pub async fn list_users(
    state: web::Data<AppState>,
    _staff: StaffUser,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AccountError> {
    let page = state.accounts.list_users(&params).await?;
    let page = page.map(|user| UserResponse::from(&user));
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "OK", page)))
}

pub async fn soft_delete_user(
    state: web::Data<AppState>,
    staff: StaffUser,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AccountError> {
    let id = id.into_inner();
    state.accounts.soft_delete_user(id).await?;
    info!(staff_id = %staff.0.id(), user_id = %id, "staff soft-deleted user");
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "User deleted")))
}

pub async fn restore_user(
    state: web::Data<AppState>,
    staff: StaffUser,
    payload: web::Json<RestoreUserRequest>,
) -> Result<HttpResponse, AccountError> {
    payload.validate()?;
    let user = state.accounts.restore_user(&payload.email).await?;
    info!(staff_id = %staff.0.id(), user_id = %user.id, "staff restored user");
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "User restored", UserResponse::from(&user))))
}

pub async fn permanent_delete_user(
    state: web::Data<AppState>,
    staff: StaffUser,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AccountError> {
    let id = id.into_inner();
    state.accounts.permanent_delete_user(id).await?;
    info!(staff_id = %staff.0.id(), user_id = %id, "staff permanently deleted user");
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "User permanently deleted")))
}
