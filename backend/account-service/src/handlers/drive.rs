use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::{
    error::AccountError,
    models::{ApiResponse, CreateDriveFileRequest, PageParams, RenameDriveFileRequest},
    security::AuthenticatedUser,
    AppState,
};

pub async fn list(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AccountError> {
    let page = state.drive.list(caller.id(), &params).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "OK", page)))
}

pub async fn create(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<CreateDriveFileRequest>,
) -> Result<HttpResponse, AccountError> {
    let file = state.drive.create(caller.id(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(201, "File created", file)))
}

pub async fn rename(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    id: web::Path<Uuid>,
    payload: web::Json<RenameDriveFileRequest>,
) -> Result<HttpResponse, AccountError> {
    let file = state
        .drive
        .rename(caller.id(), id.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "File renamed", file)))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AccountError> {
    state.drive.delete(caller.id(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "File deleted")))
}
