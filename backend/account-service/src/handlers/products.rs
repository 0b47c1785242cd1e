use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::{
    error::AccountError,
    models::{ApiResponse, CreateProductRequest, PageParams, UpdateProductRequest},
    security::AuthenticatedUser,
    AppState,
};

pub async fn list(
    state: web::Data<AppState>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AccountError> {
    let page = state.products.list(&params).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "OK", page)))
}

pub async fn list_mine(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AccountError> {
    let page = state.products.list_mine(caller.id(), &params).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "OK", page)))
}

pub async fn get(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AccountError> {
    let product = state.products.get(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "OK", product)))
}

pub async fn create(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    payload: web::Json<CreateProductRequest>,
) -> Result<HttpResponse, AccountError> {
    let product = state
        .products
        .create(caller.id(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(201, "Product created", product)))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    id: web::Path<Uuid>,
    payload: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse, AccountError> {
    let product = state
        .products
        .update(caller.id(), id.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(200, "Product updated", product)))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, AccountError> {
    state.products.delete(caller.id(), id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message(200, "Product deleted")))
}
