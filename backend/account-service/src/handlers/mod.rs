//! HTTP surface. Handlers translate requests into service calls and wrap
//! results in the JSON envelope; errors render through `AccountError`.

pub mod account;
pub mod admin;
pub mod auth;
pub mod drive;
pub mod health;
pub mod products;

use crate::error::AccountError;
use actix_web::{web, HttpRequest};

/// Register every route on an actix app or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(health::health))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/verify-email/{code}", web::get().to(auth::verify_email))
                        .route(
                            "/resend-verification",
                            web::post().to(auth::resend_verification),
                        )
                        .route("/login", web::post().to(auth::login))
                        .route("/refresh", web::post().to(auth::refresh))
                        .route("/logout", web::post().to(auth::logout))
                        .route("/forgot-password", web::post().to(auth::forgot_password))
                        .route(
                            "/forgot-password/otp",
                            web::post().to(auth::verify_forgot_password_otp),
                        )
                        .route("/reset-password", web::post().to(auth::reset_password)),
                )
                .service(
                    web::scope("/account")
                        .route("/me", web::get().to(account::me))
                        .route("/profile", web::put().to(account::update_profile))
                        .route("/change-password", web::post().to(account::change_password))
                        .route("/delete/request", web::post().to(account::request_deletion))
                        .route("/delete/verify", web::post().to(account::verify_deletion))
                        .route("/delete/confirm", web::post().to(account::confirm_deletion)),
                )
                .service(
                    web::scope("/products")
                        .service(
                            web::resource("")
                                .route(web::get().to(products::list))
                                .route(web::post().to(products::create)),
                        )
                        .route("/mine", web::get().to(products::list_mine))
                        .service(
                            web::resource("/{id}")
                                .route(web::get().to(products::get))
                                .route(web::put().to(products::update))
                                .route(web::delete().to(products::delete)),
                        ),
                )
                .service(
                    web::scope("/drive")
                        .service(
                            web::resource("")
                                .route(web::get().to(drive::list))
                                .route(web::post().to(drive::create)),
                        )
                        .service(
                            web::resource("/{id}")
                                .route(web::patch().to(drive::rename))
                                .route(web::delete().to(drive::delete)),
                        ),
                )
                .service(
                    web::scope("/admin/users")
                        .route("", web::get().to(admin::list_users))
                        .route("/restore", web::post().to(admin::restore_user))
                        .route("/{id}", web::delete().to(admin::soft_delete_user))
                        .route(
                            "/{id}/permanent",
                            web::delete().to(admin::permanent_delete_user),
                        ),
                ),
        );
}

/// Malformed JSON bodies become 400s in the common envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| AccountError::BadRequest(err.to_string()).into())
}

/// Best-effort caller address for login bookkeeping
pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
}
