use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::{PasswordHasher, SessionManager, SessionValidator, TokenIssuer, TokenVerifier};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::AppError;
use crate::media::MediaStore;
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{
    change_password, channel_profile, current_user, health_check, login, logout, record_watch,
    refresh_token, register, toggle_subscription, update_account, update_avatar,
    update_cover_image, watch_history,
};
use crate::store::UserStore;
use crate::uploads::StagingArea;

/// Services shared by every worker
#[derive(Clone)]
pub struct AppComponents {
    pub sessions: SessionManager,
    pub validator: SessionValidator,
    pub accounts: AccountService,
    pub staging: StagingArea,
}

impl AppComponents {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        media: Arc<dyn MediaStore>,
        staging: StagingArea,
        jwt: &JwtSettings,
    ) -> Self {
        let verifier = TokenVerifier::new(jwt);
        Self {
            sessions: SessionManager::new(
                store.clone(),
                hasher.clone(),
                TokenIssuer::new(jwt),
                verifier.clone(),
                jwt.revoke_on_password_change,
            ),
            validator: SessionValidator::new(verifier, store.clone()),
            accounts: AccountService::new(store, hasher, media),
            staging,
        }
    }
}

pub fn run(
    listener: TcpListener,
    components: AppComponents,
    application: ApplicationSettings,
) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(components.sessions);
    let accounts = web::Data::new(components.accounts);
    let staging = web::Data::new(components.staging);
    let application = web::Data::new(application);
    let validator = components.validator;

    let server = HttpServer::new(move || {
        // Malformed bodies and path segments are client input errors
        let json_config = web::JsonConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into());
        let path_config = web::PathConfig::default()
            .error_handler(|err, _req| AppError::invalid(err.to_string()).into());

        App::new()
            .wrap(LoggerMiddleware)
            .app_data(json_config)
            .app_data(path_config)
            .app_data(sessions.clone())
            .app_data(accounts.clone())
            .app_data(staging.clone())
            .app_data(application.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/users")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/refresh-token", web::post().to(refresh_token))
                            .service(
                                web::scope("")
                                    .wrap(JwtMiddleware::new(validator.clone()))
                                    .route("/logout", web::post().to(logout))
                                    .route("/change-password", web::post().to(change_password))
                                    .route("/current-user", web::get().to(current_user))
                                    .route("/update-account", web::patch().to(update_account))
                                    .route("/avatar", web::patch().to(update_avatar))
                                    .route("/cover-image", web::patch().to(update_cover_image))
                                    .route("/c/{username}", web::get().to(channel_profile))
                                    .route("/history", web::get().to(watch_history))
                                    .route("/history/{video_id}", web::post().to(record_watch)),
                            ),
                    )
                    .service(
                        web::scope("/subscriptions")
                            .wrap(JwtMiddleware::new(validator.clone()))
                            .route("/c/{channel_id}", web::post().to(toggle_subscription)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
