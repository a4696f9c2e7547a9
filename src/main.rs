use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use workshop_backend::{
    auth::AuthService,
    checkin::CheckinService,
    config::Config,
    database::Database,
    handlers,
    ledger::Ledger,
    security::JwtAuth,
    storage::{BlobStore, FsBlobStore},
    system_config::SystemConfigService,
    user::UserService,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Starting workshop backend on port {}", config.server.port);

    let db = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to database")?,
    );

    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.storage.root));

    let system_config = Arc::new(SystemConfigService::new(db.clone()));
    let ledger = Arc::new(Ledger::new(db.clone()));
    let auth_service = Arc::new(AuthService::new(
        db.clone(),
        system_config.clone(),
        config.jwt.secret.clone(),
        config.jwt.expiry_hours,
    ));
    let checkin_service = Arc::new(CheckinService::new(db.clone(), system_config.clone()));
    let user_service = Arc::new(UserService::new(
        db.clone(),
        system_config.clone(),
        blobs.clone(),
    ));

    let jwt_secret = config.jwt.secret.clone();
    let server_config = config.clone();

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(JwtAuth::new(jwt_secret.clone()))
            // Registered after JwtAuth so it runs first: trailing slashes
            // are trimmed before the public-path check sees the path.
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(server_config.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(checkin_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(ledger.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))
    .context("Failed to bind server address")?
    .run()
    .await?;

    Ok(())
}
