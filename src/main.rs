use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use videotube::auth::BcryptHasher;
use videotube::configuration::get_configuration;
use videotube::media::HttpMediaStore;
use videotube::startup::{run, AppComponents};
use videotube::store::PgUserStore;
use videotube::telemetry::init_telemetry;
use videotube::uploads::StagingArea;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
        })?;
    tracing::info!("Database ready");

    let media = HttpMediaStore::new(&configuration.media).map_err(|e| {
        tracing::error!("Failed to set up media client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Media client error")
    })?;

    let components = AppComponents::new(
        Arc::new(PgUserStore::new(pool)),
        Arc::new(BcryptHasher::new(configuration.password.bcrypt_cost)),
        Arc::new(media),
        StagingArea::new(&configuration.media),
        &configuration.jwt,
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, components, configuration.application)?.await
}
