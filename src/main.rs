use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};

use sweet_shop::auth::AuthService;
use sweet_shop::config::Config;
use sweet_shop::state::AppState;
use sweet_shop::storage::Storage;
use sweet_shop::store::{MemoryStore, MongoStore, Store};
use sweet_shop::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok(); // Load environment variables from .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let database = db::connect(url, &config.database_name)
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            Arc::new(MongoStore::new(&database))
        }
        None => {
            log::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let storage = Storage::new(&config.storage_dir, config.public_url.clone());
    let auth = AuthService::new(config.jwt_secret.clone(), config.token_ttl_hours);
    let state = web::Data::new(AppState::new(store, storage, auth));

    log::info!("sweet shop listening on {}", config.bind_addr);
    HttpServer::new(move || {
        let auth = state.auth.clone();
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone()) // Share the store, hub and storage with handlers
            .configure(|cfg| routes::configure(cfg, auth))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
