use axum::serve;
use doc_crud_rust::api::handlers::ApiContext;
use doc_crud_rust::api::routes::create_router;
use doc_crud_rust::config::AppConfig;
use doc_crud_rust::store::MemoryStore;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!(
        "configuration loaded: server={} env={:?}",
        config.server_address(),
        config.env
    );

    let store = MemoryStore::new();
    let state = Arc::new(ApiContext {
        store,
        env: config.env,
    });
    let app = create_router().with_state(state);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("doc-crud server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
