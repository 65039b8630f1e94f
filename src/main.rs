use geoscope_relay::create_app_router;
use geoscope_relay::init::app_init;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting geoscope relay...");
    let (config, state) = app_init().await?;
    log::info!("✅ Application state initialized");
    let app = create_app_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("");
    log::info!("🎉 Server started!");
    log::info!("📍 http://{}", addr);
    log::info!("🌍 Ask: http://{}/api/ask-mistral", addr);
    log::info!("❤️  Health: http://{}/health", addr);
    log::info!("");
    log::info!("🧠 Model: {}", config.inference.model);
    log::info!("💾 S3: {}", config.s3.bucket);
    if let Some(ep) = &config.s3.endpoint {
        log::info!("🔌 Endpoint: {}", ep);
    }
    log::info!("🔗 CDN: {}", config.s3.public_url_base);
    log::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
