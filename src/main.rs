use actix_web::{web, HttpServer};
use clap::Parser;
use rust_pdf_tools::app;
use rust_pdf_tools::config::Settings;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();
    if settings.debug_trace {
        tracing::warn!("debug traces are enabled; 500 responses will include internal details");
    }

    let (host, port) = settings.bind_addr();
    tracing::info!(
        %host,
        port,
        temp_root = %settings.temp_root.display(),
        max_upload_bytes = settings.max_upload_bytes,
        "starting server"
    );

    let data = web::Data::new(settings);
    HttpServer::new(move || app(data.clone()))
        .bind((host, port))?
        .run()
        .await
}
