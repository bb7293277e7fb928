//! SketchSync relay server binary.

use sketchsync_server::{ServerConfig, serve};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchsync_server=info,tower_http=info".into()),
        )
        .init();

    serve(ServerConfig::from_env()).await
}
