use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ax = scholar_portal::build().await?;

    let host = ax.app.get("http.host").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = ax.app.get("http.port").unwrap_or_else(|| "3036".to_string());
    let addr = format!("{host}:{port}");

    tracing::info!(%addr, "starting scholar portal");

    let scope = ax.scope.clone();
    let served = ax.listen(addr).await;
    scope.shutdown();
    served
}
