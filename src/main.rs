use backend_gateway::modules;
use backend_gateway::proxy;

#[tokio::main]
async fn main() -> Result<(), String> {
    modules::logger::init_logger();

    let mut config = match modules::config::load_gateway_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!("failed to load gateway config: {}. using defaults", err);
            let cfg = proxy::GatewayConfig::default();
            let _ = modules::config::save_gateway_config(&cfg);
            cfg
        }
    };

    let bind_address = modules::config::apply_env_overrides(&mut config)
        .unwrap_or_else(|| config.get_bind_address().to_string());

    let (server, handle) = proxy::GatewayServer::start(&bind_address, &config)
        .await
        .map_err(|e| format!("failed to start gateway server: {}", e))?;

    tracing::info!("backend-gateway listening on http://{}", server.local_addr());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {}", e))?;

    tracing::info!("shutdown requested, stopping server...");
    server.stop();
    let _ = handle.await;

    Ok(())
}
