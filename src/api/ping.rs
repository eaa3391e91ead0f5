/// Liveness check used by deployment scripts
pub async fn handle_ping() -> &'static str {
    "success"
}

pub async fn handle_root() -> &'static str {
    "Hello from pagesnap!"
}
