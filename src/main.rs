use std::sync::Arc;

use tracing::{error, info, warn};

use usps_box_packer::api::{self, ApiState};
use usps_box_packer::config::AppConfig;
use usps_box_packer::logging;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();
    logging::init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let catalogs = Arc::new(app_config.catalogs.load());
    let state = ApiState::new(
        app_config.optimizer.clone(),
        app_config.rates.clone(),
        catalogs.clone(),
        catalogs,
    );

    info!("🚀 Packing service starting...");
    if let Err(err) = api::start_api_server(app_config.api.clone(), state).await {
        error!("❌ Server stopped: {}", err);
        std::process::exit(1);
    }
}
