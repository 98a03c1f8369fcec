pub mod models {
    pub mod mill;
}

pub mod client;
pub mod config;
pub mod response;
pub mod store;
pub mod transport;

use crate::client::MillClient;
use crate::config::Config;
use log::{error, info};
use std::thread;
use std::time::Instant;

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (timeout={}s, poll_interval={}s)",
        cfg.request_timeout.as_secs(),
        cfg.poll_interval.as_secs()
    );

    // 2) Authenticate
    let mut client = MillClient::with_timeout(
        cfg.access_key,
        cfg.secret_token,
        cfg.username,
        cfg.password,
        cfg.request_timeout,
    );
    client
        .connect()
        .map_err(|e| format!("Mill authentication failed: {}", e))?;
    info!("Authenticated to Mill API");

    // 3) Discover homes and rooms
    let homes = client.home_list().map_err(|e| format!("home list failed: {}", e))?;
    if homes.is_empty() {
        return Err("No homes found; ensure the account has homes".into());
    }
    info!("Discovered {} home(s)", homes.len());

    client.sync_rooms().map_err(|e| format!("room sync failed: {}", e))?;
    info!("Synced {} room(s)", client.store().rooms().len());

    // 4) Heater read loop (steady cadence; remote fetches stay throttled)
    loop {
        let tick_start = Instant::now();

        match client.throttled_sync_heaters() {
            Ok(()) => {
                for heater in client.store().heaters().values() {
                    info!(
                        "heater {} ({}): current={} status={}",
                        heater.device_id,
                        heater.name.as_deref().unwrap_or("-"),
                        heater
                            .current_temp
                            .map(|t| format!("{:.1}", t))
                            .unwrap_or_else(|| "-".to_string()),
                        heater.device_status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
            Err(e) => error!("heater sync failed: {}", e),
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < cfg.poll_interval {
            thread::sleep(cfg.poll_interval - elapsed);
        }
    }
}

fn main() {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    info!(
        "millheat {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
