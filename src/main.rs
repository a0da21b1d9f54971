mod catalog;
mod config;
mod executor;
mod http;
mod ip;
mod sync;
mod template;
mod util;

use std::fs;
use std::process::ExitCode;

use catalog::ProviderCatalog;
use config::Config;
use executor::UpdateOutcome;
use ip::SystemResolver;
use sync::Synchronizer;

const CONFIG_PATHS: [&str; 2] = [
    "./ddns-sync.toml",
    #[cfg(target_family = "unix")]
    "/etc/ddns-sync/config.toml",
];

fn read_config(explicit: Option<&str>) -> Option<String> {
    if let Some(path) = explicit {
        return match fs::read_to_string(path) {
            Ok(s) => Some(s),
            Err(e) => {
                log::error!("unable to read config file {}: {}", path, e);
                None
            }
        };
    }

    CONFIG_PATHS
        .iter()
        .find_map(|path| fs::read_to_string(path).ok())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Scheduling is the caller's job (cron, a systemd timer); one process
    // invocation is exactly one synchronization pass per host entry.
    let explicit_path = std::env::args().nth(1);
    let config_str = match read_config(explicit_path.as_deref()) {
        Some(s) => s,
        None => {
            log::error!("no configuration found (searched {:?})", CONFIG_PATHS);
            return ExitCode::FAILURE;
        }
    };

    let config = match toml::from_str::<Config>(&config_str) {
        Ok(config) => config,
        Err(e) => {
            log::error!("unable to parse configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }

    let catalog = match ProviderCatalog::from_config(&config.provider) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.host.is_empty() {
        log::warn!("no [host.*] entries configured, nothing to do");
        return ExitCode::SUCCESS;
    }

    log::debug!(
        "{} provider definition(s) loaded: {}",
        catalog.len(),
        catalog.names().collect::<Vec<_>>().join(", ")
    );

    let settings = config.general.http_settings();
    let resolver = SystemResolver::new(config.general.ip_echo_url.clone(), settings.clone());
    let synchronizer = Synchronizer::new(&catalog, resolver, settings);

    let mut failed = false;
    for (name, target) in &config.host {
        match synchronizer.sync(target) {
            Ok(UpdateOutcome::NoChangeNeeded) => {
                log::info!("[host.{}] {}: no change needed", name, target.fqdn())
            }
            Ok(UpdateOutcome::Updated(ip)) => {
                log::info!("[host.{}] {}: updated to {}", name, target.fqdn(), ip)
            }
            Ok(UpdateOutcome::Failed(reason)) => {
                log::error!("[host.{}] {}: update failed: {}", name, target.fqdn(), reason);
                failed = true;
            }
            Err(e) => {
                log::error!("[host.{}] {}: {}", name, target.fqdn(), e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
