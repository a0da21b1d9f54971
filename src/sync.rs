use std::net::IpAddr;

use thiserror::Error;

use crate::catalog::{CatalogError, ProviderCatalog};
use crate::config::HostTarget;
use crate::executor::{self, UpdateOutcome};
use crate::http::HttpSettings;
use crate::ip::{IpSource, PublicIpError};
use crate::template::TemplateError;

/// Errors that abort a synchronization run. Provider-side failures are not
/// here; those come back as [`UpdateOutcome::Failed`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    PublicIp(#[from] PublicIpError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// An update is needed when there is nothing to compare against, or the
/// registered address differs from the current one.
pub fn needs_update(current: IpAddr, registered: Option<IpAddr>) -> bool {
    match registered {
        Some(registered) => registered != current,
        None => true,
    }
}

/// Orchestrates one stateless pass: two lookups, one decision, at most one
/// provider call. Holds no mutable state, so independent targets can be
/// synced concurrently from separate scheduler invocations.
pub struct Synchronizer<'a, S: IpSource> {
    catalog: &'a ProviderCatalog,
    source: S,
    settings: HttpSettings,
}

impl<'a, S: IpSource> Synchronizer<'a, S> {
    pub fn new(catalog: &'a ProviderCatalog, source: S, settings: HttpSettings) -> Self {
        Self {
            catalog,
            source,
            settings,
        }
    }

    pub fn sync(&self, target: &HostTarget) -> Result<UpdateOutcome, SyncError> {
        // A typoed provider name must surface before any network traffic.
        let definition = self.catalog.lookup(&target.provider)?;

        let current = self.source.public_ip()?;
        log::debug!("current public IP: {}", current);

        let registered =
            match self
                .source
                .registered_ip(&target.host, &target.domain, target.record)
            {
                Ok(ip) => {
                    log::debug!("registered IP for {}: {}", target.fqdn(), ip);
                    Some(ip)
                }
                Err(e) => {
                    // Nothing to compare against, so assume the record is
                    // stale rather than silently skipping the sync.
                    log::warn!(
                        "registered IP for {} unknown ({}), forcing an update",
                        target.fqdn(),
                        e
                    );
                    None
                }
            };

        if !needs_update(current, registered) {
            log::info!("{} already points at {}", target.fqdn(), current);
            return Ok(UpdateOutcome::NoChangeNeeded);
        }

        match registered {
            Some(old) => log::info!("IP for {} changed from {} to {}", target.fqdn(), old, current),
            None => log::info!("reporting {} for {}", current, target.fqdn()),
        }

        Ok(executor::execute(definition, target, current, &self.settings)?)
    }
}
