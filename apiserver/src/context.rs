// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process-wide state of the API server

use crate::config::Config;
use crate::facades::Facade;
use crate::facades::FacadeContext;
use crate::facades::FacadeId;
use crate::facades::FacadeRegistry;
use crate::facades::RegistryError;
use fleet_common::api::external::Error;
use fleet_common::api::external::LookupResult;
use fleet_common::api::external::ResourceType;
use fleet_upgrade::db::UpgradeStore;
use fleet_upgrade::OpContext;
use fleet_upgrade::UpgradeCoordinator;
use slog::info;
use slog::warn;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to initialize logger")]
    Log(#[source] std::io::Error),
    #[error("failed to build facade registry")]
    Registry(#[from] RegistryError),
}

/// Everything a facade call needs, built once at process start
pub struct ServerContext {
    pub log: Logger,
    pub coordinator: Arc<UpgradeCoordinator>,
    facades: BTreeMap<FacadeId, Arc<dyn Facade>>,
    shutdown: CancellationToken,
}

impl ServerContext {
    /// Builds the root logger described by `config` and a server context on
    /// top of it.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn UpgradeStore>,
    ) -> Result<ServerContext, StartError> {
        let log =
            config.log.to_logger("fleet-apiserver").map_err(StartError::Log)?;
        ServerContext::new(&log, config, store)
    }

    pub fn new(
        log: &Logger,
        config: &Config,
        store: Arc<dyn UpgradeStore>,
    ) -> Result<ServerContext, StartError> {
        let log = log.new(o!("component" => "ServerContext"));
        let coordinator = Arc::new(UpgradeCoordinator::new(
            &log,
            store,
            config.upgrade.start_policy,
        ));
        let registry = FacadeRegistry::with_builtin_facades()?;
        let facades = registry.instantiate(&FacadeContext {
            log: log.clone(),
            coordinator: Arc::clone(&coordinator),
        });
        for id in facades.keys() {
            info!(log, "registered facade";
                "name" => &id.name,
                "version" => id.version,
            );
        }
        Ok(ServerContext {
            log,
            coordinator,
            facades,
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns a context for one request.  The request is cancelled if it is
    /// still running when the server shuts down.
    pub fn opctx(&self) -> OpContext {
        OpContext::with_cancellation(self.shutdown.child_token())
    }

    /// Cancels every request context handed out by [`ServerContext::opctx`],
    /// including ones created after this call.
    pub fn shutdown(&self) {
        warn!(self.log, "shutting down; cancelling outstanding requests");
        self.shutdown.cancel();
    }

    /// Lists the facades this server offers, ordered by name, then version.
    pub fn facade_ids(&self) -> Vec<FacadeId> {
        self.facades.keys().cloned().collect()
    }

    pub fn facade(
        &self,
        name: &str,
        version: u32,
    ) -> LookupResult<Arc<dyn Facade>> {
        let id = FacadeId::new(name, version);
        self.facades.get(&id).cloned().ok_or_else(|| {
            Error::not_found_by_name(ResourceType::Facade, &id.to_string())
        })
    }

    /// Dispatches one call to `method` of facade `name` at `version`.
    pub async fn call(
        &self,
        opctx: &OpContext,
        name: &str,
        version: u32,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        self.facade(name, version)?.call(opctx, method, params).await
    }
}
