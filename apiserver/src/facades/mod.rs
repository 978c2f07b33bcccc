// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The facade registry
//!
//! Every facade the server offers is listed in [`BUILTIN_FACADES`].  Adding a
//! facade means adding a row there; nothing is registered as a side effect of
//! linking a module in.

mod high_availability;
mod upgrader;

pub use high_availability::HighAvailabilityFacade;
pub use upgrader::UpgraderFacade;

use async_trait::async_trait;
use fleet_common::api::external::Error;
use fleet_upgrade::OpContext;
use fleet_upgrade::UpgradeCoordinator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use slog::Logger;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One unit of the API surface
#[async_trait]
pub trait Facade: Send + Sync {
    /// Names of the methods [`Facade::call`] accepts.
    fn methods(&self) -> &'static [&'static str];

    /// Invokes `method` with JSON-encoded `params`.
    ///
    /// Unknown methods and params that don't decode are `InvalidRequest`.
    async fn call(
        &self,
        opctx: &OpContext,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error>;
}

/// Shared state handed to facade constructors
#[derive(Clone)]
pub struct FacadeContext {
    pub log: Logger,
    pub coordinator: Arc<UpgradeCoordinator>,
}

pub type FacadeConstructor = fn(&FacadeContext) -> Arc<dyn Facade>;

/// Registered name and version of a facade
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct FacadeId {
    pub name: String,
    pub version: u32,
}

impl FacadeId {
    pub fn new(name: &str, version: u32) -> FacadeId {
        FacadeId { name: name.to_string(), version }
    }
}

impl fmt::Display for FacadeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// All facades the server offers.
pub const BUILTIN_FACADES: &[(&str, u32, FacadeConstructor)] = &[
    ("HighAvailability", 1, HighAvailabilityFacade::new_facade),
    ("Upgrader", 1, UpgraderFacade::new_facade),
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("facade {0} registered twice")]
    Duplicate(FacadeId),
}

/// Maps facade name and version to the constructor for that facade
#[derive(Default)]
pub struct FacadeRegistry {
    facades: BTreeMap<FacadeId, FacadeConstructor>,
}

impl FacadeRegistry {
    pub fn new() -> FacadeRegistry {
        FacadeRegistry::default()
    }

    /// Returns a registry holding everything in [`BUILTIN_FACADES`].
    pub fn with_builtin_facades() -> Result<FacadeRegistry, RegistryError> {
        let mut registry = FacadeRegistry::new();
        for (name, version, constructor) in BUILTIN_FACADES {
            registry.register(name, *version, *constructor)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: &str,
        version: u32,
        constructor: FacadeConstructor,
    ) -> Result<(), RegistryError> {
        let id = FacadeId::new(name, version);
        if self.facades.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.facades.insert(id, constructor);
        Ok(())
    }

    /// Lists registered facades ordered by name, then version.
    pub fn list(&self) -> Vec<FacadeId> {
        self.facades.keys().cloned().collect()
    }

    /// Builds one instance of every registered facade.
    pub fn instantiate(
        &self,
        context: &FacadeContext,
    ) -> BTreeMap<FacadeId, Arc<dyn Facade>> {
        self.facades
            .iter()
            .map(|(id, constructor)| (id.clone(), constructor(context)))
            .collect()
    }
}

/// Decodes facade params, reporting failures as the caller's fault.
fn decode_params<T: DeserializeOwned>(
    method: &str,
    params: serde_json::Value,
) -> Result<T, Error> {
    serde_json::from_value(params).map_err(|e| {
        Error::invalid_request(format!("invalid params for {}: {}", method, e))
    })
}

fn encode_result<T: Serialize>(result: T) -> Result<serde_json::Value, Error> {
    Ok(serde_json::to_value(result)?)
}

fn unknown_method(facade: &str, method: &str) -> Error {
    Error::invalid_request(format!("unknown method {}.{}", facade, method))
}
