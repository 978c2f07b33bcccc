// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facade layer of the fleet API server
//!
//! Facades are the units of the API surface.  Each is registered under a name
//! and version in a [`FacadeRegistry`] built explicitly at process start, and
//! instantiated once per [`ServerContext`].  How facade calls reach the
//! server is up to the transport; this crate only dispatches them.

mod config;
mod context;
pub mod facades;

pub use config::Config;
pub use config::LoadError;
pub use config::UpgradeConfig;
pub use context::ServerContext;
pub use context::StartError;
pub use facades::Facade;
pub use facades::FacadeContext;
pub use facades::FacadeId;
pub use facades::FacadeRegistry;
pub use facades::RegistryError;
