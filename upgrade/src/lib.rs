// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordination of a fleet-wide controller upgrade
//!
//! The [`UpgradeCoordinator`] tracks one cluster-wide version transition at a
//! time through its lifecycle: an upgrade is created for a pair of versions,
//! each controller node reports that it is ready, and an orchestrator then
//! moves the upgrade to "started".  All state lives behind the
//! [`db::UpgradeStore`] trait; the coordinator itself only validates input
//! and translates the store's error vocabulary into the public
//! [`fleet_common::api::external::Error`] taxonomy.

mod context;
mod coordinator;
pub mod db;

pub use context::OpContext;
pub use coordinator::UpgradeCoordinator;
