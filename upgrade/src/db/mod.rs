// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of upgrade state

mod error;
mod in_memory;
pub mod model;

pub use error::public_error_from_store;
pub use error::ErrorHandler;
pub use error::StoreError;
pub use in_memory::InMemoryStore;

use async_trait::async_trait;
use model::ControllerId;
use model::ControllerNode;
use model::ControllerReadiness;
use model::UpgradeOutcome;
use model::UpgradeRecord;
use model::UpgradeUuid;
use semver::Version;
use serde::Deserialize;
use serde::Serialize;

/// What must hold, beyond the upgrade being in state `Created`, for a start to
/// succeed
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartPolicy {
    /// The caller is responsible for checking controller readiness before
    /// starting the upgrade.
    #[default]
    CallerSequenced,
    /// The store re-checks that every tracked controller is ready as part of
    /// the same conditional update that starts the upgrade.
    RequireAllReady,
}

/// Transactional storage for upgrades, controller nodes and readiness rows
///
/// Implementations own all concurrency control.  In particular:
///
/// * `set_controller_ready` must check both referenced keys and write the row
///   atomically, and is idempotent.
/// * `start_upgrade` and `finish_upgrade` are conditional updates on the
///   upgrade's state: of several concurrent callers at most one observes the
///   transition.
#[async_trait]
pub trait UpgradeStore: Send + Sync {
    /// Adds a controller to the fleet.  Adding an existing member returns the
    /// existing row.
    async fn add_controller_node(
        &self,
        controller_id: &ControllerId,
    ) -> Result<ControllerNode, StoreError>;

    /// Lists fleet members, ordered by id.
    async fn controller_nodes(&self) -> Result<Vec<ControllerNode>, StoreError>;

    /// Records a new upgrade in state `Created`, together with an unready
    /// readiness row for every current fleet member.
    ///
    /// Fails with [`StoreError::CheckViolation`] unless `to_version` is
    /// strictly greater than `from_version`.
    async fn create_upgrade(
        &self,
        from_version: &Version,
        to_version: &Version,
    ) -> Result<UpgradeUuid, StoreError>;

    /// Fetches one upgrade, or [`StoreError::NoMatchingRow`].
    async fn upgrade_info(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<UpgradeRecord, StoreError>;

    /// Marks `controller_id` ready for `upgrade_id`.
    ///
    /// Fails with [`StoreError::ForeignKeyViolation`] if either key is
    /// unknown.
    async fn set_controller_ready(
        &self,
        upgrade_id: UpgradeUuid,
        controller_id: &ControllerId,
    ) -> Result<(), StoreError>;

    /// Lists the readiness rows of one upgrade, ordered by controller id, or
    /// [`StoreError::NoMatchingRow`] if the upgrade is unknown.
    async fn controller_readiness(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<Vec<ControllerReadiness>, StoreError>;

    /// Returns true iff the upgrade has at least one readiness row and every
    /// one of them is ready.  Unknown upgrades have no rows.
    async fn all_provisioned_controllers_ready(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<bool, StoreError>;

    /// Moves an upgrade from `Created` to `Started`.
    ///
    /// Fails with [`StoreError::NoMatchingRow`] if the upgrade is unknown,
    /// [`StoreError::InvalidState`] if it is not `Created`, and (under
    /// [`StartPolicy::RequireAllReady`]) [`StoreError::NotReady`].
    async fn start_upgrade(
        &self,
        upgrade_id: UpgradeUuid,
        policy: StartPolicy,
    ) -> Result<UpgradeRecord, StoreError>;

    /// Moves an upgrade from `Started` to a terminal state.
    async fn finish_upgrade(
        &self,
        upgrade_id: UpgradeUuid,
        outcome: UpgradeOutcome,
    ) -> Result<UpgradeRecord, StoreError>;

    /// Lists upgrades that are not terminal, in creation order.
    async fn active_upgrades(&self) -> Result<Vec<UpgradeUuid>, StoreError>;
}
