// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The upgrade coordinator
//!
//! ## Sequencing readiness and start
//!
//! Under [`StartPolicy::CallerSequenced`],
//! [`UpgradeCoordinator::start_upgrade`] does not look at controller
//! readiness.  The orchestration loop driving an upgrade must observe
//! [`UpgradeCoordinator::all_provisioned_controllers_ready`] returning `true`
//! before it starts the upgrade.  Under
//! [`StartPolicy::RequireAllReady`] the store re-checks readiness in the same
//! conditional update that starts the upgrade and the start fails with
//! `InvalidRequest` while any controller is unready.

use crate::context::OpContext;
use crate::db::model::version_is_upgrade;
use crate::db::model::ControllerId;
use crate::db::model::ControllerNode;
use crate::db::model::ControllerReadiness;
use crate::db::model::UpgradeRecord;
use crate::db::model::UpgradeUuid;
use crate::db::public_error_from_store;
use crate::db::ErrorHandler;
use crate::db::StartPolicy;
use crate::db::StoreError;
use crate::db::UpgradeStore;
use fleet_common::api::external::CreateResult;
use fleet_common::api::external::Error;
use fleet_common::api::external::ListResultVec;
use fleet_common::api::external::LookupResult;
use fleet_common::api::external::LookupType;
use fleet_common::api::external::ResourceType;
use fleet_common::api::external::UpdateResult;
use semver::Version;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use std::future::Future;
use std::sync::Arc;

/// Tracks the lifecycle of fleet-wide upgrades
///
/// The coordinator holds no mutable state of its own.  Any number of
/// coordinators may share one store; the store is responsible for making
/// concurrent operations safe.
pub struct UpgradeCoordinator {
    log: Logger,
    store: Arc<dyn UpgradeStore>,
    start_policy: StartPolicy,
}

impl UpgradeCoordinator {
    pub fn new(
        log: &Logger,
        store: Arc<dyn UpgradeStore>,
        start_policy: StartPolicy,
    ) -> UpgradeCoordinator {
        UpgradeCoordinator {
            log: log.new(o!(
                "component" => "UpgradeCoordinator",
                "start_policy" => format!("{:?}", start_policy),
            )),
            store,
            start_policy,
        }
    }

    pub fn start_policy(&self) -> StartPolicy {
        self.start_policy
    }

    /// Runs one store call on behalf of `operation`, translating its failure
    /// with `handler`.
    ///
    /// If `opctx` is cancelled first, the call is dropped and the result is
    /// `Error::Cancelled`.  A context that is already cancelled never reaches
    /// the store.
    async fn store_call<T, F>(
        &self,
        opctx: &OpContext,
        operation: String,
        handler: ErrorHandler,
        call: F,
    ) -> Result<T, Error>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = tokio::select! {
            biased;
            _ = opctx.cancelled() => {
                warn!(self.log, "operation cancelled";
                    "operation" => &operation);
                return Err(Error::cancelled(&operation));
            }
            result = call => result,
        };

        result.map_err(|error| {
            let public = public_error_from_store(error.clone(), handler);
            match &public {
                Error::ObjectNotFound { .. } | Error::InvalidRequest { .. } => {
                    debug!(self.log, "operation rejected";
                        "operation" => &operation,
                        "error" => %error,
                    );
                }
                Error::InternalError { .. }
                | Error::ServiceUnavailable { .. }
                | Error::Cancelled { .. } => {
                    warn!(self.log, "operation failed";
                        "operation" => &operation,
                        "error" => %error,
                    );
                }
            }
            public.internal_context(operation)
        })
    }

    /// Records a new upgrade from `from_version` to `to_version` and returns
    /// its id.
    ///
    /// `to_version` must be strictly greater than `from_version`; otherwise
    /// this fails with `InvalidRequest` before touching the store.
    pub async fn create_upgrade(
        &self,
        opctx: &OpContext,
        from_version: &Version,
        to_version: &Version,
    ) -> CreateResult<UpgradeUuid> {
        if !version_is_upgrade(from_version, to_version) {
            return Err(Error::invalid_request(format!(
                "target version {} must be greater than current version {}",
                to_version, from_version
            )));
        }

        let upgrade_id = self
            .store_call(
                opctx,
                format!("create upgrade {} -> {}", from_version, to_version),
                ErrorHandler::Server,
                self.store.create_upgrade(from_version, to_version),
            )
            .await?;
        info!(self.log, "created upgrade";
            "upgrade_id" => %upgrade_id,
            "from_version" => %from_version,
            "to_version" => %to_version,
        );
        Ok(upgrade_id)
    }

    /// Records that `controller_id` is ready for `upgrade_id`.
    ///
    /// Repeating the call for a controller that is already ready succeeds and
    /// changes nothing.  An unknown upgrade or controller is `ObjectNotFound`;
    /// its `type_name` says which one was missing.
    pub async fn set_controller_ready(
        &self,
        opctx: &OpContext,
        upgrade_id: UpgradeUuid,
        controller_id: &ControllerId,
    ) -> UpdateResult<()> {
        self.store_call(
            opctx,
            format!(
                "set controller {} ready for upgrade {}",
                controller_id, upgrade_id
            ),
            ErrorHandler::Server,
            self.store.set_controller_ready(upgrade_id, controller_id),
        )
        .await?;
        info!(self.log, "controller ready";
            "upgrade_id" => %upgrade_id,
            "controller_id" => %controller_id,
        );
        Ok(())
    }

    /// Returns true iff every controller tracked for `upgrade_id` is ready.
    ///
    /// An upgrade tracking no controllers is not ready.  This does not check
    /// that `upgrade_id` exists: an unknown upgrade tracks no controllers.
    pub async fn all_provisioned_controllers_ready(
        &self,
        opctx: &OpContext,
        upgrade_id: UpgradeUuid,
    ) -> LookupResult<bool> {
        let ready = self
            .store_call(
                opctx,
                format!("check readiness of upgrade {}", upgrade_id),
                ErrorHandler::Server,
                self.store.all_provisioned_controllers_ready(upgrade_id),
            )
            .await?;
        debug!(self.log, "checked controller readiness";
            "upgrade_id" => %upgrade_id,
            "ready" => ready,
        );
        Ok(ready)
    }

    /// Moves `upgrade_id` from `Created` to `Started`.
    ///
    /// See the module documentation for how this is sequenced with
    /// controller readiness.
    pub async fn start_upgrade(
        &self,
        opctx: &OpContext,
        upgrade_id: UpgradeUuid,
    ) -> UpdateResult<()> {
        let record = self
            .store_call(
                opctx,
                format!("start upgrade {}", upgrade_id),
                upgrade_lookup(upgrade_id),
                self.store.start_upgrade(upgrade_id, self.start_policy),
            )
            .await?;
        info!(self.log, "started upgrade";
            "upgrade_id" => %upgrade_id,
            "from_version" => %record.from_version,
            "to_version" => %record.to_version,
        );
        Ok(())
    }

    /// Lists upgrades that are neither completed nor aborted, in creation
    /// order.
    pub async fn active_upgrades(
        &self,
        opctx: &OpContext,
    ) -> ListResultVec<UpgradeUuid> {
        self.store_call(
            opctx,
            String::from("list active upgrades"),
            ErrorHandler::Server,
            self.store.active_upgrades(),
        )
        .await
    }

    pub async fn upgrade_info(
        &self,
        opctx: &OpContext,
        upgrade_id: UpgradeUuid,
    ) -> LookupResult<UpgradeRecord> {
        self.store_call(
            opctx,
            format!("fetch upgrade {}", upgrade_id),
            upgrade_lookup(upgrade_id),
            self.store.upgrade_info(upgrade_id),
        )
        .await
    }

    pub async fn controller_readiness(
        &self,
        opctx: &OpContext,
        upgrade_id: UpgradeUuid,
    ) -> ListResultVec<ControllerReadiness> {
        self.store_call(
            opctx,
            format!("list readiness of upgrade {}", upgrade_id),
            upgrade_lookup(upgrade_id),
            self.store.controller_readiness(upgrade_id),
        )
        .await
    }

    /// Adds a controller node to the fleet.  Adding a node that is already a
    /// member returns the existing node.
    pub async fn add_controller_node(
        &self,
        opctx: &OpContext,
        controller_id: &ControllerId,
    ) -> CreateResult<ControllerNode> {
        if controller_id.as_str().is_empty() {
            return Err(Error::invalid_request(
                "controller id must not be empty",
            ));
        }
        let node = self
            .store_call(
                opctx,
                format!("add controller node {}", controller_id),
                ErrorHandler::Server,
                self.store.add_controller_node(controller_id),
            )
            .await?;
        info!(self.log, "controller node in fleet";
            "controller_id" => %node.id,
            "time_added" => %node.time_added,
        );
        Ok(node)
    }

    pub async fn controller_nodes(
        &self,
        opctx: &OpContext,
    ) -> ListResultVec<ControllerNode> {
        self.store_call(
            opctx,
            String::from("list controller nodes"),
            ErrorHandler::Server,
            self.store.controller_nodes(),
        )
        .await
    }
}

fn upgrade_lookup(upgrade_id: UpgradeUuid) -> ErrorHandler {
    ErrorHandler::NotFoundByLookup(
        ResourceType::Upgrade,
        LookupType::ById(upgrade_id.into_untyped_uuid()),
    )
}
