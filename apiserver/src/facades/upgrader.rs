// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `Upgrader` facade: drives a fleet-wide upgrade

use super::decode_params;
use super::encode_result;
use super::unknown_method;
use super::Facade;
use super::FacadeContext;
use async_trait::async_trait;
use fleet_common::api::external::Error;
use fleet_upgrade::db::model::ControllerId;
use fleet_upgrade::db::model::UpgradeUuid;
use fleet_upgrade::OpContext;
use fleet_upgrade::UpgradeCoordinator;
use semver::Version;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::o;
use slog::Logger;
use std::sync::Arc;

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateUpgradeParams {
    pub from_version: Version,
    pub to_version: Version,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateUpgradeResult {
    pub upgrade_id: UpgradeUuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpgradeParams {
    pub upgrade_id: UpgradeUuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ControllerReadyParams {
    pub upgrade_id: UpgradeUuid,
    pub controller_id: ControllerId,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReadyResult {
    pub ready: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActiveUpgradesResult {
    pub upgrade_ids: Vec<UpgradeUuid>,
}

pub struct UpgraderFacade {
    log: Logger,
    coordinator: Arc<UpgradeCoordinator>,
}

impl UpgraderFacade {
    const NAME: &'static str = "Upgrader";
    const METHODS: &'static [&'static str] = &[
        "CreateUpgrade",
        "SetControllerReady",
        "AllProvisionedControllersReady",
        "StartUpgrade",
        "ActiveUpgrades",
        "UpgradeInfo",
        "ControllerReadiness",
    ];

    pub fn new_facade(context: &FacadeContext) -> Arc<dyn Facade> {
        Arc::new(UpgraderFacade {
            log: context.log.new(o!("facade" => Self::NAME)),
            coordinator: Arc::clone(&context.coordinator),
        })
    }
}

#[async_trait]
impl Facade for UpgraderFacade {
    fn methods(&self) -> &'static [&'static str] {
        Self::METHODS
    }

    async fn call(
        &self,
        opctx: &OpContext,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        debug!(self.log, "call"; "method" => method);
        match method {
            "CreateUpgrade" => {
                let p: CreateUpgradeParams = decode_params(method, params)?;
                let upgrade_id = self
                    .coordinator
                    .create_upgrade(opctx, &p.from_version, &p.to_version)
                    .await?;
                encode_result(CreateUpgradeResult { upgrade_id })
            }
            "SetControllerReady" => {
                let p: ControllerReadyParams = decode_params(method, params)?;
                self.coordinator
                    .set_controller_ready(opctx, p.upgrade_id, &p.controller_id)
                    .await?;
                Ok(serde_json::Value::Null)
            }
            "AllProvisionedControllersReady" => {
                let p: UpgradeParams = decode_params(method, params)?;
                let ready = self
                    .coordinator
                    .all_provisioned_controllers_ready(opctx, p.upgrade_id)
                    .await?;
                encode_result(ReadyResult { ready })
            }
            "StartUpgrade" => {
                let p: UpgradeParams = decode_params(method, params)?;
                self.coordinator.start_upgrade(opctx, p.upgrade_id).await?;
                Ok(serde_json::Value::Null)
            }
            "ActiveUpgrades" => {
                let upgrade_ids =
                    self.coordinator.active_upgrades(opctx).await?;
                encode_result(ActiveUpgradesResult { upgrade_ids })
            }
            "UpgradeInfo" => {
                let p: UpgradeParams = decode_params(method, params)?;
                encode_result(
                    self.coordinator.upgrade_info(opctx, p.upgrade_id).await?,
                )
            }
            "ControllerReadiness" => {
                let p: UpgradeParams = decode_params(method, params)?;
                encode_result(
                    self.coordinator
                        .controller_readiness(opctx, p.upgrade_id)
                        .await?,
                )
            }
            _ => Err(unknown_method(Self::NAME, method)),
        }
    }
}
