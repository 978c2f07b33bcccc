// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `HighAvailability` facade: controller fleet membership

use super::decode_params;
use super::encode_result;
use super::unknown_method;
use super::Facade;
use super::FacadeContext;
use async_trait::async_trait;
use fleet_common::api::external::Error;
use fleet_upgrade::db::model::ControllerId;
use fleet_upgrade::OpContext;
use fleet_upgrade::UpgradeCoordinator;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::o;
use slog::Logger;
use std::sync::Arc;

#[derive(Debug, Deserialize, Serialize)]
pub struct ControllerNodeParams {
    pub controller_id: ControllerId,
}

pub struct HighAvailabilityFacade {
    log: Logger,
    coordinator: Arc<UpgradeCoordinator>,
}

impl HighAvailabilityFacade {
    const NAME: &'static str = "HighAvailability";
    const METHODS: &'static [&'static str] =
        &["AddControllerNode", "ControllerNodes"];

    pub fn new_facade(context: &FacadeContext) -> Arc<dyn Facade> {
        Arc::new(HighAvailabilityFacade {
            log: context.log.new(o!("facade" => Self::NAME)),
            coordinator: Arc::clone(&context.coordinator),
        })
    }
}

#[async_trait]
impl Facade for HighAvailabilityFacade {
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
            "AddControllerNode" => {
                let p: ControllerNodeParams = decode_params(method, params)?;
                encode_result(
                    self.coordinator
                        .add_controller_node(opctx, &p.controller_id)
                        .await?,
                )
            }
            "ControllerNodes" => {
                encode_result(self.coordinator.controller_nodes(opctx).await?)
            }
            _ => Err(unknown_method(Self::NAME, method)),
        }
    }
}
