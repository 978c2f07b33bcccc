// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An [`UpgradeStore`] that keeps everything in process memory
//!
//! Every operation runs under a single lock, which gives the same atomicity a
//! serializable transaction would.  The store can also be told to fail its
//! next call or to respond slowly, which is how tests exercise error
//! pass-through and cancellation.

use super::model::version_is_upgrade;
use super::model::ControllerId;
use super::model::ControllerNode;
use super::model::ControllerReadiness;
use super::model::UpgradeOutcome;
use super::model::UpgradeRecord;
use super::model::UpgradeState;
use super::model::UpgradeUuid;
use super::StartPolicy;
use super::StoreError;
use super::UpgradeStore;
use async_trait::async_trait;
use chrono::Utc;
use fleet_common::api::external::LookupType;
use fleet_common::api::external::ResourceType;
use semver::Version;
use slog::debug;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

pub struct InMemoryStore {
    log: Logger,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    controllers: BTreeMap<ControllerId, ControllerNode>,
    // Kept in creation order.
    upgrades: Vec<UpgradeRecord>,
    readiness:
        BTreeMap<UpgradeUuid, BTreeMap<ControllerId, ControllerReadiness>>,
    fault: Option<StoreError>,
    latency: Option<Duration>,
}

impl Inner {
    fn upgrade(&self, upgrade_id: UpgradeUuid) -> Option<&UpgradeRecord> {
        self.upgrades.iter().find(|u| u.id == upgrade_id)
    }

    fn upgrade_mut(
        &mut self,
        upgrade_id: UpgradeUuid,
    ) -> Option<&mut UpgradeRecord> {
        self.upgrades.iter_mut().find(|u| u.id == upgrade_id)
    }

    /// Returns (unready, total) readiness rows for the upgrade.
    fn readiness_counts(&self, upgrade_id: UpgradeUuid) -> (usize, usize) {
        self.readiness.get(&upgrade_id).map_or((0, 0), |rows| {
            (rows.values().filter(|r| !r.ready).count(), rows.len())
        })
    }
}

impl InMemoryStore {
    pub fn new(log: &Logger) -> InMemoryStore {
        InMemoryStore {
            log: log.new(o!("component" => "InMemoryStore")),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Makes the next store operation fail with `error` instead of running.
    pub fn inject_fault(&self, error: StoreError) {
        self.lock().fault = Some(error);
    }

    /// Delays every subsequent operation by `latency` before it runs.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    // No operation panics partway through a mutation, so a poisoned lock
    // still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn begin(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.lock();
        match inner.fault.take() {
            Some(error) => Err(error),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl UpgradeStore for InMemoryStore {
    async fn add_controller_node(
        &self,
        controller_id: &ControllerId,
    ) -> Result<ControllerNode, StoreError> {
        let mut inner = self.begin().await?;
        let node = inner
            .controllers
            .entry(controller_id.clone())
            .or_insert_with(|| {
                debug!(self.log, "adding controller node";
                    "controller_id" => %controller_id);
                ControllerNode {
                    id: controller_id.clone(),
                    time_added: Utc::now(),
                }
            });
        Ok(node.clone())
    }

    async fn controller_nodes(
        &self,
    ) -> Result<Vec<ControllerNode>, StoreError> {
        let inner = self.begin().await?;
        Ok(inner.controllers.values().cloned().collect())
    }

    async fn create_upgrade(
        &self,
        from_version: &Version,
        to_version: &Version,
    ) -> Result<UpgradeUuid, StoreError> {
        let mut inner = self.begin().await?;
        if !version_is_upgrade(from_version, to_version) {
            return Err(StoreError::CheckViolation {
                constraint: format!(
                    "to_version ({}) > from_version ({})",
                    to_version, from_version
                ),
            });
        }

        let record =
            UpgradeRecord::new(from_version.clone(), to_version.clone());
        let upgrade_id = record.id;
        let rows = inner
            .controllers
            .keys()
            .map(|controller_id| {
                (
                    controller_id.clone(),
                    ControllerReadiness::unready(
                        upgrade_id,
                        controller_id.clone(),
                    ),
                )
            })
            .collect::<BTreeMap<_, _>>();
        debug!(self.log, "inserting upgrade";
            "upgrade_id" => %upgrade_id,
            "tracked_controllers" => rows.len(),
        );
        inner.readiness.insert(upgrade_id, rows);
        inner.upgrades.push(record);
        Ok(upgrade_id)
    }

    async fn upgrade_info(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<UpgradeRecord, StoreError> {
        let inner = self.begin().await?;
        inner.upgrade(upgrade_id).cloned().ok_or(StoreError::NoMatchingRow)
    }

    async fn set_controller_ready(
        &self,
        upgrade_id: UpgradeUuid,
        controller_id: &ControllerId,
    ) -> Result<(), StoreError> {
        let mut inner = self.begin().await?;
        if inner.upgrade(upgrade_id).is_none() {
            return Err(StoreError::ForeignKeyViolation {
                resource_type: ResourceType::Upgrade,
                lookup_type: LookupType::ById(upgrade_id.into_untyped_uuid()),
            });
        }
        if !inner.controllers.contains_key(controller_id) {
            return Err(StoreError::ForeignKeyViolation {
                resource_type: ResourceType::ControllerNode,
                lookup_type: LookupType::ByName(controller_id.to_string()),
            });
        }

        let row = inner
            .readiness
            .entry(upgrade_id)
            .or_default()
            .entry(controller_id.clone())
            .or_insert_with(|| {
                ControllerReadiness::unready(upgrade_id, controller_id.clone())
            });
        if !row.ready {
            row.ready = true;
            row.time_ready = Some(Utc::now());
        }
        Ok(())
    }

    async fn controller_readiness(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<Vec<ControllerReadiness>, StoreError> {
        let inner = self.begin().await?;
        if inner.upgrade(upgrade_id).is_none() {
            return Err(StoreError::NoMatchingRow);
        }
        Ok(inner
            .readiness
            .get(&upgrade_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn all_provisioned_controllers_ready(
        &self,
        upgrade_id: UpgradeUuid,
    ) -> Result<bool, StoreError> {
        let inner = self.begin().await?;
        let (unready, total) = inner.readiness_counts(upgrade_id);
        Ok(total > 0 && unready == 0)
    }

    async fn start_upgrade(
        &self,
        upgrade_id: UpgradeUuid,
        policy: StartPolicy,
    ) -> Result<UpgradeRecord, StoreError> {
        let mut inner = self.begin().await?;
        let (unready, total) = inner.readiness_counts(upgrade_id);
        let record =
            inner.upgrade_mut(upgrade_id).ok_or(StoreError::NoMatchingRow)?;
        if record.state != UpgradeState::Created {
            return Err(StoreError::InvalidState {
                current: record.state,
                expected: UpgradeState::Created,
            });
        }
        match policy {
            StartPolicy::CallerSequenced => (),
            StartPolicy::RequireAllReady => {
                if total == 0 || unready > 0 {
                    return Err(StoreError::NotReady { unready, total });
                }
            }
        }

        record.state = UpgradeState::Started;
        record.time_started = Some(Utc::now());
        Ok(record.clone())
    }

    async fn finish_upgrade(
        &self,
        upgrade_id: UpgradeUuid,
        outcome: UpgradeOutcome,
    ) -> Result<UpgradeRecord, StoreError> {
        let mut inner = self.begin().await?;
        let record =
            inner.upgrade_mut(upgrade_id).ok_or(StoreError::NoMatchingRow)?;
        if record.state != UpgradeState::Started {
            return Err(StoreError::InvalidState {
                current: record.state,
                expected: UpgradeState::Started,
            });
        }

        record.state = UpgradeState::from(outcome);
        record.time_finished = Some(Utc::now());
        debug!(self.log, "finished upgrade";
            "upgrade_id" => %upgrade_id,
            "state" => %record.state,
        );
        Ok(record.clone())
    }

    async fn active_upgrades(&self) -> Result<Vec<UpgradeUuid>, StoreError> {
        let inner = self.begin().await?;
        Ok(inner
            .upgrades
            .iter()
            .filter(|u| !u.state.is_terminal())
            .map(|u| u.id)
            .collect())
    }
}
