// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives whole upgrades through the facade layer

use assert_matches::assert_matches;
use dropshot::ConfigLogging;
use dropshot::ConfigLoggingLevel;
use fleet_apiserver::Config;
use fleet_apiserver::FacadeId;
use fleet_apiserver::ServerContext;
use fleet_apiserver::UpgradeConfig;
use fleet_common::api::external::Error;
use fleet_common::api::external::LookupType;
use fleet_common::api::external::ResourceType;
use fleet_test_utils::dev;
use fleet_upgrade::db::model::UpgradeOutcome;
use fleet_upgrade::db::model::UpgradeUuid;
use fleet_upgrade::db::InMemoryStore;
use fleet_upgrade::db::StartPolicy;
use fleet_upgrade::db::UpgradeStore;
use fleet_upgrade::OpContext;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config(start_policy: StartPolicy) -> Config {
    Config {
        log: ConfigLogging::StderrTerminal { level: ConfigLoggingLevel::Info },
        upgrade: UpgradeConfig { start_policy },
    }
}

struct TestServer {
    logctx: dev::LogContext,
    store: Arc<InMemoryStore>,
    server: ServerContext,
    opctx: OpContext,
}

impl TestServer {
    fn new(test_name: &str, start_policy: StartPolicy) -> TestServer {
        let logctx = dev::test_setup_log(test_name);
        let store = Arc::new(InMemoryStore::new(&logctx.log));
        let server = ServerContext::new(
            &logctx.log,
            &config(start_policy),
            Arc::clone(&store) as Arc<dyn UpgradeStore>,
        )
        .unwrap();
        TestServer { logctx, store, server, opctx: OpContext::new() }
    }

    async fn call(
        &self,
        facade: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        self.server.call(&self.opctx, facade, 1, method, params).await
    }

    async fn add_controller(&self, id: &str) {
        self.call("HighAvailability", "AddControllerNode", json!({
            "controller_id": id
        }))
        .await
        .unwrap();
    }

    async fn create_upgrade(&self, from: &str, to: &str) -> UpgradeUuid {
        let result = self
            .call("Upgrader", "CreateUpgrade", json!({
                "from_version": from,
                "to_version": to,
            }))
            .await
            .unwrap();
        serde_json::from_value(result["upgrade_id"].clone()).unwrap()
    }

    async fn set_ready(&self, upgrade_id: UpgradeUuid, controller_id: &str) {
        self.call("Upgrader", "SetControllerReady", json!({
            "upgrade_id": upgrade_id,
            "controller_id": controller_id,
        }))
        .await
        .unwrap();
    }

    async fn all_ready(&self, upgrade_id: UpgradeUuid) -> bool {
        let result = self
            .call("Upgrader", "AllProvisionedControllersReady", json!({
                "upgrade_id": upgrade_id,
            }))
            .await
            .unwrap();
        result["ready"].as_bool().unwrap()
    }

    async fn active(&self) -> Vec<UpgradeUuid> {
        let result =
            self.call("Upgrader", "ActiveUpgrades", json!({})).await.unwrap();
        serde_json::from_value(result["upgrade_ids"].clone()).unwrap()
    }

    async fn state(&self, upgrade_id: UpgradeUuid) -> String {
        let result = self
            .call("Upgrader", "UpgradeInfo", json!({
                "upgrade_id": upgrade_id
            }))
            .await
            .unwrap();
        result["state"].as_str().unwrap().to_string()
    }

    fn cleanup_successful(self) {
        self.logctx.cleanup_successful();
    }
}

#[tokio::test]
async fn test_upgrade_lifecycle() {
    let cx = TestServer::new(
        "test_upgrade_lifecycle",
        StartPolicy::CallerSequenced,
    );
    assert_eq!(
        cx.server.facade_ids(),
        vec![
            FacadeId::new("HighAvailability", 1),
            FacadeId::new("Upgrader", 1)
        ]
    );

    for id in ["c0", "c1", "c2"] {
        cx.add_controller(id).await;
    }
    let nodes = cx
        .call("HighAvailability", "ControllerNodes", json!({}))
        .await
        .unwrap();
    assert_eq!(nodes.as_array().unwrap().len(), 3);

    let upgrade_id = cx.create_upgrade("3.0.0", "3.0.1").await;
    assert_eq!(cx.active().await, vec![upgrade_id]);
    assert_eq!(cx.state(upgrade_id).await, "created");

    // The orchestrator polls readiness while controllers report in.
    for id in ["c0", "c1", "c2"] {
        assert!(!cx.all_ready(upgrade_id).await);
        cx.set_ready(upgrade_id, id).await;
    }
    assert!(cx.all_ready(upgrade_id).await);

    let readiness = cx
        .call("Upgrader", "ControllerReadiness", json!({
            "upgrade_id": upgrade_id
        }))
        .await
        .unwrap();
    let readiness = readiness.as_array().unwrap();
    assert_eq!(readiness.len(), 3);
    assert!(readiness.iter().all(|row| row["ready"] == json!(true)));

    cx.call("Upgrader", "StartUpgrade", json!({ "upgrade_id": upgrade_id }))
        .await
        .unwrap();
    assert_eq!(cx.state(upgrade_id).await, "started");
    assert_eq!(cx.active().await, vec![upgrade_id]);

    // Completion is signalled by a collaborator outside the facades.
    cx.store
        .finish_upgrade(upgrade_id, UpgradeOutcome::Completed)
        .await
        .unwrap();
    assert_eq!(cx.state(upgrade_id).await, "completed");
    assert!(cx.active().await.is_empty());

    cx.cleanup_successful();
}

#[tokio::test]
async fn test_require_all_ready_policy() {
    let cx = TestServer::new(
        "test_require_all_ready_policy",
        StartPolicy::RequireAllReady,
    );
    cx.add_controller("c0").await;
    cx.add_controller("c1").await;
    let upgrade_id = cx.create_upgrade("3.0.0", "3.1.0").await;
    cx.set_ready(upgrade_id, "c0").await;

    let error = cx
        .call("Upgrader", "StartUpgrade", json!({ "upgrade_id": upgrade_id }))
        .await
        .unwrap_err();
    assert_matches!(error, Error::InvalidRequest { .. });
    assert_eq!(cx.state(upgrade_id).await, "created");

    cx.set_ready(upgrade_id, "c1").await;
    cx.call("Upgrader", "StartUpgrade", json!({ "upgrade_id": upgrade_id }))
        .await
        .unwrap();
    assert_eq!(cx.state(upgrade_id).await, "started");

    cx.cleanup_successful();
}

#[tokio::test]
async fn test_facade_errors() {
    let cx =
        TestServer::new("test_facade_errors", StartPolicy::CallerSequenced);

    // Downgrades are rejected before anything is recorded.
    let error = cx
        .call("Upgrader", "CreateUpgrade", json!({
            "from_version": "3.0.1",
            "to_version": "3.0.0",
        }))
        .await
        .unwrap_err();
    assert_matches!(error, Error::InvalidRequest { .. });
    assert!(cx.active().await.is_empty());

    // Malformed params.
    let error = cx
        .call("Upgrader", "CreateUpgrade", json!({
            "from_version": "three",
            "to_version": "3.0.0",
        }))
        .await
        .unwrap_err();
    assert_matches!(
        error,
        Error::InvalidRequest { ref message }
            if message.starts_with("invalid params for CreateUpgrade")
    );

    // Unknown method.
    let error =
        cx.call("Upgrader", "Downgrade", json!({})).await.unwrap_err();
    assert_eq!(
        error,
        Error::invalid_request("unknown method Upgrader.Downgrade")
    );

    // Unknown facade or version.
    let error = cx
        .server
        .call(&cx.opctx, "Upgrader", 2, "ActiveUpgrades", json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        Error::ObjectNotFound {
            type_name: ResourceType::Facade,
            lookup_type: LookupType::ByName("Upgrader v2".to_string()),
        }
    );

    // Unknown upgrade and controller both surface as not found.
    let upgrade_id = UpgradeUuid::new_v4();
    let error = cx
        .call("Upgrader", "StartUpgrade", json!({ "upgrade_id": upgrade_id }))
        .await
        .unwrap_err();
    assert_matches!(
        error,
        Error::ObjectNotFound { type_name: ResourceType::Upgrade, .. }
    );
    cx.add_controller("c0").await;
    let error = cx
        .call("Upgrader", "SetControllerReady", json!({
            "upgrade_id": upgrade_id,
            "controller_id": "c0",
        }))
        .await
        .unwrap_err();
    assert_matches!(
        error,
        Error::ObjectNotFound { type_name: ResourceType::Upgrade, .. }
    );
    let real_upgrade = cx.create_upgrade("3.0.0", "3.0.1").await;
    let error = cx
        .call("Upgrader", "SetControllerReady", json!({
            "upgrade_id": real_upgrade,
            "controller_id": "c7",
        }))
        .await
        .unwrap_err();
    assert_eq!(
        error,
        Error::not_found_by_name(ResourceType::ControllerNode, "c7")
    );

    cx.cleanup_successful();
}

#[tokio::test]
async fn test_from_config() {
    let logctx = dev::test_setup_log("test_from_config");
    let store = Arc::new(InMemoryStore::new(&logctx.log));
    let server = ServerContext::from_config(
        &config(StartPolicy::RequireAllReady),
        store,
    )
    .unwrap();
    assert_eq!(
        server.coordinator.start_policy(),
        StartPolicy::RequireAllReady
    );
    assert!(server.facade("HighAvailability", 1).is_ok());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_shutdown_cancels_requests() {
    let cx = TestServer::new(
        "test_shutdown_cancels_requests",
        StartPolicy::CallerSequenced,
    );
    cx.store.set_latency(Some(Duration::from_secs(60)));

    let opctx = cx.server.opctx();
    let (result, ()) = tokio::join!(
        cx.server.call(&opctx, "Upgrader", 1, "ActiveUpgrades", json!({})),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cx.server.shutdown();
        },
    );
    assert_matches!(result, Err(Error::Cancelled { .. }));

    // Contexts handed out after shutdown start out cancelled.
    cx.store.set_latency(None);
    let error = cx
        .server
        .call(&cx.server.opctx(), "Upgrader", 1, "ActiveUpgrades", json!({}))
        .await
        .unwrap_err();
    assert_matches!(error, Error::Cancelled { .. });

    // Contexts not derived from the server are unaffected.
    assert!(cx.active().await.is_empty());

    cx.cleanup_successful();
}
