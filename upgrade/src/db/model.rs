// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Records kept by an [`UpgradeStore`](super::UpgradeStore)

use chrono::DateTime;
use chrono::Utc;
use semver::Version;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identifies an [`UpgradeRecord`]
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct UpgradeUuid(Uuid);

impl UpgradeUuid {
    pub fn new_v4() -> UpgradeUuid {
        UpgradeUuid(Uuid::new_v4())
    }

    pub fn into_untyped_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UpgradeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies a controller node in the fleet
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct ControllerId(String);

impl ControllerId {
    pub fn new(id: impl Into<String>) -> ControllerId {
        ControllerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ControllerId {
    fn from(id: &str) -> Self {
        ControllerId::new(id)
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of an upgrade
///
/// ```text
/// Created --start--> Started --finish--> Completed
///                           \--finish--> Aborted
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeState {
    Created,
    Started,
    Completed,
    Aborted,
}

impl UpgradeState {
    /// Terminal upgrades are never reopened and are not "active".
    pub fn is_terminal(&self) -> bool {
        match self {
            UpgradeState::Created | UpgradeState::Started => false,
            UpgradeState::Completed | UpgradeState::Aborted => true,
        }
    }
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpgradeState::Created => "created",
            UpgradeState::Started => "started",
            UpgradeState::Completed => "completed",
            UpgradeState::Aborted => "aborted",
        })
    }
}

/// How a started upgrade ended
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeOutcome {
    Completed,
    Aborted,
}

impl From<UpgradeOutcome> for UpgradeState {
    fn from(outcome: UpgradeOutcome) -> Self {
        match outcome {
            UpgradeOutcome::Completed => UpgradeState::Completed,
            UpgradeOutcome::Aborted => UpgradeState::Aborted,
        }
    }
}

/// One fleet-wide version transition attempt
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UpgradeRecord {
    pub id: UpgradeUuid,
    pub from_version: Version,
    pub to_version: Version,
    pub state: UpgradeState,
    pub time_created: DateTime<Utc>,
    pub time_started: Option<DateTime<Utc>>,
    pub time_finished: Option<DateTime<Utc>>,
}

impl UpgradeRecord {
    pub fn new(from_version: Version, to_version: Version) -> UpgradeRecord {
        UpgradeRecord {
            id: UpgradeUuid::new_v4(),
            from_version,
            to_version,
            state: UpgradeState::Created,
            time_created: Utc::now(),
            time_started: None,
            time_finished: None,
        }
    }
}

/// A member of the controller fleet
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ControllerNode {
    pub id: ControllerId,
    pub time_added: DateTime<Utc>,
}

/// Whether one controller has confirmed it is prepared for one upgrade
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ControllerReadiness {
    pub upgrade_id: UpgradeUuid,
    pub controller_id: ControllerId,
    pub ready: bool,
    pub time_ready: Option<DateTime<Utc>>,
}

impl ControllerReadiness {
    pub fn unready(
        upgrade_id: UpgradeUuid,
        controller_id: ControllerId,
    ) -> ControllerReadiness {
        ControllerReadiness {
            upgrade_id,
            controller_id,
            ready: false,
            time_ready: None,
        }
    }
}

/// Returns true if moving from `from` to `to` is an upgrade
///
/// Versions are compared by precedence: build metadata is ignored, so two
/// versions differing only in build metadata are considered equal.
pub fn version_is_upgrade(from: &Version, to: &Version) -> bool {
    (from.major, from.minor, from.patch, &from.pre)
        < (to.major, to.minor, to.patch, &to.pre)
}

#[cfg(test)]
mod test {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_is_upgrade() {
        assert!(version_is_upgrade(&v("3.0.0"), &v("3.0.1")));
        assert!(version_is_upgrade(&v("3.0.9"), &v("3.1.0")));
        assert!(version_is_upgrade(&v("2.9.42"), &v("3.0.0")));
        assert!(version_is_upgrade(&v("3.1.0-beta1"), &v("3.1.0")));

        assert!(!version_is_upgrade(&v("3.0.1"), &v("3.0.0")));
        assert!(!version_is_upgrade(&v("3.0.1"), &v("3.0.1")));
        assert!(!version_is_upgrade(&v("3.1.0"), &v("3.1.0-beta1")));
        assert!(!version_is_upgrade(&v("3.0.0+a"), &v("3.0.0+b")));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UpgradeState::Created.is_terminal());
        assert!(!UpgradeState::Started.is_terminal());
        assert!(UpgradeState::Completed.is_terminal());
        assert!(UpgradeState::Aborted.is_terminal());
        assert_eq!(
            UpgradeState::from(UpgradeOutcome::Aborted),
            UpgradeState::Aborted
        );
    }
}
