// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Store error vocabulary and its conversion to public errors

use super::model::UpgradeState;
use fleet_common::api::external::Error as PublicError;
use fleet_common::api::external::LookupType;
use fleet_common::api::external::ResourceType;

/// Low-level failures reported by an [`UpgradeStore`](super::UpgradeStore)
///
/// These mirror the vocabulary of a transactional database: constraint
/// violations, updates that matched no row, and transport trouble.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A row referenced a key that has no corresponding row.
    #[error(
        "foreign key violation: no {resource_type} matching {lookup_type:?}"
    )]
    ForeignKeyViolation {
        resource_type: ResourceType,
        lookup_type: LookupType,
    },
    /// A row failed a check constraint.
    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },
    /// An update or lookup matched no row.
    #[error("no matching row")]
    NoMatchingRow,
    /// A conditional state update found the row in another state.
    #[error("row is {current}, expected {expected}")]
    InvalidState { current: UpgradeState, expected: UpgradeState },
    /// A conditional start found controllers that have not reported ready.
    #[error("{unready} of {total} controllers have not reported ready")]
    NotReady { unready: usize, total: usize },
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Anything else.
    #[error("store error: {0}")]
    Internal(String),
}

/// Describes how a [`StoreError`] should be reported to the caller
pub enum ErrorHandler {
    /// The operation looked up a specific object; a missing row means that
    /// object was not found.
    NotFoundByLookup(ResourceType, LookupType),
    /// A missing row is unexpected and indicates a server problem.
    Server,
}

fn describe(resource_type: ResourceType, lookup_type: &LookupType) -> String {
    match lookup_type {
        LookupType::ByName(name) => format!("{} \"{}\"", resource_type, name),
        LookupType::ById(id) => format!("{} {}", resource_type, id),
    }
}

/// Converts a store error into a public error.
///
/// Referential integrity failures are always reported as `ObjectNotFound`
/// naming the missing side.  A missing row or state conflict is the caller's
/// problem only when the caller named the object; under
/// [`ErrorHandler::Server`] it is an `InternalError`.  Everything else the
/// caller can't correct passes through as `InternalError` or
/// `ServiceUnavailable`.
pub fn public_error_from_store(
    error: StoreError,
    handler: ErrorHandler,
) -> PublicError {
    match (error, handler) {
        (
            StoreError::ForeignKeyViolation { resource_type, lookup_type },
            _,
        ) => lookup_type.into_not_found(resource_type),
        (
            StoreError::NoMatchingRow,
            ErrorHandler::NotFoundByLookup(resource_type, lookup_type),
        ) => lookup_type.into_not_found(resource_type),
        (
            error @ (StoreError::NoMatchingRow
            | StoreError::InvalidState { .. }),
            ErrorHandler::Server,
        ) => PublicError::internal_error(&error.to_string()),
        (StoreError::CheckViolation { constraint }, _) => {
            PublicError::invalid_request(format!(
                "check constraint violated: {}",
                constraint
            ))
        }
        (
            StoreError::InvalidState { current, expected },
            ErrorHandler::NotFoundByLookup(resource_type, lookup_type),
        ) => PublicError::invalid_request(format!(
            "{} is {}, expected {}",
            describe(resource_type, &lookup_type),
            current,
            expected
        )),
        (StoreError::NotReady { unready, total }, _) => {
            PublicError::invalid_request(format!(
                "{} of {} controllers have not reported ready",
                unready, total
            ))
        }
        (StoreError::Unavailable(message), _) => PublicError::unavail(&message),
        (StoreError::Internal(message), _) => {
            PublicError::internal_error(&message)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    #[test]
    fn test_foreign_key_maps_to_not_found() {
        let error = public_error_from_store(
            StoreError::ForeignKeyViolation {
                resource_type: ResourceType::ControllerNode,
                lookup_type: LookupType::ByName("c9".to_string()),
            },
            ErrorHandler::Server,
        );
        assert_matches!(
            error,
            PublicError::ObjectNotFound {
                type_name: ResourceType::ControllerNode,
                lookup_type: LookupType::ByName(name),
            } if name == "c9"
        );
    }

    #[test]
    fn test_no_matching_row() {
        let id = Uuid::new_v4();
        let error = public_error_from_store(
            StoreError::NoMatchingRow,
            ErrorHandler::NotFoundByLookup(
                ResourceType::Upgrade,
                LookupType::ById(id),
            ),
        );
        assert_eq!(
            error,
            PublicError::not_found_by_id(ResourceType::Upgrade, &id)
        );

        let error = public_error_from_store(
            StoreError::NoMatchingRow,
            ErrorHandler::Server,
        );
        assert_eq!(error, PublicError::internal_error("no matching row"));
    }

    #[test]
    fn test_invalid_state_names_object() {
        let id = Uuid::new_v4();
        let error = public_error_from_store(
            StoreError::InvalidState {
                current: UpgradeState::Started,
                expected: UpgradeState::Created,
            },
            ErrorHandler::NotFoundByLookup(
                ResourceType::Upgrade,
                LookupType::ById(id),
            ),
        );
        assert_eq!(
            error,
            PublicError::invalid_request(format!(
                "upgrade {} is started, expected created",
                id
            ))
        );

        // Without an object to name, a state conflict is a server bug.
        let error = public_error_from_store(
            StoreError::InvalidState {
                current: UpgradeState::Completed,
                expected: UpgradeState::Started,
            },
            ErrorHandler::Server,
        );
        assert_eq!(
            error,
            PublicError::internal_error("row is completed, expected started")
        );
        assert!(!error.retryable());
    }

    #[test]
    fn test_transport_errors_pass_through() {
        let error = public_error_from_store(
            StoreError::Unavailable("connection reset".to_string()),
            ErrorHandler::Server,
        );
        assert_eq!(error, PublicError::unavail("connection reset"));
        assert!(error.retryable());

        let error = public_error_from_store(
            StoreError::Internal("serialization failure".to_string()),
            ErrorHandler::NotFoundByLookup(
                ResourceType::Upgrade,
                LookupType::ById(Uuid::new_v4()),
            ),
        );
        assert_eq!(error, PublicError::internal_error("serialization failure"));
    }
}
