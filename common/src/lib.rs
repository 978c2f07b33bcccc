// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Fleet upgrade control plane
//!
//! This crate implements common facilities used across the fleet upgrade
//! control plane: chiefly the error taxonomy every operation reports through.
//! Other top-level crates implement the pieces of the control plane (e.g.,
//! `fleet_upgrade` for the upgrade coordinator and `fleet_apiserver` for the
//! facade layer).

pub mod api;
