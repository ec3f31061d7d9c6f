// Copyright 2025 Frost Engine Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Distributed threshold Schnorr signing over secp256k1, built on FROST.
//!
//! A dynamic group of signing nodes jointly generates a shared public key
//! through a three-round DKG; any t-of-N subset can then produce a
//! standard Schnorr signature without any party ever holding the private
//! key. The crate contains the protocol engine only: the cryptographic
//! primitives ([`crypto`]), the per-node state machine ([`node`]) and the
//! aggregator-side session orchestration ([`coordinator`]). Transport,
//! peer discovery, persistence and application validation are seams the
//! host environment implements ([`transport`], [`data_manager`],
//! [`validator`]).

/// Aggregator-side session orchestration
pub mod coordinator;
/// Cryptographic primitives used by nodes and the aggregator
pub mod crypto;
/// Persistence seam for nonces and key shares
pub mod data_manager;
/// Tracing subscriber setup
pub mod logging;
/// Per-node protocol engine
pub mod node;
/// Engine tunables
pub mod settings;
/// Peer-to-peer transport seams
pub mod transport;
/// Application validation seams
pub mod validator;
/// Wire protocol
pub mod wire;

#[cfg(test)]
mod helpers;

pub use coordinator::{GroupKeyInfo, SessionCoordinator};
pub use crypto::{NodeId, Point, Rng, Scalar};
pub use node::{KeyShare, NodeEngine};
pub use settings::Settings;
