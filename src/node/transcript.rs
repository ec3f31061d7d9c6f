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

//! Per-session DKG transcript, tagged by phase so that secret material only
//! exists in the phases that own it. The secret polynomial and the
//! ephemeral decryption scalar are zeroized when their state is dropped,
//! which happens on every transition out of the phase holding them.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
	crypto::{polynomial::{CoefficientCommitments, SharingPolynomial}, NodeId, Point, Scalar},
	wire::DkgId,
};

#[derive(Debug, Clone)]
pub struct SessionInfo {
	pub dkg_id: DkgId,
	pub app_name: String,
	pub threshold: u32,
	pub party: BTreeSet<NodeId>,
}

/// Round 1 has run: we hold our sharing polynomial and the ephemeral
/// decryption key, and have broadcast their public counterparts.
pub struct Round1State {
	pub info: SessionInfo,
	pub polynomial: SharingPolynomial,
	pub ephemeral_secret: Scalar,
}

/// Round 2 has run: peers' broadcasts are verified and our shares are out.
pub struct Round2State {
	pub info: SessionInfo,
	pub polynomial: SharingPolynomial,
	pub ephemeral_secret: Scalar,
	/// Peers whose round-1 proofs checked out, plus ourselves.
	pub qualified: BTreeSet<NodeId>,
	pub peer_commitments: BTreeMap<NodeId, CoefficientCommitments>,
	pub peer_encryption_keys: BTreeMap<NodeId, Point>,
}

pub enum DkgTranscript {
	Round1Done(Round1State),
	Round2Done(Round2State),
	/// The finalized key share lives in the node's key table.
	Done,
	Aborted,
}

impl DkgTranscript {
	pub fn phase_name(&self) -> &'static str {
		match self {
			DkgTranscript::Round1Done(_) => "round1-done",
			DkgTranscript::Round2Done(_) => "round2-done",
			DkgTranscript::Done => "done",
			DkgTranscript::Aborted => "aborted",
		}
	}
}
