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

//! DKG session orchestration: seeded party selection, the three protocol
//! rounds fanned out in parallel, complaint resolution and assembly of the
//! final group key descriptor.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use rand::{seq::SliceRandom, SeedableRng};
use tracing::{info, warn};

use crate::{
	crypto::{
		dleq::{resolve_complaint, ComplaintProof, ComplaintVerdict},
		schnorr::Signature,
		NodeId, Point, Rng,
	},
	validator::Seed,
	wire::{
		Request, RequestPayload, ResponsePayload, Round1Parameters, Round1Response,
		Round2Parameters, Round2Response, Round3Data, Round3Parameters, Round3Response,
	},
};

use super::{
	random_request_id, reputation::PeerOutcome, DkgError, GroupKeyInfo, PeerReply,
	SessionCoordinator,
};

#[derive(Debug, Clone)]
pub struct DkgParams {
	pub threshold: u32,
	/// Desired party size; the actual party may end up smaller after the
	/// reputation filter and round 1 failures.
	pub party_size: usize,
	pub candidates: Vec<NodeId>,
	pub app_name: String,
	/// Must validate against the seed oracle before any peer is contacted.
	pub seed: Seed,
}

impl SessionCoordinator {
	pub async fn run_dkg(&self, params: DkgParams) -> Result<GroupKeyInfo, DkgError> {
		let DkgParams { threshold, party_size, candidates, app_name, seed } = params;

		if !self.seed_oracle.validate(seed) {
			return Err(DkgError::InvalidSeed)
		}

		// Deterministic subset: re-running the selection with the same seed
		// over the same candidates yields the same party
		let mut selection_rng = Rng::seed_from_u64(seed);
		let selected: Vec<NodeId> =
			candidates.choose_multiple(&mut selection_rng, party_size).copied().collect();

		let party = self.available_peers(selected);
		if party.len() < threshold as usize {
			return Err(DkgError::InsufficientQuorum { available: party.len(), threshold })
		}

		let dkg_id = random_request_id();
		info!(
			dkg_id = dkg_id.as_str(),
			threshold,
			party_size = party.len(),
			app_name = app_name.as_str(),
			"starting DKG session"
		);

		// Round 1
		let round1_request = Request::new(
			&dkg_id,
			RequestPayload::Round1(Round1Parameters {
				party: party.clone(),
				dkg_id: dkg_id.clone(),
				app_name,
				threshold,
			}),
		);
		let replies = self.broadcast_request(party.iter().copied(), &round1_request).await;

		let mut round1: BTreeMap<NodeId, Round1Response> = BTreeMap::new();
		for (peer, reply) in replies {
			match reply {
				PeerReply::Response(ResponsePayload::Round1(response)) => {
					if response.broadcast.sender_id == peer &&
						self.verify_peer_signature(
							&peer,
							&response.broadcast.signable_bytes(),
							&response.validation_sig,
						) {
						round1.insert(peer, response);
					} else {
						warn!(%peer, "round 1 broadcast failed long-term signature verification");
						self.penalize(peer, PeerOutcome::Malicious);
					}
				},
				reply => self.penalize_failure(peer, &reply, "round1"),
			}
		}

		if round1.len() < threshold as usize {
			return Err(DkgError::InsufficientQuorum { available: round1.len(), threshold })
		}
		let survivors: Vec<NodeId> = round1.keys().copied().collect();
		if survivors.len() < party.len() {
			info!(
				dkg_id = dkg_id.as_str(),
				dropped = party
					.iter()
					.filter(|peer| !round1.contains_key(*peer))
					.join(", ")
					.as_str(),
				"continuing round 2 with the round 1 survivors"
			);
		}

		// Round 2: every survivor gets everyone's round 1 broadcast and
		// answers with ciphertexts addressed to each other survivor
		let round2_request = Request::new(
			&dkg_id,
			RequestPayload::Round2(Round2Parameters {
				dkg_id: dkg_id.clone(),
				broadcasted_data: round1.clone(),
			}),
		);
		let replies = self.broadcast_request(survivors.iter().copied(), &round2_request).await;

		let mut round2: BTreeMap<NodeId, Round2Response> = BTreeMap::new();
		let mut round2_failures = BTreeSet::new();
		for (peer, reply) in replies {
			match reply {
				PeerReply::Response(ResponsePayload::Round2(response)) => {
					round2.insert(peer, response);
				},
				reply => {
					self.penalize_failure(peer, &reply, "round2");
					round2_failures.insert(peer);
				},
			}
		}

		// Each round 1 survivor's dealt shares are a structural part of
		// every other node's final share, so a dropout here leaves the
		// session unfinishable; the caller may retry with a narrowed party
		if !round2_failures.is_empty() {
			return Err(DkgError::PeersFailed { round: "round2", peers: round2_failures })
		}

		// Round 3: route to each peer exactly the ciphertexts addressed
		// to it
		let requests: Vec<(NodeId, Request)> = survivors
			.iter()
			.map(|peer| {
				let send_data = round2
					.values()
					.flat_map(|response| response.broadcast.iter())
					.filter(|share| share.receiver_id == *peer)
					.cloned()
					.collect();
				(
					*peer,
					Request::new(
						&dkg_id,
						RequestPayload::Round3(Round3Parameters {
							dkg_id: dkg_id.clone(),
							send_data,
						}),
					),
				)
			})
			.collect();
		let replies = self.scatter_requests(requests).await;

		let mut results: BTreeMap<NodeId, (Round3Data, Signature)> = BTreeMap::new();
		let mut reported: BTreeSet<NodeId> = BTreeSet::new();
		for (peer, reply) in replies {
			match reply {
				PeerReply::Response(ResponsePayload::Round3(Round3Response::Successful {
					data,
					validation_sig,
				})) => {
					if self.verify_peer_signature(
						&peer,
						&data.signable_bytes(),
						&validation_sig,
					) {
						results.insert(peer, (data, validation_sig));
					} else {
						warn!(%peer, "round 3 result failed long-term signature verification");
						self.penalize(peer, PeerOutcome::Malicious);
					}
				},
				PeerReply::Response(ResponsePayload::Round3(Round3Response::Complaint {
					proofs,
				})) => {
					for proof in proofs {
						let at_fault = self.resolve_dkg_complaint(&peer, &proof, &round1, &round2);
						warn!(
							accuser = %proof.accuser,
							accused = %proof.accused,
							at_fault = %at_fault,
							"complaint resolved"
						);
						self.penalize(at_fault, PeerOutcome::Malicious);
						reported.insert(at_fault);
					}
				},
				reply => self.penalize_failure(peer, &reply, "round3"),
			}
		}

		if !reported.is_empty() {
			return Err(DkgError::ComplaintUpheld { reported })
		}
		if results.len() < threshold as usize {
			return Err(DkgError::InsufficientQuorum { available: results.len(), threshold })
		}

		// All round 3 responses must report the same group key; a minority
		// disagreeing with the rest is reported as malicious
		let mut key_counts: BTreeMap<Point, usize> = BTreeMap::new();
		for (data, _) in results.values() {
			*key_counts.entry(data.dkg_public_key).or_default() += 1;
		}
		if key_counts.len() > 1 {
			let majority_key = key_counts
				.iter()
				.max_by_key(|(_, count)| **count)
				.map(|(key, _)| *key)
				.expect("at least one key is present");
			for (peer, (data, _)) in &results {
				if data.dkg_public_key != majority_key {
					warn!(%peer, "group key disagrees with the majority");
					self.penalize(*peer, PeerOutcome::Malicious);
				}
			}
			return Err(DkgError::GroupKeyDisagreement)
		}
		let public_key = results.values().next().expect("quorum checked above").0.dkg_public_key;

		info!(
			dkg_id = dkg_id.as_str(),
			party_size = results.len(),
			public_key = hex::encode(public_key.as_bytes()).as_str(),
			"DKG session complete"
		);

		Ok(GroupKeyInfo {
			dkg_id,
			public_key,
			public_shares: results
				.iter()
				.map(|(peer, (data, _))| (*peer, data.public_share))
				.collect(),
			party: results.keys().copied().collect(),
			threshold,
			validations: results
				.into_iter()
				.map(|(peer, (_, validation_sig))| (peer, validation_sig))
				.collect(),
		})
	}

	/// Decide who a complaint reports. A complaint that cannot be checked
	/// (unknown parties, no matching ciphertext, accuser naming someone
	/// else as the victim) reports the peer who raised it.
	fn resolve_dkg_complaint(
		&self,
		complaining_peer: &NodeId,
		proof: &ComplaintProof,
		round1: &BTreeMap<NodeId, Round1Response>,
		round2: &BTreeMap<NodeId, Round2Response>,
	) -> NodeId {
		if proof.accuser != *complaining_peer {
			return *complaining_peer
		}

		let (Some(accuser_round1), Some(accused_round1)) =
			(round1.get(&proof.accuser), round1.get(&proof.accused))
		else {
			return *complaining_peer
		};

		let Some(sealed) = round2.get(&proof.accused).and_then(|response| {
			response.broadcast.iter().find(|share| share.receiver_id == proof.accuser)
		}) else {
			return *complaining_peer
		};

		match resolve_complaint(
			proof,
			&accuser_round1.broadcast.encryption_key,
			&accused_round1.broadcast.encryption_key,
			&accused_round1.broadcast.commitments,
			&sealed.ciphertext,
		) {
			ComplaintVerdict::AccusedAtFault => proof.accused,
			ComplaintVerdict::AccuserAtFault => proof.accuser,
		}
	}
}
