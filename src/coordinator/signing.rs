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

//! Signing session orchestration: signer selection against the nonce
//! buffer, parallel sign requests, per-partial verification and final
//! aggregation into a group signature.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::{
	crypto::{frost, schnorr, NodeId, Scalar},
	validator::ValidatedInput,
	wire::{Request, RequestPayload, ResponsePayload, SignParameters},
};

use super::{reputation::PeerOutcome, GroupKeyInfo, PeerReply, SessionCoordinator, SigningError};

/// A completed signing session: the aggregated signature and the
/// validator's view of what was signed.
#[derive(Debug, Clone)]
pub struct SignOutcome {
	pub signature: schnorr::Signature,
	pub message: ValidatedInput,
}

impl SessionCoordinator {
	pub async fn run_signing(
		&self,
		key: &GroupKeyInfo,
		signer_count: usize,
		input_data: Vec<u8>,
	) -> Result<SignOutcome, SigningError> {
		let validated = self.validator.validate(&input_data)?;
		let threshold = key.threshold as usize;
		let want = signer_count.max(threshold).min(key.party.len());

		let available = self.available_peers(key.party.iter().copied());
		if available.len() < threshold {
			return Err(SigningError::InsufficientQuorum {
				available: available.len(),
				threshold: key.threshold,
			})
		}

		let commitments_list = self.select_signers_with_nonces(&available, want, threshold).await?;
		let signers: BTreeSet<NodeId> = commitments_list.keys().copied().collect();

		info!(
			dkg_id = key.dkg_id.as_str(),
			signers = signers.len(),
			"dispatching signing session"
		);

		// Recompute everything the signers will: the bindings, the
		// aggregated nonce and the challenge. Responses are verified
		// against these, not against anything peers report.
		let message: &[u8] = &validated.digest;
		let bindings = frost::binding_values(message, &commitments_list);
		let aggregated_nonce = frost::aggregate_nonce(&commitments_list, &bindings)?;
		let challenge =
			schnorr::signature_challenge(&aggregated_nonce, &key.public_key, message);

		let request = Request::new(
			&key.dkg_id,
			RequestPayload::Sign(SignParameters {
				dkg_id: key.dkg_id.clone(),
				commitments_list: commitments_list.clone(),
				input_data,
			}),
		);
		let replies = self.broadcast_request(signers.iter().copied(), &request).await;

		let mut responses: BTreeMap<NodeId, Scalar> = BTreeMap::new();
		let mut reported: BTreeSet<NodeId> = BTreeSet::new();
		for (peer, reply) in replies {
			match reply {
				PeerReply::Response(ResponsePayload::Sign(response)) => {
					let lambda = frost::lagrange_coefficient(&peer, &signers)?;
					let valid = response.signature_data.id == peer &&
						response.data == validated.canonical &&
						response.signature_data.aggregated_public_nonce == aggregated_nonce &&
						frost::verify_partial_signature(
							&response.signature_data.z,
							&commitments_list[&peer],
							&bindings[&peer],
							&lambda,
							&challenge,
							&key.public_shares[&peer],
						);

					if valid {
						responses.insert(peer, response.signature_data.z);
					} else {
						warn!(%peer, "partial signature failed verification");
						self.penalize(peer, PeerOutcome::Malicious);
						reported.insert(peer);
					}
				},
				reply => self.penalize_failure(peer, &reply, "sign"),
			}
		}

		if responses.len() < threshold {
			return Err(SigningError::InsufficientQuorum {
				available: responses.len(),
				threshold: key.threshold,
			})
		}
		if !reported.is_empty() {
			return Err(SigningError::InvalidPartialSignatures(reported))
		}
		// Responses are bound to the full signer set through the Lagrange
		// coefficients, so a quorum of partials with any signer missing
		// still cannot be aggregated
		if responses.len() < signers.len() {
			return Err(SigningError::IncompleteSigningSession {
				responded: responses.len(),
				expected: signers.len(),
			})
		}

		let z = frost::aggregate_responses(responses.into_values());
		let signature = schnorr::Signature { r: aggregated_nonce, z };

		if !schnorr::verify_signature(&key.public_key, message, &signature) {
			return Err(SigningError::GroupSignatureInvalid)
		}

		info!(dkg_id = key.dkg_id.as_str(), "signing session complete");

		Ok(SignOutcome { signature, message: validated })
	}

	/// Pick `want` signers that all have a buffered nonce commitment,
	/// re-selecting around peers whose buffers stay empty. Fails with
	/// `NonceMissing` once the bounded retries are exhausted; no sign
	/// request has been sent by then.
	async fn select_signers_with_nonces(
		&self,
		available: &[NodeId],
		want: usize,
		threshold: usize,
	) -> Result<BTreeMap<NodeId, frost::NonceCommitments>, SigningError> {
		let retries = self.settings.coordinator.nonce_retries;
		let wait = self.settings.coordinator.nonce_wait();

		let mut starved: BTreeSet<NodeId> = BTreeSet::new();

		for _attempt in 0..retries {
			let candidates: Vec<NodeId> = available
				.iter()
				.filter(|peer| !starved.contains(*peer))
				.take(want)
				.copied()
				.collect();
			if candidates.len() < threshold {
				break
			}

			let mut popped: BTreeMap<NodeId, frost::NonceCommitments> = BTreeMap::new();
			let mut empty_peer = None;
			for peer in &candidates {
				match self.nonce_buffer.pop_with_wait(peer, wait).await {
					Some(commitments) => {
						popped.insert(*peer, commitments);
					},
					None => {
						empty_peer = Some(*peer);
						break
					},
				}
			}

			match empty_peer {
				None => return Ok(popped),
				Some(peer) => {
					// Nonce starvation is unavailability, not misbehavior;
					// the peer is skipped, not penalized
					warn!(%peer, "no buffered nonce commitment, re-selecting signers");
					for (restored_peer, commitments) in popped {
						self.nonce_buffer.restore(restored_peer, commitments);
					}
					starved.insert(peer);
				},
			}
		}

		Err(SigningError::NonceMissing { retries })
	}
}
