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

//! Aggregator-side orchestration: drives DKG sessions round by round,
//! dispatches signing sessions against buffered nonce commitments,
//! verifies everything peers return and keeps the reputation book.

pub mod dkg;
pub mod nonce_buffer;
pub mod reputation;
pub mod signing;


use std::{
	collections::{BTreeMap, BTreeSet},
	sync::{Arc, Mutex},
};

use futures::future::join_all;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::{
	crypto::{schnorr::Signature, CryptoError, NodeId, Point, Rng},
	settings::Settings,
	transport::{NodeDirectory, Transport, TransportError},
	validator::{AppValidator, SeedOracle, ValidationError},
	wire::{DkgId, Request, ResponsePayload},
};

use self::{nonce_buffer::NonceBuffer, reputation::{PeerOutcome, ReputationBook}};

/// The aggregator's description of a finalized distributed key. Contains
/// no secret material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupKeyInfo {
	pub dkg_id: DkgId,
	/// The group public key Y.
	pub public_key: Point,
	/// Y_i per party member, as reported and signed in round 3.
	pub public_shares: BTreeMap<NodeId, Point>,
	pub party: BTreeSet<NodeId>,
	pub threshold: u32,
	/// Long-term signatures over each member's round 3 result.
	pub validations: BTreeMap<NodeId, Signature>,
}

#[derive(Error, Debug)]
pub enum DkgError {
	#[error("selection seed rejected by the oracle")]
	InvalidSeed,
	#[error("insufficient quorum: {available} available parties of threshold {threshold}")]
	InsufficientQuorum { available: usize, threshold: u32 },
	#[error("peers failed during {round}: {peers:?}")]
	PeersFailed { round: &'static str, peers: BTreeSet<NodeId> },
	#[error("complaints resolved against {reported:?}")]
	ComplaintUpheld { reported: BTreeSet<NodeId> },
	#[error("group key disagreement across round 3 responses")]
	GroupKeyDisagreement,
}

#[derive(Error, Debug)]
pub enum SigningError {
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error("insufficient quorum: {available} valid signers of threshold {threshold}")]
	InsufficientQuorum { available: usize, threshold: u32 },
	#[error("no buffered nonces for a full signing party after {retries} attempts")]
	NonceMissing { retries: u32 },
	#[error("invalid partial signatures from {0:?}")]
	InvalidPartialSignatures(BTreeSet<NodeId>),
	#[error("only {responded} of {expected} signers produced valid partial signatures")]
	IncompleteSigningSession { responded: usize, expected: usize },
	#[error("aggregated signature failed group verification")]
	GroupSignatureInvalid,
	#[error(transparent)]
	Crypto(#[from] CryptoError),
}

/// What a single peer did with a single request.
#[derive(Debug)]
pub enum PeerReply {
	Response(ResponsePayload),
	Timeout,
	Error(String),
}

pub struct SessionCoordinator {
	transport: Arc<dyn Transport>,
	directory: Arc<dyn NodeDirectory>,
	seed_oracle: Arc<dyn SeedOracle>,
	validator: Arc<dyn AppValidator>,
	settings: Settings,
	reputation: Mutex<ReputationBook>,
	nonce_buffer: NonceBuffer,
	semaphore: Option<Arc<Semaphore>>,
}

impl SessionCoordinator {
	pub fn new(
		transport: Arc<dyn Transport>,
		directory: Arc<dyn NodeDirectory>,
		seed_oracle: Arc<dyn SeedOracle>,
		validator: Arc<dyn AppValidator>,
		settings: Settings,
	) -> Self {
		let semaphore = match settings.coordinator.max_concurrent_requests {
			0 => None,
			cap => Some(Arc::new(Semaphore::new(cap))),
		};

		SessionCoordinator {
			transport,
			directory,
			seed_oracle,
			validator,
			reputation: Mutex::new(ReputationBook::new(settings.penalties.clone())),
			nonce_buffer: NonceBuffer::default(),
			settings,
			semaphore,
		}
	}

	/// Current effective penalty score of a peer.
	pub fn reputation_score(&self, peer: &NodeId) -> f64 {
		self.reputation.lock().unwrap().score(peer)
	}

	pub fn buffered_nonces(&self, peer: &NodeId) -> usize {
		self.nonce_buffer.depth(peer)
	}

	pub(crate) fn penalize(&self, peer: NodeId, outcome: PeerOutcome) {
		self.reputation.lock().unwrap().record(peer, outcome);
	}

	pub(crate) fn available_peers<I: IntoIterator<Item = NodeId>>(&self, peers: I) -> Vec<NodeId> {
		self.reputation.lock().unwrap().filter_available(peers)
	}

	/// One request to one peer, under the concurrency bound and the
	/// per-request deadline.
	pub(crate) async fn send_request(&self, peer: NodeId, request: &Request) -> PeerReply {
		let _permit = match &self.semaphore {
			Some(semaphore) =>
				Some(semaphore.acquire().await.expect("semaphore is never closed")),
			None => None,
		};

		match self
			.transport
			.send(
				peer,
				request.protocol(),
				request.encode(),
				self.settings.coordinator.request_timeout(),
			)
			.await
		{
			Ok(bytes) => match ResponsePayload::decode(&bytes) {
				Ok(response) => PeerReply::Response(response),
				Err(error) => PeerReply::Error(format!("undecodable response: {error}")),
			},
			Err(TransportError::Timeout) => PeerReply::Timeout,
			Err(error) => PeerReply::Error(error.to_string()),
		}
	}

	/// The same request to every peer concurrently. The scope does not
	/// return until every per-peer future has resolved or hit its
	/// deadline; a late response is never observed.
	pub(crate) async fn broadcast_request<I: IntoIterator<Item = NodeId>>(
		&self,
		peers: I,
		request: &Request,
	) -> BTreeMap<NodeId, PeerReply> {
		join_all(
			peers
				.into_iter()
				.map(|peer| async move { (peer, self.send_request(peer, request).await) }),
		)
		.await
		.into_iter()
		.collect()
	}

	/// Per-peer requests (differing payloads), fanned out the same way.
	pub(crate) async fn scatter_requests(
		&self,
		requests: Vec<(NodeId, Request)>,
	) -> BTreeMap<NodeId, PeerReply> {
		join_all(requests.into_iter().map(|(peer, request)| async move {
			(peer, self.send_request(peer, &request).await)
		}))
		.await
		.into_iter()
		.collect()
	}

	/// Apply the penalty policy to a failed reply and log it.
	pub(crate) fn penalize_failure(&self, peer: NodeId, reply: &PeerReply, round: &'static str) {
		match reply {
			PeerReply::Timeout => {
				warn!(%peer, round, "peer timed out");
				self.penalize(peer, PeerOutcome::Timeout);
			},
			PeerReply::Error(reason) => {
				warn!(%peer, round, reason = reason.as_str(), "peer errored");
				self.penalize(peer, PeerOutcome::Error);
			},
			PeerReply::Response(response) => {
				warn!(%peer, round, status = %response.status(), "peer returned a failure");
				self.penalize(peer, PeerOutcome::Error);
			},
		}
	}

	pub(crate) fn verify_peer_signature(
		&self,
		peer: &NodeId,
		message: &[u8],
		signature: &Signature,
	) -> bool {
		match self.directory.lookup(peer) {
			Some(info) =>
				crate::crypto::schnorr::verify_signature(&info.long_term_public_key, message, signature),
			None => false,
		}
	}
}

pub(crate) fn random_request_id() -> String {
	let mut bytes = [0u8; 16];
	Rng::from_entropy().fill_bytes(&mut bytes);
	hex::encode(bytes)
}
