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

//! The per-node protocol engine: DKG round handlers, nonce generation and
//! the signing handler. Every inbound request is authenticated by the
//! transport and gated by the host's authorization predicate before any
//! handler runs.

pub mod nonce_store;
pub mod transcript;

#[cfg(test)]
mod tests;

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::{
	crypto::{
		dleq::{self, ComplaintProof, DealtShare},
		encryption, frost,
		polynomial::{verify_share, SharingPolynomial},
		schnorr, CryptoError, NodeId, Point, Rng, Scalar,
	},
	data_manager::DataManager,
	settings::NodeSettings,
	transport::{AuthorizationPredicate, NodeDirectory, RequestHandler},
	validator::{AppValidator, ValidationError},
	wire::{
		DkgId, EncryptedShare, GenerateNoncesParameters, NoncesResponse, Request, RequestPayload,
		ResponsePayload, Round1Broadcast, Round1Parameters, Round1Response, Round2Parameters,
		Round2Response, Round3Data, Round3Parameters, Round3Response, SignParameters, SignResponse,
		SignatureData, Status,
	},
};

use self::{
	nonce_store::NoncePool,
	transcript::{DkgTranscript, Round1State, Round2State, SessionInfo},
};

/// A node's finalized share of a distributed key. Immutable once created;
/// the secret scalar is zeroized when the value is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShare {
	pub dkg_id: DkgId,
	pub threshold: u32,
	pub party: BTreeSet<NodeId>,
	/// This node's secret share s_i.
	pub share: Scalar,
	/// The group public key Y.
	pub group_public_key: Point,
	/// Public shares Y_j for every party member, used to verify partial
	/// signatures without any secret material.
	pub public_shares: BTreeMap<NodeId, Point>,
}

#[derive(Error, Debug)]
pub enum HandlerError {
	#[error("node is not a member of the requested party")]
	NotInParty,
	#[error("invalid threshold {threshold} for party of size {party_size}")]
	InvalidThreshold { threshold: u32, party_size: usize },
	#[error("party member {0} has an unusable identifier")]
	UnusableIdentifier(NodeId),
	#[error("a session with this dkg_id is already active")]
	SessionAlreadyActive,
	#[error("no active session for this dkg_id")]
	UnknownSession,
	#[error("session is in phase {phase}")]
	PhaseMismatch { phase: &'static str },
	#[error("quorum lost: {qualified} qualified parties of threshold {threshold}")]
	InsufficientQuorum { qualified: usize, threshold: u32 },
	#[error("no round 2 share from {0}")]
	MissingShare(NodeId),
	#[error("round 2 share addressed to {0}, not to this node")]
	MisaddressedShare(NodeId),
	#[error("no key share stored for this dkg_id")]
	UnknownKey,
	#[error("own commitments absent from the signing request")]
	NotASigner,
	#[error("invalid signer set: {0}")]
	InvalidSignerSet(&'static str),
	#[error("nonce pair missing or already used")]
	NonceReuseOrMissing,
	#[error("nonce pool at capacity")]
	NoncePoolFull,
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error(transparent)]
	Crypto(#[from] CryptoError),
}

impl HandlerError {
	fn status(&self) -> Status {
		match self {
			// The application rejected the request; peers did nothing wrong
			HandlerError::Validation(_) => Status::Failed,
			_ => Status::Error,
		}
	}
}

struct NodeState {
	transcripts: HashMap<DkgId, DkgTranscript>,
	keys: HashMap<DkgId, KeyShare>,
	pool: NoncePool,
}

pub struct NodeEngine {
	id: NodeId,
	long_term_secret: Scalar,
	long_term_public: Point,
	directory: Arc<dyn NodeDirectory>,
	authorizer: Arc<dyn AuthorizationPredicate>,
	validator: Arc<dyn AppValidator>,
	data_manager: Arc<dyn DataManager>,
	max_nonce_pool: usize,
	// All handler work is synchronous (crypto does not suspend), so one
	// lock serializes same-session requests without ever blocking the
	// runtime across an await point.
	state: Mutex<NodeState>,
}

impl NodeEngine {
	pub fn new(
		long_term_secret: Scalar,
		directory: Arc<dyn NodeDirectory>,
		authorizer: Arc<dyn AuthorizationPredicate>,
		validator: Arc<dyn AppValidator>,
		data_manager: Arc<dyn DataManager>,
		settings: &NodeSettings,
	) -> Self {
		let long_term_public = Point::from_scalar(&long_term_secret);
		let id = NodeId::from_public_key(&long_term_public);

		let pool = NoncePool::from_pairs(data_manager.get_nonces());

		NodeEngine {
			id,
			long_term_secret,
			long_term_public,
			directory,
			authorizer,
			validator,
			data_manager,
			max_nonce_pool: settings.max_nonce_pool,
			state: Mutex::new(NodeState {
				transcripts: HashMap::new(),
				keys: HashMap::new(),
				pool,
			}),
		}
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	pub fn public_key(&self) -> Point {
		self.long_term_public
	}

	/// The finalized key share for a DKG, if this node holds one.
	pub fn key_share(&self, dkg_id: &str) -> Option<KeyShare> {
		let mut state = self.state.lock().unwrap();
		if let Some(key) = state.keys.get(dkg_id) {
			return Some(key.clone())
		}
		let key = self.data_manager.get_key(dkg_id)?;
		state.keys.insert(dkg_id.to_string(), key.clone());
		Some(key)
	}

	pub fn nonce_pool_size(&self) -> usize {
		self.state.lock().unwrap().pool.len()
	}

	/// Drop a key share, e.g. when the application retires a group key.
	pub fn discard_key(&self, dkg_id: &str) {
		self.state.lock().unwrap().keys.remove(dkg_id);
	}

	fn handle(&self, caller: NodeId, request: Request) -> Result<ResponsePayload, HandlerError> {
		let mut state = self.state.lock().unwrap();

		match request.payload {
			RequestPayload::Round1(params) => self.handle_round1(&mut state, params),
			RequestPayload::Round2(params) => self.handle_round2(&mut state, params),
			RequestPayload::Round3(params) => self.handle_round3(&mut state, params),
			RequestPayload::GenerateNonces(params) =>
				self.handle_generate_nonces(&mut state, caller, params),
			RequestPayload::Sign(params) => self.handle_sign(&mut state, params),
		}
	}

	fn handle_round1(
		&self,
		state: &mut NodeState,
		params: Round1Parameters,
	) -> Result<ResponsePayload, HandlerError> {
		let Round1Parameters { party, dkg_id, app_name, threshold } = params;
		let party: BTreeSet<NodeId> = party.into_iter().collect();

		if !party.contains(&self.id) {
			return Err(HandlerError::NotInParty)
		}
		if threshold < 1 || threshold as usize > party.len() {
			return Err(HandlerError::InvalidThreshold { threshold, party_size: party.len() })
		}
		// An identifier reducing to the zero scalar would have us evaluate
		// the sharing polynomial at zero
		if let Some(bad) = party.iter().find(|id| id.as_scalar().is_zero()) {
			return Err(HandlerError::UnusableIdentifier(*bad))
		}
		if state.transcripts.contains_key(&dkg_id) || state.keys.contains_key(&dkg_id) {
			return Err(HandlerError::SessionAlreadyActive)
		}

		let mut rng = Rng::from_entropy();

		let polynomial = SharingPolynomial::sample(&mut rng, threshold);
		let coefficient_pop = schnorr::pop_prove(&mut rng, &self.id, &dkg_id, polynomial.secret());

		let ephemeral_secret = Scalar::random(&mut rng);
		let encryption_key = Point::from_scalar(&ephemeral_secret);
		let encryption_pop = schnorr::pop_prove(&mut rng, &self.id, &dkg_id, &ephemeral_secret);

		let broadcast = Round1Broadcast {
			sender_id: self.id,
			commitments: polynomial.commitments(),
			coefficient_pop,
			encryption_key,
			encryption_pop,
		};
		let validation_sig =
			schnorr::sign_message(&mut rng, &self.long_term_secret, &broadcast.signable_bytes());

		let info = SessionInfo { dkg_id: dkg_id.clone(), app_name, threshold, party };
		debug!(
			dkg_id = dkg_id.as_str(),
			app_name = info.app_name.as_str(),
			parties = info.party.len(),
			"round 1 transcript created"
		);
		state.transcripts.insert(
			dkg_id,
			DkgTranscript::Round1Done(Round1State { info, polynomial, ephemeral_secret }),
		);

		Ok(ResponsePayload::Round1(Round1Response { broadcast, validation_sig }))
	}

	fn handle_round2(
		&self,
		state: &mut NodeState,
		params: Round2Parameters,
	) -> Result<ResponsePayload, HandlerError> {
		let Round2Parameters { dkg_id, broadcasted_data } = params;

		let round1 = match state.transcripts.remove(&dkg_id) {
			None => return Err(HandlerError::UnknownSession),
			Some(DkgTranscript::Round1Done(round1)) => round1,
			Some(other) => {
				let phase = other.phase_name();
				state.transcripts.insert(dkg_id, other);
				return Err(HandlerError::PhaseMismatch { phase })
			},
		};
		let Round1State { info, polynomial, ephemeral_secret } = round1;

		let mut peer_commitments = BTreeMap::new();
		let mut peer_encryption_keys = BTreeMap::new();

		for (peer_id, response) in &broadcasted_data {
			if *peer_id == self.id {
				continue
			}
			if !info.party.contains(peer_id) {
				warn!(from_id = %peer_id, "ignoring round 1 data from a non-member");
				continue
			}

			let broadcast = &response.broadcast;
			let valid = broadcast.sender_id == *peer_id &&
				broadcast.commitments.threshold() == info.threshold &&
				self.verify_peer_signature(
					peer_id,
					&broadcast.signable_bytes(),
					&response.validation_sig,
				) && schnorr::pop_verify(
				peer_id,
				&info.dkg_id,
				&broadcast.commitments.constant(),
				&broadcast.coefficient_pop,
			) && schnorr::pop_verify(
				peer_id,
				&info.dkg_id,
				&broadcast.encryption_key,
				&broadcast.encryption_pop,
			);

			if !valid {
				warn!(from_id = %peer_id, "excluding peer with invalid round 1 broadcast");
				continue
			}

			peer_commitments.insert(*peer_id, broadcast.commitments.clone());
			peer_encryption_keys.insert(*peer_id, broadcast.encryption_key);
		}

		let qualified: BTreeSet<NodeId> =
			peer_commitments.keys().copied().chain(std::iter::once(self.id)).collect();

		if qualified.len() < info.threshold as usize {
			let quorum = qualified.len();
			state.transcripts.insert(dkg_id, DkgTranscript::Aborted);
			return Err(HandlerError::InsufficientQuorum {
				qualified: quorum,
				threshold: info.threshold,
			})
		}

		let mut rng = Rng::from_entropy();
		let mut shares = Vec::with_capacity(peer_encryption_keys.len());
		for (peer_id, peer_encryption_key) in &peer_encryption_keys {
			let shared = encryption::shared_point(&ephemeral_secret, peer_encryption_key)?;
			let key = encryption::derive_symmetric_key(&shared);

			let dealt = DealtShare {
				receiver: *peer_id,
				share: polynomial.evaluate(&peer_id.as_scalar()),
			};
			let mut plaintext = bincode::serialize(&dealt).expect("serialization can't fail");
			let ciphertext = encryption::seal(&key, &plaintext, &mut rng);
			plaintext.zeroize();

			shares.push(EncryptedShare {
				sender_id: self.id,
				receiver_id: *peer_id,
				ciphertext,
			});
		}

		debug!(
			dkg_id = dkg_id.as_str(),
			qualified = qualified.len(),
			"round 2 shares distributed"
		);

		state.transcripts.insert(
			dkg_id,
			DkgTranscript::Round2Done(Round2State {
				info,
				polynomial,
				ephemeral_secret,
				qualified,
				peer_commitments,
				peer_encryption_keys,
			}),
		);

		Ok(ResponsePayload::Round2(Round2Response { broadcast: shares }))
	}

	fn handle_round3(
		&self,
		state: &mut NodeState,
		params: Round3Parameters,
	) -> Result<ResponsePayload, HandlerError> {
		let Round3Parameters { dkg_id, send_data } = params;

		let round2 = match state.transcripts.remove(&dkg_id) {
			None => return Err(HandlerError::UnknownSession),
			Some(DkgTranscript::Round2Done(round2)) => round2,
			Some(other) => {
				let phase = other.phase_name();
				state.transcripts.insert(dkg_id, other);
				return Err(HandlerError::PhaseMismatch { phase })
			},
		};
		let Round2State {
			info,
			polynomial,
			ephemeral_secret,
			qualified,
			peer_commitments,
			peer_encryption_keys,
		} = round2;

		let mut ciphertexts: BTreeMap<NodeId, &EncryptedShare> = BTreeMap::new();
		for share in &send_data {
			if share.receiver_id != self.id {
				state.transcripts.insert(dkg_id, DkgTranscript::Aborted);
				return Err(HandlerError::MisaddressedShare(share.receiver_id))
			}
			ciphertexts.insert(share.sender_id, share);
		}

		let mut rng = Rng::from_entropy();
		let mut received_shares: Vec<Scalar> = Vec::new();
		let mut complaints: Vec<ComplaintProof> = Vec::new();

		for peer_id in qualified.iter().filter(|id| **id != self.id) {
			let Some(share) = ciphertexts.get(peer_id) else {
				state.transcripts.insert(dkg_id, DkgTranscript::Aborted);
				return Err(HandlerError::MissingShare(*peer_id))
			};

			let peer_encryption_key = &peer_encryption_keys[peer_id];
			let shared = encryption::shared_point(&ephemeral_secret, peer_encryption_key)?;
			let key = encryption::derive_symmetric_key(&shared);

			let dealt = encryption::open(&key, &share.ciphertext)
				.ok()
				.and_then(|plaintext| bincode::deserialize::<DealtShare>(&plaintext).ok())
				.filter(|dealt| dealt.receiver == self.id)
				.filter(|dealt| {
					verify_share(
						&dealt.share,
						&peer_commitments[peer_id],
						&self.id.as_scalar(),
					)
				});

			match dealt {
				Some(dealt) => received_shares.push(dealt.share),
				None => {
					warn!(
						dkg_id = dkg_id.as_str(),
						from_id = %peer_id,
						"received share is inconsistent, raising a complaint"
					);
					complaints.push(ComplaintProof {
						accuser: self.id,
						accused: *peer_id,
						shared_point: shared,
						dleq: dleq::prove(
							&mut rng,
							&ephemeral_secret,
							peer_encryption_key,
							&shared,
						),
					});
				},
			}
		}

		if !complaints.is_empty() {
			state.transcripts.insert(dkg_id, DkgTranscript::Aborted);
			return Ok(ResponsePayload::Round3(Round3Response::Complaint { proofs: complaints }))
		}

		// Own final share: our own polynomial evaluated at our index plus
		// everything the other qualified dealers sent us
		let own_x = self.id.as_scalar();
		let share: Scalar = std::iter::once(polynomial.evaluate(&own_x))
			.chain(received_shares.into_iter())
			.sum();

		let own_commitments = polynomial.commitments();
		let group_public_key: Point = std::iter::once(own_commitments.constant())
			.chain(peer_commitments.values().map(|commitments| commitments.constant()))
			.sum();

		// Y_j for every qualified member is derivable from the public
		// coefficient commitments alone
		let public_shares: BTreeMap<NodeId, Point> = qualified
			.iter()
			.map(|member| {
				let x = member.as_scalar();
				let y_j: Point = std::iter::once(own_commitments.evaluate(&x))
					.chain(
						peer_commitments.values().map(|commitments| commitments.evaluate(&x)),
					)
					.sum();
				(*member, y_j)
			})
			.collect();

		let public_share = Point::from_scalar(&share);
		debug_assert_eq!(public_share, public_shares[&self.id]);

		let key_share = KeyShare {
			dkg_id: dkg_id.clone(),
			threshold: info.threshold,
			party: qualified,
			share,
			group_public_key,
			public_shares,
		};
		self.data_manager.set_key(&dkg_id, key_share.clone());
		state.keys.insert(dkg_id.clone(), key_share);

		// The secret polynomial and ephemeral scalar are zeroized as the
		// round 2 state is dropped here
		state.transcripts.insert(dkg_id.clone(), DkgTranscript::Done);

		debug!(dkg_id = dkg_id.as_str(), "key share finalized");

		let data = Round3Data { dkg_public_key: group_public_key, public_share };
		let validation_sig =
			schnorr::sign_message(&mut rng, &self.long_term_secret, &data.signable_bytes());

		Ok(ResponsePayload::Round3(Round3Response::Successful { data, validation_sig }))
	}

	fn handle_generate_nonces(
		&self,
		state: &mut NodeState,
		caller: NodeId,
		params: GenerateNoncesParameters,
	) -> Result<ResponsePayload, HandlerError> {
		let requested = params.number_of_nonces as usize;

		let capacity = self.max_nonce_pool.saturating_sub(state.pool.len());
		if capacity == 0 {
			warn!(from_id = %caller, pool = state.pool.len(), "nonce pool at capacity");
			return Err(HandlerError::NoncePoolFull)
		}

		let mut rng = Rng::from_entropy();
		let nonces = state.pool.generate(&mut rng, requested.min(capacity));
		self.data_manager.set_nonces(state.pool.snapshot());

		debug!(generated = nonces.len(), pool = state.pool.len(), "nonce pool extended");

		Ok(ResponsePayload::Nonces(NoncesResponse { nonces }))
	}

	fn handle_sign(
		&self,
		state: &mut NodeState,
		params: SignParameters,
	) -> Result<ResponsePayload, HandlerError> {
		let SignParameters { dkg_id, commitments_list, input_data } = params;

		let validated = self.validator.validate(&input_data)?;

		let key = match state.keys.get(&dkg_id) {
			Some(key) => key.clone(),
			None => {
				let key = self.data_manager.get_key(&dkg_id).ok_or(HandlerError::UnknownKey)?;
				state.keys.insert(dkg_id.clone(), key.clone());
				key
			},
		};

		let signers: BTreeSet<NodeId> = commitments_list.keys().copied().collect();
		if !signers.iter().all(|signer| key.party.contains(signer)) {
			return Err(HandlerError::InvalidSignerSet("signer outside the key's party"))
		}
		if signers.len() < key.threshold as usize {
			return Err(HandlerError::InvalidSignerSet("signer set below threshold"))
		}
		let own_commitments = commitments_list.get(&self.id).ok_or(HandlerError::NotASigner)?;

		// Consume the pair before doing any signing work and persist the
		// removal in the same breath; a pair must never be usable twice,
		// even across a crash
		let nonces = state
			.pool
			.take_matching(own_commitments)
			.ok_or(HandlerError::NonceReuseOrMissing)?;
		self.data_manager.set_nonces(state.pool.snapshot());

		let message: &[u8] = &validated.digest;
		let bindings = frost::binding_values(message, &commitments_list);
		let aggregated_public_nonce = frost::aggregate_nonce(&commitments_list, &bindings)?;
		let challenge = schnorr::signature_challenge(
			&aggregated_public_nonce,
			&key.group_public_key,
			message,
		);
		let lambda = frost::lagrange_coefficient(&self.id, &signers)?;

		let z = frost::partial_signature(
			&nonces,
			&bindings[&self.id],
			&lambda,
			&key.share,
			&challenge,
		);

		debug!(dkg_id = dkg_id.as_str(), signers = signers.len(), "partial signature produced");

		Ok(ResponsePayload::Sign(SignResponse {
			data: validated.canonical,
			signature_data: SignatureData { id: self.id, z, aggregated_public_nonce },
		}))
	}

	fn verify_peer_signature(
		&self,
		peer: &NodeId,
		message: &[u8],
		signature: &schnorr::Signature,
	) -> bool {
		match self.directory.lookup(peer) {
			Some(info) => schnorr::verify_signature(&info.long_term_public_key, message, signature),
			None => false,
		}
	}
}

#[async_trait]
impl RequestHandler for NodeEngine {
	async fn handle_request(
		&self,
		caller: NodeId,
		protocol: &str,
		payload: Vec<u8>,
	) -> Option<Vec<u8>> {
		if !self.authorizer.is_authorized(&caller, protocol) {
			warn!(from_id = %caller, protocol, "unauthorized caller, closing stream");
			return None
		}

		let request = match Request::decode(&payload) {
			Ok(request) => request,
			Err(error) => {
				debug!(from_id = %caller, %error, "undecodable request, closing stream");
				return None
			},
		};

		if request.protocol() != protocol {
			debug!(
				from_id = %caller,
				protocol,
				method = request.method(),
				"method does not match stream protocol, closing stream"
			);
			return None
		}

		let response = match self.handle(caller, request) {
			Ok(response) => response,
			Err(error) => {
				warn!(from_id = %caller, %error, "request failed");
				ResponsePayload::Failure { status: error.status(), reason: error.to_string() }
			},
		};

		Some(response.encode())
	}
}
