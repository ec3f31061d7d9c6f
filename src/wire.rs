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

//! Wire protocol: one framed request/response message per method, encoded
//! with bincode (fixed-length point and scalar encodings).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{
	dleq::ComplaintProof,
	frost::NonceCommitments,
	polynomial::CoefficientCommitments,
	schnorr::{ProofOfPossession, Signature},
	NodeId, Point, Scalar,
};

pub type DkgId = String;

/// Currently active wire protocol version, part of every protocol
/// identifier below.
pub const PROTOCOL_VERSION: &str = "1.0.0";

pub mod protocols {
	pub const ROUND1: &str = "/frost-engine/round1/1.0.0";
	pub const ROUND2: &str = "/frost-engine/round2/1.0.0";
	pub const ROUND3: &str = "/frost-engine/round3/1.0.0";
	pub const GENERATE_NONCES: &str = "/frost-engine/generate-nonces/1.0.0";
	pub const SIGN: &str = "/frost-engine/sign/1.0.0";

	pub const ALL: [&str; 5] = [ROUND1, ROUND2, ROUND3, GENERATE_NONCES, SIGN];
}

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	strum_macros::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
	Successful,
	Complaint,
	Malicious,
	Timeout,
	Error,
	Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round1Parameters {
	pub party: Vec<NodeId>,
	pub dkg_id: DkgId,
	pub app_name: String,
	pub threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round2Parameters {
	pub dkg_id: DkgId,
	pub broadcasted_data: BTreeMap<NodeId, Round1Response>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round3Parameters {
	pub dkg_id: DkgId,
	/// The round-2 ciphertexts addressed to the recipient of this request.
	pub send_data: Vec<EncryptedShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateNoncesParameters {
	pub number_of_nonces: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignParameters {
	pub dkg_id: DkgId,
	pub commitments_list: BTreeMap<NodeId, NonceCommitments>,
	/// Opaque application input; the validator turns it into the message.
	pub input_data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
	Round1(Round1Parameters),
	Round2(Round2Parameters),
	Round3(Round3Parameters),
	GenerateNonces(GenerateNoncesParameters),
	Sign(SignParameters),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub request_id: String,
	pub payload: RequestPayload,
}

impl Request {
	pub fn new(session_id: &str, payload: RequestPayload) -> Self {
		let request_id = format!("{session_id}_{}", method_name(&payload));
		Request { request_id, payload }
	}

	pub fn method(&self) -> &'static str {
		method_name(&self.payload)
	}

	pub fn protocol(&self) -> &'static str {
		match &self.payload {
			RequestPayload::Round1(_) => protocols::ROUND1,
			RequestPayload::Round2(_) => protocols::ROUND2,
			RequestPayload::Round3(_) => protocols::ROUND3,
			RequestPayload::GenerateNonces(_) => protocols::GENERATE_NONCES,
			RequestPayload::Sign(_) => protocols::SIGN,
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		bincode::serialize(self).expect("serialization can't fail")
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
		bincode::deserialize(bytes)
	}
}

fn method_name(payload: &RequestPayload) -> &'static str {
	match payload {
		RequestPayload::Round1(_) => "round1",
		RequestPayload::Round2(_) => "round2",
		RequestPayload::Round3(_) => "round3",
		RequestPayload::GenerateNonces(_) => "generate_nonces",
		RequestPayload::Sign(_) => "sign",
	}
}

/// The data every node broadcasts in round 1: coefficient commitments with
/// a proof of possession of the secret contribution, and an ephemeral
/// encryption key with its own proof of possession.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round1Broadcast {
	pub sender_id: NodeId,
	pub commitments: CoefficientCommitments,
	pub coefficient_pop: ProofOfPossession,
	pub encryption_key: Point,
	pub encryption_pop: ProofOfPossession,
}

impl Round1Broadcast {
	/// The bytes the long-term validation signature covers.
	pub fn signable_bytes(&self) -> Vec<u8> {
		bincode::serialize(self).expect("serialization can't fail")
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round1Response {
	pub broadcast: Round1Broadcast,
	pub validation_sig: Signature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedShare {
	pub sender_id: NodeId,
	pub receiver_id: NodeId,
	pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round2Response {
	pub broadcast: Vec<EncryptedShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round3Data {
	pub dkg_public_key: Point,
	pub public_share: Point,
}

impl Round3Data {
	pub fn signable_bytes(&self) -> Vec<u8> {
		bincode::serialize(self).expect("serialization can't fail")
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Round3Response {
	Successful { data: Round3Data, validation_sig: Signature },
	Complaint { proofs: Vec<ComplaintProof> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoncesResponse {
	pub nonces: Vec<NonceCommitments>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureData {
	pub id: NodeId,
	pub z: Scalar,
	pub aggregated_public_nonce: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
	/// The validator's canonical message bytes, echoed back so the
	/// aggregator can confirm all signers signed the same thing.
	pub data: Vec<u8>,
	pub signature_data: SignatureData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
	Round1(Round1Response),
	Round2(Round2Response),
	Round3(Round3Response),
	Nonces(NoncesResponse),
	Sign(SignResponse),
	Failure { status: Status, reason: String },
}

impl ResponsePayload {
	pub fn status(&self) -> Status {
		match self {
			ResponsePayload::Round3(Round3Response::Complaint { .. }) => Status::Complaint,
			ResponsePayload::Failure { status, .. } => *status,
			_ => Status::Successful,
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		bincode::serialize(self).expect("serialization can't fail")
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
		bincode::deserialize(bytes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_ids_carry_the_method_name() {
		let request = Request::new(
			"dkg-123",
			RequestPayload::GenerateNonces(GenerateNoncesParameters { number_of_nonces: 10 }),
		);

		assert_eq!(request.request_id, "dkg-123_generate_nonces");
		assert_eq!(request.method(), "generate_nonces");
		assert_eq!(request.protocol(), protocols::GENERATE_NONCES);
	}

	#[test]
	fn statuses_render_like_the_wire_protocol_expects() {
		assert_eq!(Status::Successful.to_string(), "SUCCESSFUL");
		assert_eq!(Status::Malicious.to_string(), "MALICIOUS");
		assert_eq!(Status::Timeout.to_string(), "TIMEOUT");
	}

	#[test]
	fn envelopes_round_trip_through_bincode() {
		let request = Request::new(
			"sess",
			RequestPayload::Round3(Round3Parameters {
				dkg_id: "sess".to_string(),
				send_data: vec![],
			}),
		);

		let decoded = Request::decode(&request.encode()).unwrap();
		assert_eq!(decoded.request_id, request.request_id);
		assert!(matches!(decoded.payload, RequestPayload::Round3(_)));
	}
}
