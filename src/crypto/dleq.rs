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

//! Chaum-Pedersen DLEQ proofs and complaint resolution.
//!
//! A node accusing its dealer of an inconsistent share reveals their
//! pairwise Diffie-Hellman point together with a proof that it really is
//! the Diffie-Hellman of the two ephemeral keys. Any third party can then
//! derive the symmetric key, decrypt the disputed ciphertext and re-run the
//! share check to decide who misbehaved.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
	encryption::{derive_symmetric_key, open},
	polynomial::{verify_share, CoefficientCommitments},
	NodeId, Point, Rng, Scalar,
};

/// Proof that log_G(P1) = log_B(K), i.e. both were produced with the same
/// secret exponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DleqProof {
	t1: Point,
	t2: Point,
	z: Scalar,
}

/// Plaintext of a round-2 ciphertext: the dealt share, tagged with its
/// intended receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealtShare {
	pub receiver: NodeId,
	pub share: Scalar,
}

/// A complaint published by `accuser` against `accused`, revealing their
/// pairwise shared point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintProof {
	pub accuser: NodeId,
	pub accused: NodeId,
	pub shared_point: Point,
	pub dleq: DleqProof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintVerdict {
	/// The dealer's ciphertext did not decrypt to a share consistent with
	/// their commitments.
	AccusedAtFault,
	/// The complaint did not hold up; the accuser takes the blame.
	AccuserAtFault,
}

fn dleq_challenge(public1: &Point, base2: &Point, public2: &Point, t1: &Point, t2: &Point) -> Scalar {
	let mut hasher = Sha256::new();
	hasher.update(b"dleq");
	hasher.update(Point::generator().as_bytes());
	hasher.update(public1.as_bytes());
	hasher.update(base2.as_bytes());
	hasher.update(public2.as_bytes());
	hasher.update(t1.as_bytes());
	hasher.update(t2.as_bytes());
	let digest: [u8; 32] = hasher.finalize().into();
	Scalar::from_bytes_mod_order(&digest)
}

/// Prove that `public1 = secret·G` and `public2 = secret·base2`.
pub fn prove(rng: &mut Rng, secret: &Scalar, base2: &Point, public2: &Point) -> DleqProof {
	let public1 = Point::from_scalar(secret);

	let r = Scalar::random(rng);
	let t1 = Point::from_scalar(&r);
	let t2 = *base2 * &r;

	let challenge = dleq_challenge(&public1, base2, public2, &t1, &t2);

	DleqProof { t1, t2, z: &r + &(secret * &challenge) }
}

/// z·G ?= t1 + c·P1 and z·B ?= t2 + c·P2
pub fn verify(proof: &DleqProof, public1: &Point, base2: &Point, public2: &Point) -> bool {
	let challenge = dleq_challenge(public1, base2, public2, &proof.t1, &proof.t2);

	Point::from_scalar(&proof.z) == proof.t1 + *public1 * &challenge &&
		*base2 * &proof.z == proof.t2 + *public2 * &challenge
}

/// Decide a complaint. `accuser_encryption_key` and `accused_encryption_key`
/// are the ephemeral public keys from the two parties' round-1 broadcasts,
/// `accused_commitments` the dealer's coefficient commitments, and
/// `sealed_share` the disputed round-2 ciphertext addressed to the accuser.
pub fn resolve_complaint(
	complaint: &ComplaintProof,
	accuser_encryption_key: &Point,
	accused_encryption_key: &Point,
	accused_commitments: &CoefficientCommitments,
	sealed_share: &[u8],
) -> ComplaintVerdict {
	// An invalid proof means the revealed point cannot be trusted; the
	// complaint is void and the accuser is reported instead.
	if !verify(
		&complaint.dleq,
		accuser_encryption_key,
		accused_encryption_key,
		&complaint.shared_point,
	) {
		return ComplaintVerdict::AccuserAtFault
	}

	let key = derive_symmetric_key(&complaint.shared_point);
	let plaintext = match open(&key, sealed_share) {
		Ok(plaintext) => plaintext,
		// The dealer sent bytes that do not even authenticate
		Err(_) => return ComplaintVerdict::AccusedAtFault,
	};

	let dealt: DealtShare = match bincode::deserialize(&plaintext) {
		Ok(dealt) => dealt,
		Err(_) => return ComplaintVerdict::AccusedAtFault,
	};

	if dealt.receiver != complaint.accuser {
		return ComplaintVerdict::AccusedAtFault
	}

	if verify_share(&dealt.share, accused_commitments, &complaint.accuser.as_scalar()) {
		ComplaintVerdict::AccuserAtFault
	} else {
		ComplaintVerdict::AccusedAtFault
	}
}
