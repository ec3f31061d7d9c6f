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

//! Schnorr signatures over secp256k1 and the proof-of-possession variant
//! used during key generation. All challenges are domain-tagged SHA-256.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{NodeId, Point, Rng, Scalar};

/// A standard Schnorr signature `(R, z)` with `z = k + c·x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
	pub r: Point,
	pub z: Scalar,
}

/// A Schnorr signature demonstrating knowledge of the secret behind a
/// public value, bound to the signer and the session it was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfPossession {
	pub nonce_commitment: Point,
	pub z: Scalar,
}

fn hash_to_scalar(hasher: Sha256) -> Scalar {
	let digest: [u8; 32] = hasher.finalize().into();
	Scalar::from_bytes_mod_order(&digest)
}

/// c = H("PoP" ∥ signer ∥ session ∥ P ∥ K)
fn pop_challenge(
	signer: &NodeId,
	session_id: &str,
	public: &Point,
	nonce_commitment: &Point,
) -> Scalar {
	let mut hasher = Sha256::new();
	hasher.update(b"PoP");
	hasher.update(signer.as_bytes());
	hasher.update(session_id.as_bytes());
	hasher.update(public.as_bytes());
	hasher.update(nonce_commitment.as_bytes());
	hash_to_scalar(hasher)
}

/// c = H("chal" ∥ R ∥ P ∥ m). Also the FROST group challenge (with P = Y).
pub fn signature_challenge(nonce_commitment: &Point, public: &Point, message: &[u8]) -> Scalar {
	let mut hasher = Sha256::new();
	hasher.update(b"chal");
	hasher.update(nonce_commitment.as_bytes());
	hasher.update(public.as_bytes());
	hasher.update(message);
	hash_to_scalar(hasher)
}

pub fn pop_prove(rng: &mut Rng, signer: &NodeId, session_id: &str, secret: &Scalar) -> ProofOfPossession {
	let nonce = Scalar::random(rng);
	let nonce_commitment = Point::from_scalar(&nonce);

	let public = Point::from_scalar(secret);
	let challenge = pop_challenge(signer, session_id, &public, &nonce_commitment);

	ProofOfPossession { nonce_commitment, z: &nonce + &(secret * &challenge) }
}

/// z·G ?= K + c·P
pub fn pop_verify(
	signer: &NodeId,
	session_id: &str,
	public: &Point,
	pop: &ProofOfPossession,
) -> bool {
	let challenge = pop_challenge(signer, session_id, public, &pop.nonce_commitment);
	Point::from_scalar(&pop.z) == pop.nonce_commitment + *public * &challenge
}

pub fn sign_message(rng: &mut Rng, secret: &Scalar, message: &[u8]) -> Signature {
	let nonce = Scalar::random(rng);
	let r = Point::from_scalar(&nonce);

	let public = Point::from_scalar(secret);
	let challenge = signature_challenge(&r, &public, message);

	Signature { r, z: &nonce + &(secret * &challenge) }
}

/// z·G ?= R + c·P. Verifies both long-term message signatures and
/// aggregated group signatures (with P the group key).
pub fn verify_signature(public: &Point, message: &[u8], signature: &Signature) -> bool {
	let challenge = signature_challenge(&signature.r, public, message);
	Point::from_scalar(&signature.z) == signature.r + *public * &challenge
}
