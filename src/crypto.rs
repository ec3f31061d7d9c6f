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

//! Cryptographic primitives: secp256k1 arithmetic, Schnorr signatures and
//! proofs of possession, Shamir sharing, pairwise share encryption, DLEQ
//! complaint proofs and the FROST signing pipeline.

pub mod dleq;
pub mod encryption;
pub mod frost;
pub mod polynomial;
pub mod schnorr;
pub mod secp256k1;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use self::secp256k1::{Point, Scalar};

/// Compressed point and scalar encoding sizes on the wire.
pub const POINT_SIZE: usize = 33;
pub const SCALAR_SIZE: usize = 32;

// Ideally, we want to use a concrete implementation (like ChaCha20) instead of StdRng
// to prevent it from potentially changing from under us
pub type Rng = rand::rngs::StdRng;

/// Non-recoverable failures of the primitives layer. Callers surface these
/// as per-peer or per-session errors; they never panic.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
	#[error("malformed curve point")]
	MalformedPoint,
	#[error("scalar out of range")]
	InvalidScalar,
	#[error("arithmetic produced the point at infinity")]
	PointAtInfinity,
	#[error("AEAD authentication failure")]
	AeadFailure,
	#[error("DLEQ proof verification failure")]
	DleqVerificationFailed,
}

/// Self-certifying node identifier: SHA-256 of the node's long-term
/// compressed public key. Interpreted big-endian mod the group order, it is
/// also the party's x-coordinate in the sharing polynomial.
#[derive(
	Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId([u8; 32]);

impl NodeId {
	pub fn from_public_key(public_key: &Point) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(public_key.as_bytes());
		NodeId(hasher.finalize().into())
	}

	pub const fn from_bytes(bytes: [u8; 32]) -> Self {
		NodeId(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}

	/// The x-coordinate this party evaluates sharing polynomials at.
	/// Reduction mod the group order makes a zero scalar possible in
	/// principle; party construction rejects such identifiers, since
	/// evaluating at zero would reveal the shared secret.
	pub fn as_scalar(&self) -> Scalar {
		Scalar::from_bytes_mod_order(&self.0)
	}
}

impl std::fmt::Display for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", hex::encode(&self.0[..8]))
	}
}

impl std::fmt::Debug for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "NodeId({})", hex::encode(self.0))
	}
}
