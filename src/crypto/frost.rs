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

//! FROST preprocessing and signing operations, as discussed in
//! <https://eprint.iacr.org/2020/852.pdf>. Unlike the protocol described in
//! the document, nonce pairs are precomputed in batches ahead of time and a
//! signature aggregator drives each signing session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::{CryptoError, NodeId, Point, Rng, Scalar};

/// A pair of secret single-use nonces and their public commitments,
/// corresponding to (d, e) generated during the preprocessing stage in
/// Section 5.3 (page 13).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretNoncePair {
	pub id: u64,
	pub d: Scalar,
	pub d_pub: Point,
	pub e: Scalar,
	pub e_pub: Point,
}

impl Zeroize for SecretNoncePair {
	fn zeroize(&mut self) {
		self.d.zeroize();
		self.e.zeroize();
	}
}

impl Drop for SecretNoncePair {
	fn drop(&mut self) {
		self.zeroize();
	}
}

impl SecretNoncePair {
	pub fn sample(rng: &mut Rng, id: u64) -> Self {
		let d = Scalar::random(rng);
		let e = Scalar::random(rng);

		let d_pub = Point::from_scalar(&d);
		let e_pub = Point::from_scalar(&e);

		SecretNoncePair { id, d, d_pub, e, e_pub }
	}

	pub fn commitments(&self) -> NonceCommitments {
		NonceCommitments { id: self.id, d: self.d_pub, e: self.e_pub }
	}
}

/// The public commitments (D, E) a signer advertises ahead of signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceCommitments {
	pub id: u64,
	pub d: Point,
	pub e: Point,
}

/// Binding value for party `id`. See "Signing Protocol" in Section 5.2
/// (page 14).
fn gen_rho(
	id: &NodeId,
	message: &[u8],
	commitments: &BTreeMap<NodeId, NonceCommitments>,
) -> Scalar {
	let mut hasher = Sha256::new();
	hasher.update(b"rho");
	hasher.update(id.as_bytes());
	hasher.update(message);

	// This needs to be processed in order (BTreeMap iteration is)
	for (signer, commitment) in commitments {
		hasher.update(signer.as_bytes());
		hasher.update(commitment.d.as_bytes());
		hasher.update(commitment.e.as_bytes());
	}

	let digest: [u8; 32] = hasher.finalize().into();
	let rho = Scalar::from_bytes_mod_order(&digest);

	// The protocol requires rho != 0. This slightly biases the hash, which
	// is safe as it doesn't meaningfully impact collision resistance
	// (especially since parties have no or little control over the inputs).
	if rho.is_zero() {
		Scalar::from(1)
	} else {
		rho
	}
}

/// Binding values for every signer in the session.
pub fn binding_values(
	message: &[u8],
	commitments: &BTreeMap<NodeId, NonceCommitments>,
) -> BTreeMap<NodeId, Scalar> {
	commitments.keys().map(|id| (*id, gen_rho(id, message, commitments))).collect()
}

/// R = Σ_j (D_j + ρ_j·E_j)
pub fn aggregate_nonce(
	commitments: &BTreeMap<NodeId, NonceCommitments>,
	bindings: &BTreeMap<NodeId, Scalar>,
) -> Result<Point, CryptoError> {
	let r: Point = commitments
		.iter()
		.map(|(id, commitment)| commitment.d + commitment.e * &bindings[id])
		.sum();

	if r.is_identity() {
		Err(CryptoError::PointAtInfinity)
	} else {
		Ok(r)
	}
}

/// Lagrange coefficient at x = 0 for `signer`, over the signer set's
/// x-coordinates, according to Section 4 (page 9).
pub fn lagrange_coefficient(
	signer: &NodeId,
	all_signers: &BTreeSet<NodeId>,
) -> Result<Scalar, CryptoError> {
	let x_i = signer.as_scalar();

	let mut num = Scalar::from(1);
	let mut den = Scalar::from(1);

	for other in all_signers {
		if other == signer {
			continue
		}

		let x_j = other.as_scalar();
		num = &num * &x_j;
		den = &den * &(&x_j - &x_i);
	}

	// Zero is only possible if two distinct identifiers reduce to the
	// same scalar, which parties reject at session setup
	let den_inverse = den.invert().ok_or(CryptoError::InvalidScalar)?;

	Ok(&num * &den_inverse)
}

/// z_i = d_i + ρ_i·e_i + λ_i·s_i·c
pub fn partial_signature(
	nonces: &SecretNoncePair,
	rho: &Scalar,
	lambda: &Scalar,
	secret_share: &Scalar,
	challenge: &Scalar,
) -> Scalar {
	&(&nonces.d + &(rho * &nonces.e)) + &(&(lambda * secret_share) * challenge)
}

/// z_i·G ?= (D_i + ρ_i·E_i) + λ_i·c·Y_i
/// (See step 7.b in Figure 3, page 15.)
pub fn verify_partial_signature(
	response: &Scalar,
	commitments: &NonceCommitments,
	rho: &Scalar,
	lambda: &Scalar,
	challenge: &Scalar,
	public_share: &Point,
) -> bool {
	Point::from_scalar(response) ==
		commitments.d + commitments.e * rho + *public_share * &(lambda * challenge)
}

/// Response shares are additive (see step 7.c in Figure 3, page 15).
pub fn aggregate_responses<I: IntoIterator<Item = Scalar>>(responses: I) -> Scalar {
	responses.into_iter().sum()
}
