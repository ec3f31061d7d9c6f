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

//! Tests exercising the primitives together: proof-of-possession round
//! trips and the full FROST signing pipeline over locally dealt shares.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;

use super::{
	frost::{
		aggregate_nonce, aggregate_responses, binding_values, lagrange_coefficient,
		partial_signature, verify_partial_signature, SecretNoncePair,
	},
	polynomial::SharingPolynomial,
	schnorr::{self, Signature},
	NodeId, Point, Rng, Scalar,
};

/// Deal a (threshold, ids) Shamir sharing from a single central polynomial.
/// Useful for exercising the signing pipeline without running a DKG.
fn deal_key_shares(
	rng: &mut Rng,
	ids: &BTreeSet<NodeId>,
	threshold: u32,
) -> (Point, BTreeMap<NodeId, (Scalar, Point)>) {
	let polynomial = SharingPolynomial::sample(rng, threshold);
	let group_key = Point::from_scalar(polynomial.secret());

	let shares = ids
		.iter()
		.map(|id| {
			let share = polynomial.evaluate(&id.as_scalar());
			let public_share = Point::from_scalar(&share);
			(*id, (share, public_share))
		})
		.collect();

	(group_key, shares)
}

fn random_ids(rng: &mut Rng, count: usize) -> BTreeSet<NodeId> {
	(0..count)
		.map(|_| NodeId::from_public_key(&Point::from_scalar(&Scalar::random(rng))))
		.collect()
}

struct SigningRun {
	group_key: Point,
	r: Point,
	challenge: Scalar,
	responses: BTreeMap<NodeId, Scalar>,
	public_shares: BTreeMap<NodeId, Point>,
	bindings: BTreeMap<NodeId, Scalar>,
	commitments: BTreeMap<NodeId, super::frost::NonceCommitments>,
}

fn run_signing(rng: &mut Rng, signer_count: usize, threshold: u32, message: &[u8]) -> SigningRun {
	let ids = random_ids(rng, signer_count);
	let (group_key, shares) = deal_key_shares(rng, &ids, threshold);

	let nonces: BTreeMap<NodeId, SecretNoncePair> =
		ids.iter().map(|id| (*id, SecretNoncePair::sample(rng, 0))).collect();
	let commitments: BTreeMap<_, _> =
		nonces.iter().map(|(id, pair)| (*id, pair.commitments())).collect();

	let bindings = binding_values(message, &commitments);
	let r = aggregate_nonce(&commitments, &bindings).unwrap();
	let challenge = schnorr::signature_challenge(&r, &group_key, message);

	let responses: BTreeMap<NodeId, Scalar> = ids
		.iter()
		.map(|id| {
			let lambda = lagrange_coefficient(id, &ids).unwrap();
			let (share, _) = &shares[id];
			(*id, partial_signature(&nonces[id], &bindings[id], &lambda, share, &challenge))
		})
		.collect();

	SigningRun {
		group_key,
		r,
		challenge,
		responses,
		public_shares: shares.into_iter().map(|(id, (_, y_i))| (id, y_i)).collect(),
		bindings,
		commitments,
	}
}

#[test]
fn pop_round_trip() {
	let mut rng = Rng::from_seed([11; 32]);

	let secret = Scalar::random(&mut rng);
	let public = Point::from_scalar(&secret);
	let signer = NodeId::from_public_key(&public);

	let pop = schnorr::pop_prove(&mut rng, &signer, "dkg-1", &secret);
	assert!(schnorr::pop_verify(&signer, "dkg-1", &public, &pop));

	// Bound to both the session and the signer
	assert!(!schnorr::pop_verify(&signer, "dkg-2", &public, &pop));
	let other = NodeId::from_bytes([42; 32]);
	assert!(!schnorr::pop_verify(&other, "dkg-1", &public, &pop));

	// And to the public value itself
	let unrelated = Point::from_scalar(&Scalar::random(&mut rng));
	assert!(!schnorr::pop_verify(&signer, "dkg-1", &unrelated, &pop));
}

#[test]
fn message_signatures_verify() {
	let mut rng = Rng::from_seed([12; 32]);

	let secret = Scalar::random(&mut rng);
	let public = Point::from_scalar(&secret);

	let signature = schnorr::sign_message(&mut rng, &secret, b"broadcast bytes");
	assert!(schnorr::verify_signature(&public, b"broadcast bytes", &signature));
	assert!(!schnorr::verify_signature(&public, b"other bytes", &signature));
}

#[test]
fn threshold_signature_verifies_as_plain_schnorr() {
	let mut rng = Rng::from_seed([13; 32]);
	let message = b"frost pipeline";

	let run = run_signing(&mut rng, 4, 3, message);

	for (id, response) in &run.responses {
		let lambda = lagrange_coefficient(id, &run.responses.keys().copied().collect()).unwrap();
		assert!(verify_partial_signature(
			response,
			&run.commitments[id],
			&run.bindings[id],
			&lambda,
			&run.challenge,
			&run.public_shares[id],
		));
	}

	let z = aggregate_responses(run.responses.values().cloned());
	let signature = Signature { r: run.r, z };
	assert!(schnorr::verify_signature(&run.group_key, message, &signature));
}

#[test]
fn aggregation_is_invariant_under_signer_order() {
	let mut rng = Rng::from_seed([14; 32]);

	let run = run_signing(&mut rng, 5, 3, b"permutation");

	let forward: Vec<Scalar> = run.responses.values().cloned().collect();
	let mut reversed = forward.clone();
	reversed.reverse();

	assert_eq!(aggregate_responses(forward), aggregate_responses(reversed));
}

#[test]
fn too_few_partials_do_not_forge() {
	let mut rng = Rng::from_seed([15; 32]);
	let message = b"no forgery";

	let run = run_signing(&mut rng, 3, 3, message);

	// Dropping one response (leaving t-1) must not produce a verifying
	// signature
	let z = aggregate_responses(run.responses.values().take(2).cloned());
	let signature = Signature { r: run.r, z };
	assert!(!schnorr::verify_signature(&run.group_key, message, &signature));
}

#[test]
fn corrupted_partial_is_rejected() {
	let mut rng = Rng::from_seed([16; 32]);

	let run = run_signing(&mut rng, 3, 2, b"bad partial");

	let (id, response) = run.responses.iter().next().unwrap();
	let lambda = lagrange_coefficient(id, &run.responses.keys().copied().collect()).unwrap();

	assert!(!verify_partial_signature(
		&(response + &Scalar::from(1)),
		&run.commitments[id],
		&run.bindings[id],
		&lambda,
		&run.challenge,
		&run.public_shares[id],
	));
}
