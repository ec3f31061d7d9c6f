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

//! Shamir sharing polynomial and its public coefficient commitments.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{Point, Rng, Scalar};

/// f(x) = a_0 + a_1·x + … + a_{t−1}·x^{t−1}. The constant term is the
/// node's secret contribution to the group key. Coefficients are zeroized
/// when the polynomial is dropped.
#[derive(Debug, Zeroize)]
pub struct SharingPolynomial {
	coefficients: Vec<Scalar>,
}

impl Drop for SharingPolynomial {
	fn drop(&mut self) {
		self.zeroize();
	}
}

impl SharingPolynomial {
	/// Sample a random polynomial of degree `threshold - 1`.
	pub fn sample(rng: &mut Rng, threshold: u32) -> Self {
		assert!(threshold >= 1, "threshold must be at least 1");
		SharingPolynomial {
			coefficients: (0..threshold).map(|_| Scalar::random(rng)).collect(),
		}
	}

	/// The secret contribution a_0.
	pub fn secret(&self) -> &Scalar {
		&self.coefficients[0]
	}

	/// Horner evaluation at a party's x-coordinate.
	pub fn evaluate(&self, x: &Scalar) -> Scalar {
		self.coefficients
			.iter()
			.rev()
			.cloned()
			.reduce(|acc, coefficient| &(&acc * x) + &coefficient)
			.expect("polynomial has at least one coefficient")
	}

	pub fn commitments(&self) -> CoefficientCommitments {
		CoefficientCommitments(self.coefficients.iter().map(Point::from_scalar).collect())
	}
}

/// Public commitments C_j = a_j·G to the sharing polynomial coefficients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoefficientCommitments(pub Vec<Point>);

impl CoefficientCommitments {
	/// G·f(x), computable from public data alone.
	pub fn evaluate(&self, x: &Scalar) -> Point {
		self.0
			.iter()
			.rev()
			.copied()
			.reduce(|acc, commitment| acc * x + commitment)
			.expect("commitments have at least one element")
	}

	/// Commitment to the secret contribution, C_0 = a_0·G.
	pub fn constant(&self) -> Point {
		self.0[0]
	}

	pub fn threshold(&self) -> u32 {
		self.0.len() as u32
	}
}

/// s'·G ?= Σ_j x^j · C_j, the check a receiver runs on a dealt share.
pub fn verify_share(share: &Scalar, commitments: &CoefficientCommitments, x: &Scalar) -> bool {
	Point::from_scalar(share) == commitments.evaluate(x)
}

#[cfg(test)]
pub fn reconstruct_secret(shares: &std::collections::BTreeMap<super::NodeId, Scalar>) -> Scalar {
	use super::frost::lagrange_coefficient;

	let all_ids = shares.keys().copied().collect();

	shares
		.iter()
		.map(|(id, share)| &lagrange_coefficient(id, &all_ids).unwrap() * share)
		.sum()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::crypto::NodeId;
	use rand::SeedableRng;
	use std::collections::BTreeMap;

	fn random_id(rng: &mut Rng) -> NodeId {
		NodeId::from_public_key(&Point::from_scalar(&Scalar::random(rng)))
	}

	#[test]
	fn shares_reconstruct_the_secret() {
		let mut rng = Rng::from_seed([1; 32]);

		let polynomial = SharingPolynomial::sample(&mut rng, 3);

		let shares: BTreeMap<_, _> = (0..5)
			.map(|_| {
				let id = random_id(&mut rng);
				(id, polynomial.evaluate(&id.as_scalar()))
			})
			.collect();

		// Any three shares are enough
		let subset: BTreeMap<_, _> = shares.into_iter().take(3).collect();
		assert_eq!(&reconstruct_secret(&subset), polynomial.secret());
	}

	#[test]
	fn dealt_shares_verify_against_commitments() {
		let mut rng = Rng::from_seed([2; 32]);

		let polynomial = SharingPolynomial::sample(&mut rng, 2);
		let commitments = polynomial.commitments();

		let x = random_id(&mut rng).as_scalar();
		let share = polynomial.evaluate(&x);

		assert!(verify_share(&share, &commitments, &x));
		assert!(!verify_share(&(&share + &Scalar::from(1)), &commitments, &x));

		// A share for one x-coordinate does not verify at another
		let other = random_id(&mut rng).as_scalar();
		assert!(!verify_share(&share, &commitments, &other));
	}
}
