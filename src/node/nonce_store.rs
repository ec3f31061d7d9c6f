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

//! The node's pool of precomputed nonce pairs. A pair leaves the pool the
//! moment it is matched to a signing request; it never returns, even if
//! the signing computation fails afterwards.

use crate::crypto::{
	frost::{NonceCommitments, SecretNoncePair},
	Rng,
};

pub struct NoncePool {
	pairs: Vec<SecretNoncePair>,
	next_id: u64,
}

impl NoncePool {
	/// Rebuild the pool from persisted pairs.
	pub fn from_pairs(pairs: Vec<SecretNoncePair>) -> Self {
		let next_id = pairs.iter().map(|pair| pair.id + 1).max().unwrap_or(0);
		NoncePool { pairs, next_id }
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// Sample `count` fresh pairs and return their public commitments.
	pub fn generate(&mut self, rng: &mut Rng, count: usize) -> Vec<NonceCommitments> {
		(0..count)
			.map(|_| {
				let pair = SecretNoncePair::sample(rng, self.next_id);
				self.next_id += 1;
				let commitments = pair.commitments();
				self.pairs.push(pair);
				commitments
			})
			.collect()
	}

	/// Remove and return the pair matching the advertised commitments.
	/// Matching is on the public points, so a stale or fabricated
	/// commitment cannot consume someone else's pair.
	pub fn take_matching(&mut self, commitments: &NonceCommitments) -> Option<SecretNoncePair> {
		let index = self
			.pairs
			.iter()
			.position(|pair| pair.d_pub == commitments.d && pair.e_pub == commitments.e)?;
		Some(self.pairs.swap_remove(index))
	}

	/// Clone of the current pool for atomic persistence.
	pub fn snapshot(&self) -> Vec<SecretNoncePair> {
		self.pairs.clone()
	}
}
