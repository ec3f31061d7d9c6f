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

//! Local reputation book. Penalties are additive per observed outcome and
//! decay exponentially; a peer whose effective score reaches the removal
//! threshold is excluded from selection until decay pulls it back under.

use std::{
	collections::HashMap,
	time::Instant,
};

use tracing::debug;

use crate::{crypto::NodeId, settings::PenaltySettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOutcome {
	Successful,
	Timeout,
	Error,
	Malicious,
}

struct PeerReputation {
	weight: f64,
	last_event: Instant,
}

pub struct ReputationBook {
	settings: PenaltySettings,
	penalties: HashMap<NodeId, PeerReputation>,
}

impl ReputationBook {
	pub fn new(settings: PenaltySettings) -> Self {
		ReputationBook { settings, penalties: HashMap::new() }
	}

	pub fn record(&mut self, peer: NodeId, outcome: PeerOutcome) {
		self.record_at(peer, outcome, Instant::now())
	}

	pub fn score(&self, peer: &NodeId) -> f64 {
		self.score_at(peer, Instant::now())
	}

	pub fn is_excluded(&self, peer: &NodeId) -> bool {
		self.score(peer) >= self.settings.remove_threshold
	}

	/// Keep only peers currently under the removal threshold, preserving
	/// the input order.
	pub fn filter_available<I: IntoIterator<Item = NodeId>>(&self, peers: I) -> Vec<NodeId> {
		peers.into_iter().filter(|peer| !self.is_excluded(peer)).collect()
	}

	fn record_at(&mut self, peer: NodeId, outcome: PeerOutcome, now: Instant) {
		let added = match outcome {
			PeerOutcome::Successful => return,
			PeerOutcome::Timeout => self.settings.timeout_weight,
			PeerOutcome::Error => self.settings.error_weight,
			PeerOutcome::Malicious => self.settings.malicious_weight,
		};

		let last_event = self
			.penalties
			.get(&peer)
			.map(|entry| entry.last_event)
			.unwrap_or(now);
		let decay = self.decay(now.saturating_duration_since(last_event));

		let entry = self
			.penalties
			.entry(peer)
			.or_insert(PeerReputation { weight: 0.0, last_event: now });

		// Decay the accumulated weight to `now` before stacking the new
		// penalty, so the stored (weight, last_event) pair always means
		// "this much, as of then"
		entry.weight = entry.weight * decay + added;
		entry.last_event = now;

		debug!(%peer, ?outcome, score = entry.weight, "penalty recorded");
	}

	fn score_at(&self, peer: &NodeId, now: Instant) -> f64 {
		match self.penalties.get(peer) {
			Some(entry) =>
				entry.weight * self.decay(now.saturating_duration_since(entry.last_event)),
			None => 0.0,
		}
	}

	fn decay(&self, elapsed: std::time::Duration) -> f64 {
		(-elapsed.as_secs_f64() / self.settings.decay_time_constant_secs).exp()
	}
}
