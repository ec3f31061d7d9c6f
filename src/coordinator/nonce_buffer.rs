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

//! Per-peer FIFO of unused nonce commitments, drained by signing sessions
//! and replenished by the maintenance loop.

use std::collections::{BTreeMap, HashMap, VecDeque};

use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::{
	crypto::{frost::NonceCommitments, NodeId},
	wire::{GenerateNoncesParameters, Request, RequestPayload, ResponsePayload},
};

use super::{random_request_id, PeerReply, SessionCoordinator};

#[derive(Default)]
pub struct NonceBuffer {
	queues: Mutex<HashMap<NodeId, VecDeque<NonceCommitments>>>,
	refilled: Notify,
}

impl NonceBuffer {
	pub fn depth(&self, peer: &NodeId) -> usize {
		self.queues.lock().unwrap().get(peer).map_or(0, VecDeque::len)
	}

	pub fn push(&self, peer: NodeId, commitments: Vec<NonceCommitments>) {
		self.queues.lock().unwrap().entry(peer).or_default().extend(commitments);
		self.refilled.notify_waiters();
	}

	pub fn try_pop(&self, peer: &NodeId) -> Option<NonceCommitments> {
		self.queues.lock().unwrap().get_mut(peer)?.pop_front()
	}

	/// Return an unused commitment to the front of the queue, e.g. when a
	/// signing attempt is abandoned before any request goes out.
	pub fn restore(&self, peer: NodeId, commitments: NonceCommitments) {
		self.queues.lock().unwrap().entry(peer).or_default().push_front(commitments);
	}

	/// Pop, waiting up to `wait` for the maintenance loop to refill.
	pub async fn pop_with_wait(
		&self,
		peer: &NodeId,
		wait: std::time::Duration,
	) -> Option<NonceCommitments> {
		let deadline = tokio::time::Instant::now() + wait;
		loop {
			if let Some(commitments) = self.try_pop(peer) {
				return Some(commitments)
			}
			if tokio::time::timeout_at(deadline, self.refilled.notified()).await.is_err() {
				return self.try_pop(peer)
			}
		}
	}
}

impl SessionCoordinator {
	/// One-shot top-up: ask every peer for `count` fresh nonce pairs and
	/// buffer the returned commitments. Returns the buffered count per
	/// responding peer.
	pub async fn request_nonces(&self, party: &[NodeId], count: u32) -> BTreeMap<NodeId, usize> {
		let mut buffered = BTreeMap::new();

		for peer in party {
			let request = Request::new(
				&random_request_id(),
				RequestPayload::GenerateNonces(GenerateNoncesParameters {
					number_of_nonces: count,
				}),
			);

			match self.send_request(*peer, &request).await {
				PeerReply::Response(ResponsePayload::Nonces(response)) => {
					debug!(%peer, count = response.nonces.len(), "buffered fresh nonces");
					buffered.insert(*peer, response.nonces.len());
					self.nonce_buffer.push(*peer, response.nonces);
				},
				// An exhausted or unreachable peer simply stays shallow in
				// the buffer; the signing path treats that as unavailability
				// rather than misbehavior
				reply => {
					warn!(%peer, ?reply, "nonce generation request failed");
				},
			}
		}

		buffered
	}

	/// Long-running maintenance: whenever a peer's buffer is below the low
	/// water mark, top it up to ten times that depth.
	pub async fn run_nonce_maintenance(&self, party: Vec<NodeId>) {
		let low_water = self.settings.coordinator.nonce_low_water;

		loop {
			for peer in &party {
				if self.nonce_buffer.depth(peer) < low_water {
					self.request_nonces(std::slice::from_ref(peer), (low_water * 10) as u32)
						.await;
				}
			}
			tokio::time::sleep(self.settings.coordinator.nonce_poll_interval()).await;
		}
	}
}
