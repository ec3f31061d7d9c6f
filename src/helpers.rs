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

//! Test-only fixtures: an in-process transport wiring real node engines to
//! a real coordinator, plus a cluster builder with deterministic keys.

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	sync::{Arc, Mutex},
	time::Duration,
};

use async_trait::async_trait;
use rand::SeedableRng;

use crate::{
	coordinator::{dkg::DkgParams, SessionCoordinator},
	crypto::{NodeId, Point, Rng, Scalar},
	data_manager::InMemoryDataManager,
	node::NodeEngine,
	settings::Settings,
	transport::{
		AllowAll, NodeDirectory, PeerInfo, RequestHandler, Transport, TransportError,
	},
	validator::{DigestValidator, Seed, SeedOracle},
	wire::{Request, ResponsePayload},
};

pub const TEST_SEED: Seed = 7;

/// The identity the in-process transport presents to handlers.
pub const AGGREGATOR_ID: NodeId = NodeId::from_bytes([0xcc; 32]);

pub struct StaticDirectory {
	peers: HashMap<NodeId, PeerInfo>,
}

impl NodeDirectory for StaticDirectory {
	fn lookup(&self, id: &NodeId) -> Option<PeerInfo> {
		self.peers.get(id).cloned()
	}

	fn list(&self, n: usize) -> Vec<NodeId> {
		let mut ids: Vec<NodeId> = self.peers.keys().copied().collect();
		ids.sort();
		ids.truncate(n);
		ids
	}
}

/// Accepts any seed; `fresh` always returns [`TEST_SEED`].
pub struct AnySeed;

impl SeedOracle for AnySeed {
	fn validate(&self, _seed: Seed) -> bool {
		true
	}

	fn fresh(&self) -> Seed {
		TEST_SEED
	}
}

type ResponseTamper = Box<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>;

/// Routes requests straight into node engines. Peers can be made
/// unresponsive (the send then waits out its deadline) and responses can
/// be tampered with on the way back, to simulate misbehaving nodes.
#[derive(Default)]
pub struct InProcessNetwork {
	handlers: Mutex<HashMap<NodeId, Arc<dyn RequestHandler>>>,
	unresponsive: Mutex<BTreeSet<NodeId>>,
	tampers: Mutex<HashMap<(NodeId, &'static str), ResponseTamper>>,
	request_log: Mutex<Vec<(NodeId, &'static str)>>,
}

impl InProcessNetwork {
	pub fn register(&self, id: NodeId, handler: Arc<dyn RequestHandler>) {
		self.handlers.lock().unwrap().insert(id, handler);
	}

	pub fn set_unresponsive(&self, id: NodeId) {
		self.unresponsive.lock().unwrap().insert(id);
	}

	pub fn tamper_responses(
		&self,
		peer: NodeId,
		protocol: &'static str,
		tamper: impl Fn(Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
	) {
		self.tampers.lock().unwrap().insert((peer, protocol), Box::new(tamper));
	}

	pub fn requests_sent(&self, protocol: &str) -> usize {
		self.request_log.lock().unwrap().iter().filter(|(_, p)| *p == protocol).count()
	}
}

#[async_trait]
impl Transport for InProcessNetwork {
	async fn send(
		&self,
		peer: NodeId,
		protocol: &'static str,
		payload: Vec<u8>,
		deadline: Duration,
	) -> Result<Vec<u8>, TransportError> {
		self.request_log.lock().unwrap().push((peer, protocol));

		if self.unresponsive.lock().unwrap().contains(&peer) {
			tokio::time::sleep(deadline).await;
			return Err(TransportError::Timeout)
		}

		let handler = self
			.handlers
			.lock()
			.unwrap()
			.get(&peer)
			.cloned()
			.ok_or_else(|| TransportError::Connection("unknown peer".to_string()))?;

		let response =
			tokio::time::timeout(deadline, handler.handle_request(AGGREGATOR_ID, protocol, payload))
				.await
				.map_err(|_| TransportError::Timeout)?
				.ok_or(TransportError::Closed)?;

		match self.tampers.lock().unwrap().get(&(peer, protocol)) {
			Some(tamper) => Ok(tamper(response)),
			None => Ok(response),
		}
	}
}

pub struct TestNode {
	pub engine: Arc<NodeEngine>,
	pub data_manager: Arc<InMemoryDataManager>,
}

pub struct Cluster {
	/// Node ids in sorted order.
	pub ids: Vec<NodeId>,
	pub nodes: BTreeMap<NodeId, TestNode>,
	pub network: Arc<InProcessNetwork>,
	pub directory: Arc<StaticDirectory>,
	pub coordinator: Arc<SessionCoordinator>,
}

impl Cluster {
	pub fn new(size: usize, rng_seed: u8) -> Self {
		Self::with_settings(size, rng_seed, Settings::default())
	}

	pub fn with_settings(size: usize, rng_seed: u8, settings: Settings) -> Self {
		let mut rng = Rng::from_seed([rng_seed; 32]);

		let secrets: Vec<Scalar> = (0..size).map(|_| Scalar::random(&mut rng)).collect();

		let directory = Arc::new(StaticDirectory {
			peers: secrets
				.iter()
				.map(|secret| {
					let public = Point::from_scalar(secret);
					(
						NodeId::from_public_key(&public),
						PeerInfo {
							address: "in-process".to_string(),
							long_term_public_key: public,
						},
					)
				})
				.collect(),
		});

		let network = Arc::new(InProcessNetwork::default());

		let mut nodes = BTreeMap::new();
		for secret in secrets {
			let data_manager = Arc::new(InMemoryDataManager::default());
			let engine = Arc::new(NodeEngine::new(
				secret,
				directory.clone(),
				Arc::new(AllowAll),
				Arc::new(DigestValidator),
				data_manager.clone(),
				&settings.node,
			));
			network.register(engine.id(), engine.clone());
			nodes.insert(engine.id(), TestNode { engine, data_manager });
		}

		let coordinator = Arc::new(SessionCoordinator::new(
			network.clone(),
			directory.clone(),
			Arc::new(AnySeed),
			Arc::new(DigestValidator),
			settings,
		));

		Cluster {
			ids: nodes.keys().copied().collect(),
			nodes,
			network,
			directory,
			coordinator,
		}
	}

	pub fn dkg_params(&self, threshold: u32, party_size: usize) -> DkgParams {
		DkgParams {
			threshold,
			party_size,
			candidates: self.ids.clone(),
			app_name: "test-app".to_string(),
			seed: TEST_SEED,
		}
	}

	pub fn node(&self, id: &NodeId) -> &TestNode {
		&self.nodes[id]
	}
}

/// Send a request straight into an engine's handler, as the transport
/// adapter would, and decode the response.
pub async fn call_handler(engine: &NodeEngine, request: &Request) -> Option<ResponsePayload> {
	engine
		.handle_request(AGGREGATOR_ID, request.protocol(), request.encode())
		.await
		.map(|bytes| ResponsePayload::decode(&bytes).expect("response must decode"))
}
