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

//! Node engine tests, driving the round handlers directly the way the
//! aggregator would.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
	crypto::{
		dleq::{resolve_complaint, ComplaintVerdict},
		polynomial::reconstruct_secret,
		NodeId, Point, Scalar,
	},
	data_manager::{DataManager, InMemoryDataManager},
	helpers::{call_handler, Cluster},
	node::NodeEngine,
	settings::Settings,
	transport::{AuthorizationPredicate, RequestHandler},
	validator::DigestValidator,
	wire::{
		EncryptedShare, GenerateNoncesParameters, Request, RequestPayload, ResponsePayload,
		Round1Parameters, Round1Response, Round2Parameters, Round2Response, Round3Parameters,
		Round3Response, SignParameters, Status,
	},
};

async fn run_round1(
	cluster: &Cluster,
	dkg_id: &str,
	threshold: u32,
) -> BTreeMap<NodeId, Round1Response> {
	let mut round1 = BTreeMap::new();
	for (id, node) in &cluster.nodes {
		let request = Request::new(
			dkg_id,
			RequestPayload::Round1(Round1Parameters {
				party: cluster.ids.clone(),
				dkg_id: dkg_id.to_string(),
				app_name: "test-app".to_string(),
				threshold,
			}),
		);
		match call_handler(&node.engine, &request).await.unwrap() {
			ResponsePayload::Round1(response) => {
				round1.insert(*id, response);
			},
			other => panic!("unexpected round 1 response: {other:?}"),
		}
	}
	round1
}

async fn run_round2(
	cluster: &Cluster,
	dkg_id: &str,
	round1: &BTreeMap<NodeId, Round1Response>,
) -> BTreeMap<NodeId, Round2Response> {
	let mut round2 = BTreeMap::new();
	for (id, node) in &cluster.nodes {
		let request = Request::new(
			dkg_id,
			RequestPayload::Round2(Round2Parameters {
				dkg_id: dkg_id.to_string(),
				broadcasted_data: round1.clone(),
			}),
		);
		match call_handler(&node.engine, &request).await.unwrap() {
			ResponsePayload::Round2(response) => {
				round2.insert(*id, response);
			},
			other => panic!("unexpected round 2 response: {other:?}"),
		}
	}
	round2
}

fn shares_for(round2: &BTreeMap<NodeId, Round2Response>, receiver: &NodeId) -> Vec<EncryptedShare> {
	round2
		.values()
		.flat_map(|response| response.broadcast.iter())
		.filter(|share| share.receiver_id == *receiver)
		.cloned()
		.collect()
}

async fn run_round3_for(
	cluster: &Cluster,
	dkg_id: &str,
	receiver: &NodeId,
	round2: &BTreeMap<NodeId, Round2Response>,
) -> Round3Response {
	let request = Request::new(
		dkg_id,
		RequestPayload::Round3(Round3Parameters {
			dkg_id: dkg_id.to_string(),
			send_data: shares_for(round2, receiver),
		}),
	);
	match call_handler(&cluster.node(receiver).engine, &request).await.unwrap() {
		ResponsePayload::Round3(response) => response,
		other => panic!("unexpected round 3 response: {other:?}"),
	}
}

#[tokio::test]
async fn honest_dkg_yields_a_consistent_shamir_sharing() {
	let cluster = Cluster::new(3, 21);
	let dkg_id = "dkg-happy";

	let round1 = run_round1(&cluster, dkg_id, 2).await;
	let round2 = run_round2(&cluster, dkg_id, &round1).await;

	let mut group_keys = Vec::new();
	for id in &cluster.ids {
		match run_round3_for(&cluster, dkg_id, id, &round2).await {
			Round3Response::Successful { data, .. } => group_keys.push(data.dkg_public_key),
			Round3Response::Complaint { proofs } =>
				panic!("unexpected complaints from {id}: {proofs:?}"),
		}
	}
	assert!(group_keys.windows(2).all(|pair| pair[0] == pair[1]));
	let group_key = group_keys[0];

	// The derived shares form a valid (2, 3) sharing of the implicit
	// secret underlying the group key
	let shares: BTreeMap<NodeId, Scalar> = cluster
		.nodes
		.iter()
		.map(|(id, node)| (*id, node.engine.key_share(dkg_id).unwrap().share))
		.collect();

	let any_two: BTreeMap<NodeId, Scalar> = shares.clone().into_iter().take(2).collect();
	assert_eq!(Point::from_scalar(&reconstruct_secret(&any_two)), group_key);
	assert_eq!(Point::from_scalar(&reconstruct_secret(&shares)), group_key);

	// Every node derived the same public share table
	let tables: Vec<_> = cluster
		.nodes
		.values()
		.map(|node| node.engine.key_share(dkg_id).unwrap().public_shares)
		.collect();
	assert!(tables.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn corrupted_share_raises_a_complaint_against_the_dealer() {
	let cluster = Cluster::new(3, 22);
	let dkg_id = "dkg-complaint";

	let round1 = run_round1(&cluster, dkg_id, 2).await;
	let mut round2 = run_round2(&cluster, dkg_id, &round1).await;

	let receiver = cluster.ids[0];
	let dealer = cluster.ids[1];

	// Corrupt the dealer's ciphertext addressed to the receiver
	let share = round2
		.get_mut(&dealer)
		.unwrap()
		.broadcast
		.iter_mut()
		.find(|share| share.receiver_id == receiver)
		.unwrap();
	*share.ciphertext.last_mut().unwrap() ^= 1;
	let tampered_ciphertext = share.ciphertext.clone();

	let proofs = match run_round3_for(&cluster, dkg_id, &receiver, &round2).await {
		Round3Response::Complaint { proofs } => proofs,
		Round3Response::Successful { .. } => panic!("expected a complaint"),
	};

	assert_eq!(proofs.len(), 1);
	assert_eq!(proofs[0].accuser, receiver);
	assert_eq!(proofs[0].accused, dealer);

	// Any third party resolves the complaint against the dealer
	assert_eq!(
		resolve_complaint(
			&proofs[0],
			&round1[&receiver].broadcast.encryption_key,
			&round1[&dealer].broadcast.encryption_key,
			&round1[&dealer].broadcast.commitments,
			&tampered_ciphertext,
		),
		ComplaintVerdict::AccusedAtFault
	);

	// The complaining node retains no key material for the session
	assert!(cluster.node(&receiver).engine.key_share(dkg_id).is_none());
}

#[tokio::test]
async fn requests_out_of_phase_are_rejected() {
	let cluster = Cluster::new(3, 23);
	let id = cluster.ids[0];
	let engine = &cluster.node(&id).engine;

	// Round 2 with no session at all
	let request = Request::new(
		"dkg-none",
		RequestPayload::Round2(Round2Parameters {
			dkg_id: "dkg-none".to_string(),
			broadcasted_data: BTreeMap::new(),
		}),
	);
	assert!(matches!(
		call_handler(engine, &request).await.unwrap(),
		ResponsePayload::Failure { status: Status::Error, .. }
	));

	// Round 3 while the session is still in round 1
	let round1 = run_round1(&cluster, "dkg-phase", 2).await;
	assert_eq!(round1.len(), 3);

	let request = Request::new(
		"dkg-phase",
		RequestPayload::Round3(Round3Parameters {
			dkg_id: "dkg-phase".to_string(),
			send_data: vec![],
		}),
	);
	assert!(matches!(
		call_handler(engine, &request).await.unwrap(),
		ResponsePayload::Failure { status: Status::Error, .. }
	));

	// A second round 1 for an already-active session
	let request = Request::new(
		"dkg-phase",
		RequestPayload::Round1(Round1Parameters {
			party: cluster.ids.clone(),
			dkg_id: "dkg-phase".to_string(),
			app_name: "test-app".to_string(),
			threshold: 2,
		}),
	);
	assert!(matches!(
		call_handler(engine, &request).await.unwrap(),
		ResponsePayload::Failure { status: Status::Error, .. }
	));
}

#[tokio::test]
async fn nonce_pool_enforces_its_cap() {
	let mut settings = Settings::default();
	settings.node.max_nonce_pool = 150;
	let cluster = Cluster::with_settings(1, 24, settings);
	let engine = &cluster.node(&cluster.ids[0]).engine;

	let generate = |count| {
		Request::new(
			"req",
			RequestPayload::GenerateNonces(GenerateNoncesParameters { number_of_nonces: count }),
		)
	};

	match call_handler(engine, &generate(100)).await.unwrap() {
		ResponsePayload::Nonces(response) => assert_eq!(response.nonces.len(), 100),
		other => panic!("unexpected response: {other:?}"),
	}

	// The second batch is clamped to the remaining capacity
	match call_handler(engine, &generate(100)).await.unwrap() {
		ResponsePayload::Nonces(response) => assert_eq!(response.nonces.len(), 50),
		other => panic!("unexpected response: {other:?}"),
	}
	assert_eq!(engine.nonce_pool_size(), 150);

	// A full pool refuses outright
	assert!(matches!(
		call_handler(engine, &generate(1)).await.unwrap(),
		ResponsePayload::Failure { status: Status::Error, .. }
	));
}

#[tokio::test]
async fn signing_consumes_the_nonce_pair_exactly_once() {
	let cluster = Cluster::new(3, 25);
	let dkg_id = "dkg-sign";

	let round1 = run_round1(&cluster, dkg_id, 2).await;
	let round2 = run_round2(&cluster, dkg_id, &round1).await;
	for id in &cluster.ids {
		assert!(matches!(
			run_round3_for(&cluster, dkg_id, id, &round2).await,
			Round3Response::Successful { .. }
		));
	}

	// One nonce pair each for two signers
	let mut commitments_list = BTreeMap::new();
	for id in cluster.ids.iter().take(2) {
		let request = Request::new(
			"req",
			RequestPayload::GenerateNonces(GenerateNoncesParameters { number_of_nonces: 1 }),
		);
		match call_handler(&cluster.node(id).engine, &request).await.unwrap() {
			ResponsePayload::Nonces(response) => {
				commitments_list.insert(*id, response.nonces[0]);
			},
			other => panic!("unexpected response: {other:?}"),
		}
	}

	let signer = cluster.ids[0];
	let engine = &cluster.node(&signer).engine;
	assert_eq!(engine.nonce_pool_size(), 1);

	let sign_request = Request::new(
		dkg_id,
		RequestPayload::Sign(SignParameters {
			dkg_id: dkg_id.to_string(),
			commitments_list: commitments_list.clone(),
			input_data: b"hello".to_vec(),
		}),
	);

	match call_handler(engine, &sign_request).await.unwrap() {
		ResponsePayload::Sign(response) => {
			assert_eq!(response.signature_data.id, signer);
			assert_eq!(response.data, b"hello".to_vec());
		},
		other => panic!("unexpected response: {other:?}"),
	}

	// Consumed synchronously with the signing computation, in memory and
	// in the persisted table
	assert_eq!(engine.nonce_pool_size(), 0);
	assert!(cluster.node(&signer).data_manager.get_nonces().is_empty());

	// The same commitments cannot be used again
	assert!(matches!(
		call_handler(engine, &sign_request).await.unwrap(),
		ResponsePayload::Failure { status: Status::Error, .. }
	));

	// A rejected input fails with FAILED and consumes nothing
	let rejected = Request::new(
		dkg_id,
		RequestPayload::Sign(SignParameters {
			dkg_id: dkg_id.to_string(),
			commitments_list,
			input_data: vec![],
		}),
	);
	assert!(matches!(
		call_handler(&cluster.node(&cluster.ids[1]).engine, &rejected).await.unwrap(),
		ResponsePayload::Failure { status: Status::Failed, .. }
	));
	assert_eq!(cluster.node(&cluster.ids[1]).engine.nonce_pool_size(), 1);
}

#[tokio::test]
async fn unauthorized_callers_get_no_response() {
	struct DenyAll;
	impl AuthorizationPredicate for DenyAll {
		fn is_authorized(&self, _caller: &NodeId, _protocol: &str) -> bool {
			false
		}
	}

	let mut rng = <crate::crypto::Rng as rand::SeedableRng>::from_seed([26; 32]);
	let cluster = Cluster::new(1, 26);

	let engine = NodeEngine::new(
		Scalar::random(&mut rng),
		cluster.directory.clone(),
		Arc::new(DenyAll),
		Arc::new(DigestValidator),
		Arc::new(InMemoryDataManager::default()),
		&Settings::default().node,
	);

	let request = Request::new(
		"req",
		RequestPayload::GenerateNonces(GenerateNoncesParameters { number_of_nonces: 1 }),
	);
	assert!(engine
		.handle_request(cluster.ids[0], request.protocol(), request.encode())
		.await
		.is_none());

	// Undecodable bytes close the stream even for an authorized caller
	assert!(cluster
		.node(&cluster.ids[0])
		.engine
		.handle_request(cluster.ids[0], "/frost-engine/sign/1.0.0", vec![0xff])
		.await
		.is_none());
}
