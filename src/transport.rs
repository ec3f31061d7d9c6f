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

//! Seams to the host environment's peer-to-peer layer. The engine never
//! opens sockets itself; it talks to authenticated peers through these
//! traits and is handed inbound requests through [`RequestHandler`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::{NodeId, Point};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
	/// The deadline elapsed before a response arrived. Late bytes are
	/// discarded by the transport; they are never surfaced here.
	#[error("request timed out")]
	Timeout,
	#[error("transport failure: {0}")]
	Connection(String),
	#[error("stream closed by peer without a response")]
	Closed,
}

/// Authenticated unicast request/response streams keyed by node id.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn send(
		&self,
		peer: NodeId,
		protocol: &'static str,
		payload: Vec<u8>,
		deadline: Duration,
	) -> Result<Vec<u8>, TransportError>;
}

/// Inbound side: the host registers the node engine under each protocol
/// identifier and forwards stream payloads here. A `None` return means the
/// stream is closed with no response written.
#[async_trait]
pub trait RequestHandler: Send + Sync {
	async fn handle_request(
		&self,
		caller: NodeId,
		protocol: &str,
		payload: Vec<u8>,
	) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
	pub address: String,
	pub long_term_public_key: Point,
}

pub trait NodeDirectory: Send + Sync {
	fn lookup(&self, id: &NodeId) -> Option<PeerInfo>;

	/// Up to `n` known node ids.
	fn list(&self, n: usize) -> Vec<NodeId>;
}

/// Decides whether a caller may invoke a protocol at all. Unauthorized
/// callers get their stream closed with no response.
pub trait AuthorizationPredicate: Send + Sync {
	fn is_authorized(&self, caller: &NodeId, protocol: &str) -> bool;
}

/// Accepts every caller. Suitable for closed deployments where the
/// transport layer already restricts the peer set.
pub struct AllowAll;

impl AuthorizationPredicate for AllowAll {
	fn is_authorized(&self, _caller: &NodeId, _protocol: &str) -> bool {
		true
	}
}
