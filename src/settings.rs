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

use std::time::Duration;

use anyhow::Context;
use config::{Config, File};
use serde::Deserialize;

/// Engine tunables. Every value has a working default; deployments
/// override them from a config file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
	pub node: NodeSettings,
	pub coordinator: CoordinatorSettings,
	pub penalties: PenaltySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
	/// Hard cap on the precomputed nonce pool; generation requests beyond
	/// it are refused so a chatty aggregator cannot grow node memory
	/// without bound.
	pub max_nonce_pool: usize,
}

impl Default for NodeSettings {
	fn default() -> Self {
		NodeSettings { max_nonce_pool: 1000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
	/// Per-request deadline for every outbound round request.
	pub request_timeout_secs: u64,
	/// Cap on simultaneous outbound streams. Zero disables the bound.
	pub max_concurrent_requests: usize,
	/// Replenish a peer's nonce buffer when it drops below this depth.
	pub nonce_low_water: usize,
	/// How long a signing session waits for a buffered nonce to appear.
	pub nonce_wait_ms: u64,
	/// Maintenance loop poll interval.
	pub nonce_poll_interval_secs: u64,
	/// Signer re-selection attempts before a session fails for lack of
	/// buffered nonces.
	pub nonce_retries: u32,
}

impl Default for CoordinatorSettings {
	fn default() -> Self {
		CoordinatorSettings {
			request_timeout_secs: 50,
			max_concurrent_requests: 0,
			nonce_low_water: 10,
			nonce_wait_ms: 500,
			nonce_poll_interval_secs: 2,
			nonce_retries: 3,
		}
	}
}

impl CoordinatorSettings {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn nonce_wait(&self) -> Duration {
		Duration::from_millis(self.nonce_wait_ms)
	}

	pub fn nonce_poll_interval(&self) -> Duration {
		Duration::from_secs(self.nonce_poll_interval_secs)
	}
}

/// Weights are additive per observed outcome and decay exponentially with
/// the configured time constant. The defaults have no protocol meaning
/// beyond "malicious gets you excluded immediately, timeouts take ten".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PenaltySettings {
	pub timeout_weight: f64,
	pub error_weight: f64,
	pub malicious_weight: f64,
	/// Peers at or above this effective score are excluded from selection.
	pub remove_threshold: f64,
	pub decay_time_constant_secs: f64,
}

impl Default for PenaltySettings {
	fn default() -> Self {
		PenaltySettings {
			timeout_weight: 1.0,
			error_weight: 2.0,
			malicious_weight: 20.0,
			remove_threshold: 10.0,
			decay_time_constant_secs: 3600.0,
		}
	}
}

impl Settings {
	pub fn from_file(path: &str) -> anyhow::Result<Self> {
		Config::builder()
			.add_source(File::with_name(path))
			.build()
			.and_then(|config| config.try_deserialize())
			.with_context(|| format!("failed to load settings from {path}"))
	}
}
