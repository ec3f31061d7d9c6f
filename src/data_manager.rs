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

//! Persistence seam for a node's nonce pool and finalized key shares.
//!
//! Two tables: `nonces` (replaced wholesale, so a crash mid-signing never
//! resurrects a consumed pair) and `dkg_keys` (keyed by dkg id). Durable
//! backends are supplied by the host; the in-memory implementation here
//! backs tests and ephemeral deployments.

use std::{
	collections::HashMap,
	sync::Mutex,
};

use crate::{crypto::frost::SecretNoncePair, node::KeyShare};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait DataManager: Send + Sync {
	fn get_nonces(&self) -> Vec<SecretNoncePair>;

	/// Atomic replacement of the whole nonce table.
	fn set_nonces(&self, nonces: Vec<SecretNoncePair>);

	fn get_key(&self, dkg_id: &str) -> Option<KeyShare>;

	fn set_key(&self, dkg_id: &str, key: KeyShare);
}

#[derive(Default)]
struct Tables {
	nonces: Vec<SecretNoncePair>,
	dkg_keys: HashMap<String, KeyShare>,
}

#[derive(Default)]
pub struct InMemoryDataManager {
	tables: Mutex<Tables>,
}

impl DataManager for InMemoryDataManager {
	fn get_nonces(&self) -> Vec<SecretNoncePair> {
		self.tables.lock().unwrap().nonces.clone()
	}

	fn set_nonces(&self, nonces: Vec<SecretNoncePair>) {
		self.tables.lock().unwrap().nonces = nonces;
	}

	fn get_key(&self, dkg_id: &str) -> Option<KeyShare> {
		self.tables.lock().unwrap().dkg_keys.get(dkg_id).cloned()
	}

	fn set_key(&self, dkg_id: &str, key: KeyShare) {
		self.tables.lock().unwrap().dkg_keys.insert(dkg_id.to_string(), key);
	}
}
