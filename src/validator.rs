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

//! Application-side validation seams: admission of signing inputs and
//! freshness of party-selection seeds.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
#[error("input rejected: {0}")]
pub struct ValidationError(pub String);

/// The validator's view of an admissible signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
	/// Canonical message bytes all signers must agree on.
	pub canonical: Vec<u8>,
	/// The digest that is actually signed.
	pub digest: [u8; 32],
}

/// Decides admissibility of a signing request and derives the message
/// digest from the opaque application input.
#[cfg_attr(test, automock)]
pub trait AppValidator: Send + Sync {
	fn validate(&self, input_data: &[u8]) -> Result<ValidatedInput, ValidationError>;
}

/// Passes the input through untouched and signs its SHA-256. The simplest
/// useful validator; applications with structured inputs supply their own.
pub struct DigestValidator;

impl AppValidator for DigestValidator {
	fn validate(&self, input_data: &[u8]) -> Result<ValidatedInput, ValidationError> {
		if input_data.is_empty() {
			return Err(ValidationError("empty input".to_string()))
		}
		let digest: [u8; 32] = Sha256::digest(input_data).into();
		Ok(ValidatedInput { canonical: input_data.to_vec(), digest })
	}
}

pub type Seed = u64;

/// Validates party-selection seeds against a public randomness beacon
/// (e.g. a recent block hash committed with the current timestamp).
#[cfg_attr(test, automock)]
pub trait SeedOracle: Send + Sync {
	fn validate(&self, seed: Seed) -> bool;
	fn fresh(&self) -> Seed;
}
