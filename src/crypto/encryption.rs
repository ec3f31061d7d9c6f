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

//! Pairwise encryption of dealt shares: ECDH shared point, HKDF-SHA256 key
//! derivation, ChaCha20-Poly1305 sealing with a random prefixed nonce.

use chacha20poly1305::{
	aead::{Aead, KeyInit},
	ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use super::{CryptoError, Point, Rng, Scalar};

const HKDF_INFO: &[u8] = b"frost-engine/share-encryption/v1";
const NONCE_SIZE: usize = 12;

/// K_AB = x_A·P_B (= x_B·P_A). Fails if either side contributed a zero
/// value, which would make the shared point the identity.
pub fn shared_point(own_secret: &Scalar, their_public: &Point) -> Result<Point, CryptoError> {
	let shared = *their_public * own_secret;
	if shared.is_identity() {
		Err(CryptoError::PointAtInfinity)
	} else {
		Ok(shared)
	}
}

/// HKDF-SHA256 with an empty salt over the compressed shared point.
pub fn derive_symmetric_key(shared: &Point) -> [u8; 32] {
	let hk = Hkdf::<Sha256>::new(None, &shared.as_bytes());
	let mut key = [0u8; 32];
	hk.expand(HKDF_INFO, &mut key).expect("32 bytes is a valid HKDF output length");
	key
}

pub fn seal(key: &[u8; 32], plaintext: &[u8], rng: &mut Rng) -> Vec<u8> {
	let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

	let mut nonce = [0u8; NONCE_SIZE];
	rng.fill_bytes(&mut nonce);

	let ciphertext = cipher
		.encrypt(Nonce::from_slice(&nonce), plaintext)
		.expect("encryption is infallible for in-memory plaintext");

	let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
	sealed.extend_from_slice(&nonce);
	sealed.extend_from_slice(&ciphertext);
	sealed
}

pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
	if sealed.len() < NONCE_SIZE {
		return Err(CryptoError::AeadFailure)
	}
	let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

	let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
	cipher
		.decrypt(Nonce::from_slice(nonce), ciphertext)
		.map_err(|_| CryptoError::AeadFailure)
}
