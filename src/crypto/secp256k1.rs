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

use num_bigint::BigUint;
use secp256k1::constants::{CURVE_ORDER, SECRET_KEY_SIZE};
use serde::{Deserialize, Serialize};

use super::{CryptoError, Rng};

type SK = secp256k1::SecretKey;
type PK = secp256k1::PublicKey;

// Wrapping in `Option` to make it easier to keep track
// of "zero" scalars which often need special treatment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar(Option<SK>);

// None if it is a "point at infinity"
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Point(Option<PK>);

const GENERATOR_COMPRESSED: [u8; 33] = [
	0x02, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87, 0x0B,
	0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8, 0x17,
	0x98,
];

const POINT_AT_INFINITY_COMPRESSED: [u8; 33] = [0; 33];
const ZERO_SCALAR_BYTES: [u8; 32] = [0; 32];

lazy_static::lazy_static! {
	static ref GENERATOR: Point = Point(Some(PK::from_slice(&GENERATOR_COMPRESSED).unwrap()));
	static ref GROUP_ORDER: BigUint = BigUint::from_bytes_be(&CURVE_ORDER);
}

struct BytesVisitor<const N: usize>;

impl<'de, const N: usize> serde::de::Visitor<'de> for BytesVisitor<N> {
	type Value = [u8; N];

	fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "an array of {N} bytes")
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
	where
		A: serde::de::SeqAccess<'de>,
	{
		let mut bytes = [0u8; N];
		for (i, byte) in bytes.iter_mut().enumerate() {
			*byte = seq
				.next_element()?
				.ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
		}
		Ok(bytes)
	}
}

fn serialize_fixed<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
	use serde::ser::SerializeTuple;
	let mut tup = serializer.serialize_tuple(bytes.len())?;
	for byte in bytes {
		tup.serialize_element(byte)?;
	}
	tup.end()
}

impl Point {
	pub fn generator() -> &'static Point {
		&GENERATOR
	}

	pub fn from_scalar(scalar: &Scalar) -> Self {
		*Self::generator() * scalar
	}

	pub fn identity() -> Self {
		Point(None)
	}

	pub fn is_identity(&self) -> bool {
		self.0.is_none()
	}

	pub fn as_bytes(&self) -> [u8; 33] {
		match self.0 {
			Some(pk) => pk.serialize(),
			None => POINT_AT_INFINITY_COMPRESSED,
		}
	}

	pub fn from_bytes(bytes: &[u8; 33]) -> Result<Self, CryptoError> {
		if bytes == &POINT_AT_INFINITY_COMPRESSED {
			Ok(Point(None))
		} else {
			PK::from_slice(bytes).map(|pk| Point(Some(pk))).map_err(|_| CryptoError::MalformedPoint)
		}
	}

	/// The inner key of a non-identity point. Only called on aggregate
	/// values that have been checked against the identity already.
	pub fn get_element(&self) -> secp256k1::PublicKey {
		self.0.expect("unexpected point at infinity")
	}
}

impl<B: std::borrow::Borrow<Scalar>> std::ops::Mul<B> for Point {
	type Output = Self;

	fn mul(self, scalar: B) -> Self::Output {
		let inner = match (self.0, scalar.borrow().0) {
			(None, _) | (_, None) => {
				// multiplication by 0 creates a "point at infinity"
				None
			},
			(Some(point), Some(scalar)) => Some(
				point
					.mul_tweak(secp256k1::SECP256K1, &scalar.into())
					.expect("scalar must be valid and non-zero"),
			),
		};

		Point(inner)
	}
}

impl std::ops::Add for Point {
	type Output = Self;

	fn add(self, rhs: Self) -> Self::Output {
		let inner = match (self.0, rhs.0) {
			(None, rhs) => rhs,
			(lhs, None) => lhs,
			(Some(lhs), Some(rhs)) => {
				// `combine` can only fail if the result is a point at
				// infinity, which we represent with `None`
				lhs.combine(&rhs).ok()
			},
		};
		Point(inner)
	}
}

impl std::ops::Sub for Point {
	type Output = Self;

	#[allow(clippy::suspicious_arithmetic_impl)]
	fn sub(self, rhs: Self) -> Self::Output {
		// Only negate if non-zero
		self + Point(rhs.0.map(|x| x.negate(secp256k1::SECP256K1)))
	}
}

impl std::iter::Sum for Point {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		iter.fold(Point::identity(), |acc, x| acc + x)
	}
}

impl Serialize for Point {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serialize_fixed(&self.as_bytes(), serializer)
	}
}

impl<'de> Deserialize<'de> for Point {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let bytes = deserializer.deserialize_tuple(33, BytesVisitor::<33>)?;
		Point::from_bytes(&bytes).map_err(serde::de::Error::custom)
	}
}

impl Scalar {
	/// Expects `x` to be within the group, i.e.
	/// it is smaller than the group's order
	fn from_reduced_bigint(x: &BigUint) -> Self {
		use num_traits::identities::Zero;

		assert!(x < &GROUP_ORDER, "x not within the group");

		if x.is_zero() {
			Scalar(None)
		} else {
			let x_bytes = x.to_bytes_be();
			let mut array = [0u8; SECRET_KEY_SIZE];
			array[SECRET_KEY_SIZE - x_bytes.len()..].copy_from_slice(&x_bytes);

			// Safe because `x` is within the group
			// and `array` is correct size by construction
			Scalar(Some(SK::from_slice(&array).unwrap()))
		}
	}

	pub fn random(rng: &mut Rng) -> Self {
		// The key is guaranteed to be non-zero by
		// the implementation of SK::new
		Scalar(Some(SK::new(rng)))
	}

	pub fn from_bytes_mod_order(x: &[u8; 32]) -> Self {
		// reduce `x` to make it a valid element in the group
		let x = {
			let mut x = BigUint::from_bytes_be(x);

			// Because the source is only 32 bytes, we know that
			// it must be smaller than twice secp256k1's order,
			// so a single subtraction is sufficient here
			if x >= *GROUP_ORDER {
				x -= &*GROUP_ORDER;
			}
			x
		};

		Self::from_reduced_bigint(&x)
	}

	pub fn zero() -> Self {
		Scalar(None)
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_none()
	}

	pub fn to_bytes(&self) -> [u8; 32] {
		match self.0.as_ref() {
			Some(sk) => sk.secret_bytes(),
			None => ZERO_SCALAR_BYTES,
		}
	}

	// Note that we don't need this to be constant-time as we
	// only invert public values (Lagrange denominators).
	pub fn invert(&self) -> Option<Self> {
		self.0.map(|x| {
			let x = BigUint::from_bytes_be(&x.secret_bytes());

			// Modular multiplicative inverse is equivalent to raising
			// to the power of `order - 2` as the order is prime
			// (Euler's theorem)
			let inverse = x.modpow(&(&*GROUP_ORDER - 2u32), &GROUP_ORDER);

			Self::from_reduced_bigint(&inverse)
		})
	}
}

impl Ord for Scalar {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.to_bytes().cmp(&other.to_bytes())
	}
}

impl PartialOrd for Scalar {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl zeroize::Zeroize for Scalar {
	fn zeroize(&mut self) {
		use core::sync::atomic;
		unsafe { std::ptr::write_volatile(self, Scalar::zero()) };
		atomic::compiler_fence(atomic::Ordering::SeqCst);
	}
}

impl Drop for Scalar {
	fn drop(&mut self) {
		use zeroize::Zeroize;
		self.zeroize();
	}
}

impl Default for Scalar {
	fn default() -> Self {
		Scalar::zero()
	}
}

impl From<u32> for Scalar {
	fn from(x: u32) -> Self {
		if x == 0 {
			Scalar(None)
		} else {
			let mut array = [0u8; 32];
			array[28..].copy_from_slice(&x.to_be_bytes());

			// Since `x` is u32, we know it to be within the curve
			// order, and the slice is 32 bytes by construction
			Scalar(Some(SK::from_slice(&array).unwrap()))
		}
	}
}

impl std::ops::Add for &Scalar {
	type Output = Scalar;

	fn add(self, rhs: Self) -> Self::Output {
		let inner = match (self.0, rhs.0) {
			(None, rhs) => rhs,
			(lhs, None) => lhs,
			(Some(lhs), Some(rhs)) => {
				// Both operands are valid non-zero group elements and
				// the addition is done modulo the group order, so this
				// can only fail if the result itself is zero
				lhs.add_tweak(&rhs.into()).ok()
			},
		};

		Scalar(inner)
	}
}

impl std::ops::Sub for &Scalar {
	type Output = Scalar;

	#[allow(clippy::suspicious_arithmetic_impl)]
	fn sub(self, rhs: Self) -> Self::Output {
		match rhs.0 {
			None => self.clone(),
			Some(x) => {
				// it is safe to negate a non-zero scalar
				self + &Scalar(Some(x.negate()))
			},
		}
	}
}

impl std::ops::Mul for &Scalar {
	type Output = Scalar;

	fn mul(self, rhs: Self) -> Self::Output {
		let inner = match (self.0, rhs.0) {
			(None, _) | (_, None) => None,
			(Some(lhs), Some(rhs)) => Some(
				lhs.mul_tweak(&rhs.into())
					.expect("can't fail if both operands are valid"),
			),
		};
		Scalar(inner)
	}
}

impl std::ops::Add for Scalar {
	type Output = Scalar;

	fn add(self, rhs: Self) -> Self::Output {
		&self + &rhs
	}
}

impl std::ops::Sub for Scalar {
	type Output = Scalar;

	fn sub(self, rhs: Self) -> Self::Output {
		&self - &rhs
	}
}

impl std::ops::Mul for Scalar {
	type Output = Scalar;

	fn mul(self, rhs: Self) -> Self::Output {
		&self * &rhs
	}
}

impl std::iter::Sum for Scalar {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		iter.fold(Scalar::zero(), |acc, x| &acc + &x)
	}
}

impl Serialize for Scalar {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serialize_fixed(&self.to_bytes(), serializer)
	}
}

impl<'de> Deserialize<'de> for Scalar {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let bytes = deserializer.deserialize_tuple(32, BytesVisitor::<32>)?;

		if bytes == ZERO_SCALAR_BYTES {
			Ok(Scalar::zero())
		} else {
			SK::from_slice(&bytes)
				.map(|x| Scalar(Some(x)))
				.map_err(serde::de::Error::custom)
		}
	}
}
