// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pinned bucketing hash.
//!
//! Every SDK must reproduce these buckets bit for bit, so the hash, its seed
//! and the input encoding are fixed per [`HashVersion`]:
//!
//! | Purpose | Input (UTF-8, no trailing separator) | Buckets |
//! |---------|--------------------------------------|---------|
//! | rollout | `{stickiness}:{flag_key}`            | 10 000  |
//! | variant | `{stickiness}:{flag_key}:variant`    | 1 000   |

use std::io::Cursor;

use loom_flags_core::HashVersion;
use murmur3::murmur3_32;

/// Rollout buckets; one bucket is 0.01 percentage points.
pub const ROLLOUT_BUCKETS: u32 = 10_000;

/// Variant buckets; one bucket is one permille of weight.
pub const VARIANT_BUCKETS: u32 = 1_000;

const MURMUR3_SEED: u32 = 0;

/// Hashes `input` with the algorithm pinned by `version`.
pub fn stable_hash(version: HashVersion, input: &str) -> u32 {
	match version {
		// Reading from an in-memory cursor cannot fail.
		HashVersion::Murmur3V1 => {
			murmur3_32(&mut Cursor::new(input.as_bytes()), MURMUR3_SEED).unwrap_or(0)
		}
	}
}

pub fn rollout_bucket(version: HashVersion, stickiness: &str, flag_key: &str) -> u32 {
	stable_hash(version, &format!("{stickiness}:{flag_key}")) % ROLLOUT_BUCKETS
}

pub fn variant_bucket(version: HashVersion, stickiness: &str, flag_key: &str) -> u32 {
	stable_hash(version, &format!("{stickiness}:{flag_key}:variant")) % VARIANT_BUCKETS
}
