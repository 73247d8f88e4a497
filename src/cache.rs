//! Cache-key fingerprinting.
//!
//! A node's cache key is a deterministic digest of `(node id, params,
//! upstream revisions)`. The contract is equality and diffusion, not
//! cryptographic strength: xxh3-64 is used because it is fast and stable
//! across runs and processes.
//!
//! Properties:
//! - param keys are visited in sorted order ([`Params`] is a `BTreeMap`),
//!   so reordering keys does not change the key
//! - upstream revisions are hashed as an ordered sequence, so swapping two
//!   inputs invalidates
//! - field and entry separators prevent concatenation collisions

use xxhash_rust::xxh3::Xxh3;

use crate::pipeline::{ParamValue, Params};

/// Computes the cache key for a node, rendered as fixed-width hex.
#[must_use]
pub fn cache_key(node_id: &str, params: &Params, upstream_revisions: &[u64]) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(node_id.as_bytes());
    hasher.update(&[0xff]);

    for (key, value) in params {
        hasher.update(key.as_bytes());
        hasher.update(&[0x1f]);
        match value {
            ParamValue::Bool(b) => {
                hasher.update(b"b");
                hasher.update(&[u8::from(*b)]);
            }
            ParamValue::Number(n) => {
                hasher.update(b"n");
                hasher.update(&n.to_bits().to_le_bytes());
            }
            ParamValue::Text(s) => {
                hasher.update(b"s");
                hasher.update(s.as_bytes());
            }
        }
        hasher.update(&[0x1e]);
    }

    hasher.update(&[0xff]);
    for revision in upstream_revisions {
        hasher.update(&revision.to_le_bytes());
    }

    format!("{:016x}", hasher.digest())
}
