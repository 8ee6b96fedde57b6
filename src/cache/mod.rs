//! Cache requests and key semantics
//!
//! A request names one primary key and an ordered list of restore keys.
//! The primary key is the only key that can produce an exact hit; restore
//! keys are prefixes tried in order when it misses, and the first one that
//! matches wins.

pub mod key;
pub mod request;

pub use key::{is_exact_key_match, validate_key, validate_keys, validate_paths};
pub use request::{CacheInputs, CacheOutcome, CacheRequest};
