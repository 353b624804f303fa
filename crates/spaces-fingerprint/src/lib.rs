//! # Spaces Fingerprint
//!
//! URL canonicalization and tab-list fingerprinting.
//!
//! A saved space is rematched to a live window by comparing a 32-bit
//! fingerprint of the window's tab URLs against the fingerprints stored with
//! each saved session. Two things make that comparison stable:
//!
//! - [`clean_url`] strips the parts of a URL that churn without changing the
//!   page identity (fragment, query string, tab-suspender wrappers) and drops
//!   URLs that should never participate in matching (extension-internal
//!   pages).
//! - [`session_hash`] folds the cleaned URLs, in tab order, into a single
//!   `u32`.
//!
//! # Compatibility
//!
//! The hash recurrence operates on UTF-16 code units and truncates to a
//! signed 32-bit register after every step. Fingerprints computed by earlier
//! releases are stored on disk and compared directly, so the algorithm must
//! not change. [`session_hash`] has a pinned regression test for this reason.

mod clean;
mod hash;

pub use clean::clean_url;
pub use hash::session_hash;
