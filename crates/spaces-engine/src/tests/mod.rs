//! Integration tests for the space reconciliation engine.
//!
//! Test organization:
//!
//! - `harness.rs`   - Scripted mock platform and engine test harness
//! - `init.rs`      - Cold start, restart rebinding, version hook, single-flight
//! - `matching.rs`  - Fingerprint matching, temporary sessions, bind displacement
//! - `events.rs`    - Tab/window events, burst coalescing, internal filtering
//! - `removal.rs`   - Window close cascades, the closed set, duplicate events
//! - `history.rs`   - History queue draining through live events
//! - `naming.rs`    - Save/rename name-conflict arbitration
//! - `api.rs`       - User-facing mutations and queries
//! - `bounds.rs`    - Bounds capture debouncing
//! - `protocol.rs`  - End-to-end dispatch over the wire protocol

mod init;
mod protocol;
