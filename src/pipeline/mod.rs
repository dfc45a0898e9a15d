//! Request/response stages shared by the sync, async and batch paths.
//!
//! ```text
//! input ──▶ encode ──▶ (HTTP) ──▶ decode ──▶ tables
//! (validate) (base64/payload)     (key probe) (HTML → JSON/CSV)
//! ```
//!
//! 1. [`input`]  validate a path or base64 payload and its file type
//! 2. [`encode`] read and base64 the file, build per-operation JSON bodies
//! 3. [`decode`] find the payload key in the response and extract it
//! 4. [`tables`] optional conversion of extracted HTML tables
//!
//! None of these stages perform network I/O; that lives in
//! [`crate::client`], [`crate::jobs`] and [`crate::batch`].

pub mod decode;
pub mod encode;
pub mod input;
pub mod tables;
