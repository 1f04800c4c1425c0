//! Filemock: a file-convention mock HTTP server.
//!
//! A directory of plain files maps onto HTTP routes through a compact
//! filename grammar; incoming requests resolve to the best-matching mock via
//! a deterministic scoring algorithm with content negotiation. Live upstream
//! traffic can be recorded back into the same grammar, and mocks can be
//! converted between standalone files and single-file collections.

// ===== Core: codec, discovery, resolution =====
pub mod descriptor;
pub mod pattern;
pub mod repository;
pub mod resolver;

// ===== Response pipeline =====
pub mod context;
pub mod negotiate;
pub mod response;
pub mod template;

// ===== Recording and conversion =====
pub mod convert;
pub mod recorder;

// ===== Server =====
pub mod config;
pub mod server;

pub mod error;
mod mime;
