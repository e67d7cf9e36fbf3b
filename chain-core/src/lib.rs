//! Incident process chain reconstruction engine.
//!
//! This crate is the pure, synchronous-everywhere-except-the-facade core
//! described by spec.md: given alarms and logs for a set of hosts, it
//! reconstructs a process-centric graph per `traceId`, guarantees every
//! trace ends up with exactly one root, and extracts a servable
//! [`model::IncidentProcessChain`]. It depends on the outside world only
//! through [`facade::IndexFacade`] — no concrete search-index client, no
//! HTTP, no persistence lives here.

pub mod builder;
pub mod config;
pub mod elector;
pub mod entity;
pub mod error;
pub mod explore_root;
pub mod extender;
pub mod facade;
pub mod graph;
pub mod identifier;
pub mod merger;
pub mod model;
pub mod pipeline;
pub mod pruner;
pub mod role_corrector;
pub mod virtual_parent;

pub use config::ChainConfig;
pub use error::{ChainError, ChainResult};
pub use facade::IndexFacade;
pub use model::IncidentProcessChain;
