//! # tanglematch-nodes
//!
//! **Node Plane**: health-checked access to ledger nodes.
//!
//! ## Architecture
//!
//! 1. **NodeApi**: the four calls the engine needs from any node
//! 2. **HttpNodeApi**: the REST implementation
//! 3. **NodeClientPool**: random candidate selection, health gating,
//!    bounded failover, per-pool client cache
//!
//! ## Acquisition Flow
//!
//! ```text
//! caller → NodeClientPool.acquire(network, exclude)
//!        → pick candidate → health + info → AcquiredClient
//!        → (on failure: jittered backoff, retry, ≤ 5 attempts)
//! ```
//!
//! Every chain-touching operation in the engine starts with an
//! [`AcquiredClient`].

pub mod api;
pub mod http;
pub mod pool;

pub use api::{NodeApi, NodeInfo, UnspentOutput};
pub use http::HttpNodeApi;
pub use pool::{AcquiredClient, HttpConnector, NodeClientPool, NodeConnector};
