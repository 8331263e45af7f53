//! scholar-gateway: the constrained interface to the hosted backend.
//!
//! Everything the portal reads or writes goes through [`QueryGateway`]:
//! row-filtered `select` / `insert` / `update` / `delete` / `upsert`
//! against named relations, plus RPC calls. Row-level policy is enforced
//! by the backend; nothing here filters for security.
//!
//! Two implementations ship with the crate:
//! - [`HttpGateway`] talks to a PostgREST-style REST endpoint.
//! - [`MemoryGateway`] keeps relations in memory for tests and local runs.

mod error;
mod gateway;
mod http;
mod memory;
mod query;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{QueryGateway, QueryGatewayExt};
pub use http::{HttpGateway, HttpGatewayOptions};
pub use memory::{MemoryGateway, RpcHandler};
pub use query::{Filter, Order, Select};
