//! Framed JSON-RPC transport for the command service.
//!
//! Length-prefixed JSON-RPC 2.0 over TCP.
//!
//! # Architecture
//!
//! - **Server**: accepts connections and hands each request to an [`RpcDispatch`]
//! - **Dispatch**: authenticates and routes requests to the [`CommandService`](crate::service::CommandService)
//! - **Client**: typed calls for admin tools and chat bots
//! - **Protocol**: shared framing and JSON-RPC types used by both sides

pub mod client;
pub mod dispatch;
pub mod protocol;
pub mod server;

pub use client::BotioClient;
pub use dispatch::CommandDispatch;
pub use protocol::{RpcRequest, RpcResponse};
pub use server::{RpcDispatch, RpcServer, RpcServerHandle};
