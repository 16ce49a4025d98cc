//! Moonraker JSON-RPC plumbing for lunadeck.
//!
//! This crate provides the protocol types, transport codec, command
//! dispatcher and socket client used to talk to a Moonraker instance.
//!
//! # Architecture
//!
//! - [`protocol`]: JSON-RPC 2.0 message types (Request, Response, Notification)
//! - [`transport`]: ETX-delimited codec used by Moonraker's unix socket
//! - [`waits`]: the wait registry, a table of pending operation tokens
//! - [`command`]: the outbound command envelope and the [`Transport`] seam
//! - [`actions`]: [`SocketActions`], one function per remote operation
//! - [`client`]: [`SocketClient`], which sends envelopes and correlates replies
//! - [`helpers`]: decoding of server push notifications
//!
//! # Example
//!
//! ```no_run
//! use lunadeck_rpc::{SocketClient, WaitRegistry, InboundEvent};
//!
//! # async fn example() -> Result<(), lunadeck_rpc::ClientError> {
//! let mut client =
//!     SocketClient::connect_to("/home/pi/printer_data/comms/moonraker.sock", WaitRegistry::new())
//!         .await?;
//!
//! client.actions().printer_info();
//!
//! if let Some(InboundEvent::Response { dispatch, result, .. }) = client.recv().await {
//!     println!("{dispatch}: {result:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod client;
pub mod command;
pub mod helpers;
pub mod protocol;
pub mod transport;
pub mod waits;

pub use actions::SocketActions;
pub use client::{ClientError, InboundEvent, SocketClient};
pub use command::{ChannelTransport, Command, DispatchTarget, Transport};
pub use helpers::notification_to_event;
pub use protocol::{
    JSONRPC_VERSION, Message, Notification, Request, RequestId, Response, RpcError, SEND_FAILED,
};
pub use transport::{CodecError, JsonRpcCodec};
pub use waits::{PendingWait, WaitRegistry};

pub use lunadeck_types::ServerNotification;
