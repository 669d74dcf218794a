//! `async` [RFC 6455](https://www.rfc-editor.org/rfc/rfc6455) WebSocket frame engine over
//! split byte streams, with pooled buffers and independent read and write locks.

#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Examples
//!
//! In the following examples, `Noop` is a mock type that implements the required traits for using a [`Connection`].
//! - A `reader` is anything that implements [`embedded_io_async::Read`].
//! - A `writer` is anything that implements [`embedded_io_async::Write`] with the same error type.
//! - A `rng` is anything that implements [`rand_core::RngCore`].
//!
//! ## Client
//! ```no_run
//! # async fn client() {
//! # use wsconn::mock::Noop;
//! use wsconn::{Connection, http::Header, options::ConnectOptions};
//!
//! // The two halves of an already connected stream.
//! let (reader, writer) = (Noop, Noop);
//!
//! // Impl rand_core RngCore.
//! let rng = Noop;
//!
//! // Perform a WebSocket handshake as a client.
//! // 16 is the max number of response headers to allocate space for.
//! let connection = Connection::connect::<16>(
//!     ConnectOptions::new("/ws")
//!         .with_host("example.com")
//!         .with_headers(&[Header {
//!             name: "User-Agent",
//!             value: b"wsconn",
//!         }]),
//!     reader,
//!     writer,
//!     rng,
//! )
//! .await
//! .expect("Handshake failed");
//!
//! connection
//!     .write_text("Hello, WebSocket!")
//!     .await
//!     .expect("Failed to send message");
//!
//! // Receive messages until the connection is closed.
//! while let Ok(message) = connection.read_msg().await {
//!     let _ = message;
//! }
//! # }
//! ```
//!
//! ## Server
//! ```no_run
//! # async fn server() {
//! # use wsconn::mock::Noop;
//! use wsconn::{Connection, error::Error, options::{AcceptOptions, BufferOptions}};
//!
//! let (reader, writer) = (Noop, Noop);
//!
//! // Perform a WebSocket handshake as a server.
//! // Scratch buffers are borrowed from a process-wide pool per operation.
//! let connection = Connection::accept::<16>(
//!     AcceptOptions::default().with_buffers(BufferOptions::new().with_shared(true)),
//!     reader,
//!     writer,
//!     Noop,
//! )
//! .await
//! .expect("Handshake failed");
//!
//! loop {
//!     match connection.read_message().await {
//!         Ok(payload) => {
//!             if connection.write_message(&payload).await.is_err() {
//!                 break;
//!             }
//!         }
//!         Err(Error::Closed) => break,
//!         Err(err) => {
//!             let _ = err;
//!
//!             let _ = connection.close().await;
//!
//!             break;
//!         }
//!     }
//! }
//! # }
//! ```
//!
//! # Concurrency
//!
//! Every method takes `&self`. Reads are serialized behind one lock and writes
//! behind another, so a connection can be read and written at the same time.
//! [`Connection::close`] wakes any pending read or write, which then fails with
//! [`error::Error::Closed`].
//!
//! # Frames
//!
//! Every frame is treated as a whole message. Fragments are not reassembled and
//! control frames are not answered automatically; [`Connection::read_frame`] and
//! [`Connection::write_frame`] give access to them.

mod connection;
pub use connection::{Connection, Role};

pub mod error;

pub mod frame;

pub mod handshake;

pub mod http;

mod mask;
pub use mask::apply_mask;

mod message;
pub use message::Message;

#[doc(hidden)]
pub mod mock;

mod opcode;
pub use opcode::OpCode;

pub mod options;

pub mod pool;

mod signal;
