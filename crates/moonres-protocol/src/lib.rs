//! moonres-protocol: RESP2 wire protocol implementation.
//!
//! Provides a single-pass parser and direct-to-buffer serialization of
//! the RESP2 protocol used for client-server communication, plus the
//! command re-serialization helper the append-only log relies on.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use moonres_protocol::{parse_frame, Frame};
//!
//! // parse a simple string
//! let input = b"+OK\r\n";
//! let (frame, consumed) = parse_frame(input).unwrap().unwrap();
//! assert_eq!(frame, Frame::Simple("OK".into()));
//! assert_eq!(consumed, input.len());
//!
//! // serialize a frame
//! let mut buf = BytesMut::new();
//! frame.serialize(&mut buf);
//! assert_eq!(&buf[..], b"+OK\r\n");
//! ```

pub mod command;
pub mod error;
pub mod parse;
mod serialize;
pub mod types;

pub use command::encode_command;
pub use error::ProtocolError;
pub use parse::parse_frame;
pub use types::Frame;
