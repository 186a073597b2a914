//! Streaming encoder, decoder and DOM parser for the [MessagePack]
//! serialization format.
//!
//! Three complementary interfaces share one tag model:
//!
//! * [`Writer`] encodes values incrementally into a growable vector, a fixed
//!   buffer, or a bounded buffer drained through a flush callback.
//! * [`Reader`] decodes values incrementally from a complete in-memory
//!   message or from a bounded buffer refilled through a fill callback,
//!   with zero-copy in-place reads.
//! * [`Tree`] parses a whole message into a tree of typed [`Node`]s,
//!   either blocking or resumable for non-blocking streams, with hard
//!   bounds on message size and node count for untrusted input.
//!
//! The library performs no I/O of its own; all input and output goes
//! through caller-supplied buffers and callbacks.
//!
//! [MessagePack]: https://msgpack.org
//! [`Writer`]: writer/struct.Writer.html
//! [`Reader`]: reader/struct.Reader.html
//! [`Tree`]: tree/struct.Tree.html
//! [`Node`]: node/struct.Node.html
//!
//! # Example
//!
//! ```
//! use msgpack::{Tree, Writer};
//!
//! // encode {"compact": true, "schema": 0}
//! let mut buf = Vec::new();
//! {
//!     let mut w = Writer::new(&mut buf);
//!     w.start_map(2).unwrap();
//!     w.write_str("compact").unwrap();
//!     w.write_bool(true).unwrap();
//!     w.write_str("schema").unwrap();
//!     w.write_u8(0).unwrap();
//!     w.finish_map().unwrap();
//!     w.finish().unwrap();
//! }
//! assert_eq!(buf.len(), 18);
//!
//! // parse it back as a tree
//! let mut tree = Tree::new(&buf);
//! tree.parse().unwrap();
//! let root = tree.root().unwrap();
//! assert_eq!(root.map_str("compact").unwrap().as_bool().unwrap(), true);
//! assert_eq!(root.map_str("schema").unwrap().as_u32().unwrap(), 0);
//! ```

#![doc(html_root_url = "https://docs.rs/msgpack/0.1.0")]
#![warn(missing_debug_implementations)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;
#[macro_use]
extern crate failure;
extern crate byteorder;
extern crate num_traits;
#[cfg(test)]
extern crate rand;

pub mod codec;
pub mod error;
mod expect;
pub mod node;
pub mod reader;
pub mod string;
pub mod tag;
pub mod time;
mod track;
pub mod tree;
pub mod writer;

pub use codec::Version;
pub use error::{Error, ErrorKind, Result};
pub use node::Node;
pub use reader::{Fill, Reader};
pub use string::UnicodeCString;
pub use tag::{Tag, TagKind};
pub use time::Timestamp;
pub use tree::Tree;
pub use writer::{Flush, Writer};
