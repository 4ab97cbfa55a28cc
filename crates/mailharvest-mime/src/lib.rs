//! # mailharvest-mime
//!
//! MIME message generation for messages archived from webmail.
//!
//! ## Features
//!
//! - **Message generation**: single-part text or `multipart/alternative` text + HTML
//! - **Deterministic output**: ordered headers and caller-chosen boundaries, so the same
//!   input always renders to the same bytes
//! - **Encoding**: Quoted-Printable bodies, RFC 2047 (Base64) header words
//!
//! ## Quick Start
//!
//! ```
//! use mailharvest_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .subject("Test")
//!     .text_body("Plain text version")
//!     .html_body("<html><body><h1>HTML version</h1></body></html>")
//!     .build()?; // Creates multipart/alternative
//!
//! assert!(message.is_multipart());
//! # Ok::<(), mailharvest_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, MessageBuilder, Part, TransferEncoding};
