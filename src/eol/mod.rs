//! # Line Endings
//!
//! Building blocks for converting files between DOS (`CR LF`) and UNIX (`LF`)
//! line endings:
//!
//! - [`transducer`]: the streaming byte converter
//! - [`sniffer`]: guesses whether a file uses DOS or UNIX line endings
//! - [`converter`]: converts one file in place through a temporary file
//! - [`error`]: errors of a single file conversion

pub mod converter;

pub mod error;

pub mod sniffer;

pub mod transducer;
