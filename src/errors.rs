// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types and constructor macros.
//!
//! All failures in this crate are fatal to the writer that raised them: a
//! failed writer must be discarded, and the partially written file abandoned.

use std::error::Error as StdError;
use std::{fmt, io, result, str};

/// Errors raised by the encoder.
#[derive(Debug)]
pub enum Error {
    /// A record did not match the schema it was written against: unknown or
    /// out-of-order field, wrong primitive type, or unbalanced group events.
    Schema(String),
    /// A value cannot be represented by the chosen encoding.
    Encoding(String),
    /// A compression codec failed, or an unsupported codec was requested.
    Compression(String),
    /// A failure in the modular encryption layer.
    Encryption(EncryptionError),
    /// The underlying stream refused a write. The writer is left in a
    /// terminal failed state.
    Io(io::Error),
    /// An operation was invoked in the wrong lifecycle state.
    IllegalState(String),
    /// An internal invariant was violated.
    Internal(String),
    /// Ran out of bytes while decoding (used by the in-crate thrift reader).
    Eof(String),
    /// Functionality that is not yet implemented.
    Nyi(String),
}

/// The encryption error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// No key could be retrieved for the given key metadata.
    KeyUnavailable(String),
    /// An AAD prefix was required but not provided, or did not verify.
    AadMismatch(String),
    /// AES-GCM authentication failed.
    TagMismatch,
    /// The requested or claimed algorithm is not supported.
    AlgorithmMismatch(String),
}

impl fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyUnavailable(msg) => write!(f, "key unavailable: {msg}"),
            Self::AadMismatch(msg) => write!(f, "AAD mismatch: {msg}"),
            Self::TagMismatch => write!(f, "GCM tag mismatch"),
            Self::AlgorithmMismatch(msg) => write!(f, "algorithm mismatch: {msg}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(msg) => write!(f, "Schema error: {msg}"),
            Self::Encoding(msg) => write!(f, "Encoding error: {msg}"),
            Self::Compression(msg) => write!(f, "Compression error: {msg}"),
            Self::Encryption(e) => write!(f, "Encryption error: {e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::IllegalState(msg) => write!(f, "Illegal state: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Eof(msg) => write!(f, "Unexpected EOF: {msg}"),
            Self::Nyi(msg) => write!(f, "Not yet implemented: {msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<EncryptionError> for Error {
    fn from(e: EncryptionError) -> Self {
        Error::Encryption(e)
    }
}

impl From<str::Utf8Error> for Error {
    fn from(e: str::Utf8Error) -> Self {
        Error::Internal(format!("invalid UTF-8: {e}"))
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

/// A specialized `Result` for encoder errors.
pub type Result<T, E = Error> = result::Result<T, E>;

// ----------------------------------------------------------------------
// Constructor macros, one per error category.

macro_rules! schema_err {
    ($fmt:expr) => ($crate::errors::Error::Schema($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Schema(format!($fmt, $($args),*)));
}

macro_rules! encoding_err {
    ($fmt:expr) => ($crate::errors::Error::Encoding($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Encoding(format!($fmt, $($args),*)));
}

macro_rules! compression_err {
    ($fmt:expr) => ($crate::errors::Error::Compression($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Compression(format!($fmt, $($args),*)));
}

macro_rules! state_err {
    ($fmt:expr) => ($crate::errors::Error::IllegalState($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::IllegalState(format!($fmt, $($args),*)));
}

macro_rules! internal_err {
    ($fmt:expr) => ($crate::errors::Error::Internal($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Internal(format!($fmt, $($args),*)));
}

macro_rules! eof_err {
    ($fmt:expr) => ($crate::errors::Error::Eof($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Eof(format!($fmt, $($args),*)));
}

macro_rules! nyi_err {
    ($fmt:expr) => ($crate::errors::Error::Nyi($fmt.to_owned()));
    ($fmt:expr, $($args:expr),*) => ($crate::errors::Error::Nyi(format!($fmt, $($args),*)));
}
