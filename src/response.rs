//! Response sink: the [`ResponseWriter`] trait and the buffered sink the
//! inbound hands to every chain.
//!
//! Handlers never build a response value. They write through a sink, and an
//! interceptor that wants to see or change what gets written wraps the sink
//! it was given before passing it down:
//!
//! ```rust
//! use ferry::{ResponseWriter, Result};
//!
//! /// Counts body bytes on their way to the real sink.
//! struct Counting<'w> {
//!     inner: &'w mut dyn ResponseWriter,
//!     written: usize,
//! }
//!
//! impl ResponseWriter for Counting<'_> {
//!     fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
//!         self.inner.add_header(name, value)
//!     }
//!     fn set_application_error(&mut self) -> Result<()> {
//!         self.inner.set_application_error()
//!     }
//!     fn write(&mut self, data: &[u8]) -> Result<()> {
//!         self.written += data.len();
//!         self.inner.write(data)
//!     }
//! }
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

/// A mutable sink for one response.
///
/// The caller of the chain owns the underlying sink and its lifecycle.
/// Decorators must forward to the sink they wrap so its own rules (ordering,
/// finalization) still apply.
pub trait ResponseWriter: Send {
    /// Adds an application header. Must precede the first body write.
    fn add_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Marks the response as an application error. The body still goes out.
    fn set_application_error(&mut self) -> Result<()>;

    /// Appends `data` to the response body.
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// In-memory sink used by the inbound.
///
/// Writes append. Once [`finalize`](ResponseBuffer::finalize) is called the
/// buffer rejects every further mutation with [`Error::ResponseFinalized`].
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    headers: Vec<(String, String)>,
    body: BytesMut,
    application_error: bool,
    finalized: bool,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn is_application_error(&self) -> bool { self.application_error }
    pub fn is_finalized(&self) -> bool { self.finalized }

    /// Closes the sink. Finalizing twice is an error.
    pub fn finalize(&mut self) -> Result<()> {
        self.check_open()?;
        self.finalized = true;
        Ok(())
    }

    /// Splits the buffer into its headers and frozen body.
    pub fn into_parts(self) -> (Vec<(String, String)>, Bytes) {
        (self.headers, self.body.freeze())
    }

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            return Err(Error::ResponseFinalized);
        }
        Ok(())
    }
}

impl ResponseWriter for ResponseBuffer {
    fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_open()?;
        if !self.body.is_empty() {
            return Err(Error::HeadersAfterBody);
        }
        self.headers.push((name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn set_application_error(&mut self) -> Result<()> {
        self.check_open()?;
        self.application_error = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.body.extend_from_slice(data);
        Ok(())
    }
}
