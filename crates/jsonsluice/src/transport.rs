//! Bounds for the byte channels a converter reads from and writes to.
//!
//! These are plain trait aliases: any tokio reader or writer that is `Send`
//! and `Unpin` qualifies, so sockets, files, in-memory buffers and duplex
//! pipes plug in without dynamic dispatch.
use tokio::io::{AsyncRead, AsyncWrite};

/// An asynchronous byte source for one request body.
///
/// Implemented automatically for any [`AsyncRead`] that is `Send + Unpin`.
/// Reaching end of stream means the body is complete. Dropping the source
/// releases the underlying channel.
pub trait ByteSource: AsyncRead + Send + Unpin {}

impl<T> ByteSource for T where T: AsyncRead + Send + Unpin {}

/// An asynchronous byte sink for one response body.
///
/// Implemented automatically for any [`AsyncWrite`] that is `Send + Unpin`.
/// Shutting the sink down marks the body as complete.
pub trait ByteSink: AsyncWrite + Send + Unpin {}

impl<T> ByteSink for T where T: AsyncWrite + Send + Unpin {}
