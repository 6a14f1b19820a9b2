//! Async transport to the ledger gateway.
//!
//! The transport moves one request/response pair at a time over a shared
//! connection. Reconnection policy lives in the client; the transport only
//! reports failure.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{LedgerError, LedgerResult};
use crate::wire::{Frame, LedgerRequest, LedgerResponse, MAX_PAYLOAD_SIZE};

// ============================================================================
// LedgerTransport
// ============================================================================

/// A connection to the ledger gateway.
///
/// Implementations are shared behind an `Arc` by the client; `call` may be
/// issued concurrently (the ledger's ordering service serializes writes),
/// while `open`/`close` are only driven by the client's guarded reconnect.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Establishes the connection.
    async fn open(&self) -> LedgerResult<()>;

    /// Tears the connection down.
    async fn close(&self);

    /// Invokes a ledger function and returns its result.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotConnected`] if `open` has not succeeded
    /// - [`LedgerError::Timeout`] if the call exceeds the transport timeout
    /// - [`LedgerError::FunctionNotFound`] / [`LedgerError::Rejected`] for
    ///   ledger-side faults
    async fn call(&self, function: &str, args: &[Value], submit: bool) -> LedgerResult<Value>;

    /// True if a connection is currently established. No network call.
    fn is_open(&self) -> bool;

    /// Endpoint description for logs and status introspection.
    fn endpoint(&self) -> String;
}

// ============================================================================
// TcpTransport
// ============================================================================

/// Framed TCP transport to a ledger gateway.
pub struct TcpTransport {
    addr: String,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    open_flag: std::sync::atomic::AtomicBool,
}

impl TcpTransport {
    /// Creates a transport for `addr` with a per-call timeout.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            stream: Mutex::new(None),
            open_flag: std::sync::atomic::AtomicBool::new(false),
        }
    }

    async fn exchange(&self, frame: Frame) -> LedgerResult<Frame> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(LedgerError::NotConnected)?;

        let encoded = frame.encode_to_bytes();
        stream.write_all(&encoded).await?;
        stream.flush().await?;

        let mut read_buf = BytesMut::with_capacity(4096);
        loop {
            if let Some(frame) = Frame::decode(&mut read_buf)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; 4096];
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(LedgerError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "ledger gateway closed connection",
                )));
            }
            read_buf.extend_from_slice(&chunk[..n]);

            if read_buf.len() > MAX_PAYLOAD_SIZE as usize * 2 {
                return Err(LedgerError::Wire("response too large".to_string()));
            }
        }
    }
}

#[async_trait]
impl LedgerTransport for TcpTransport {
    async fn open(&self) -> LedgerResult<()> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| LedgerError::Timeout)??;
        stream.set_nodelay(true)?;

        *self.stream.lock().await = Some(stream);
        self.open_flag
            .store(true, std::sync::atomic::Ordering::Release);

        trace!(addr = %self.addr, "ledger transport opened");
        Ok(())
    }

    async fn close(&self) {
        *self.stream.lock().await = None;
        self.open_flag
            .store(false, std::sync::atomic::Ordering::Release);
    }

    async fn call(&self, function: &str, args: &[Value], submit: bool) -> LedgerResult<Value> {
        let request = LedgerRequest {
            function: function.to_string(),
            args: args.to_vec(),
            submit,
        };

        let reply = tokio::time::timeout(self.timeout, self.exchange(request.to_frame()))
            .await
            .map_err(|_| LedgerError::Timeout)?;

        let frame = match reply {
            Ok(frame) => frame,
            Err(e) => {
                // A failed exchange leaves the stream in an unknown state.
                self.close().await;
                return Err(e);
            }
        };

        LedgerResponse::from_frame(&frame)?.into_result(function)
    }

    fn is_open(&self) -> bool {
        self.open_flag.load(std::sync::atomic::Ordering::Acquire)
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}
