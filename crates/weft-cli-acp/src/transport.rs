// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Newline-delimited JSON framing over an async byte stream.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{trace, warn};

use crate::error::AcpError;
use crate::protocol::{error_message, notification_message, response_message, RpcError};

/// Largest inbound frame accepted: 8 MiB.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

fn map_codec_error(err: LinesCodecError) -> AcpError {
	match err {
		LinesCodecError::MaxLineLengthExceeded => {
			AcpError::Transport(format!("frame exceeds {MAX_FRAME_BYTES} bytes"))
		}
		LinesCodecError::Io(e) => AcpError::from(e),
	}
}

/// One inbound line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
	Message(String),
	/// A line that could not be read as text. The connection stays usable;
	/// the reason is reported back as a parse error.
	Malformed(String),
}

/// Line framing that survives bad lines.
///
/// [`LinesCodec`] splits the offending line off (or discards up to the next
/// newline when it is too long) before failing, so both failures are
/// reported as [`InboundFrame::Malformed`] and decoding carries on. Only
/// errors from the underlying reader end the stream.
#[derive(Debug)]
pub struct FrameCodec {
	lines: LinesCodec,
	max_length: usize,
}

impl FrameCodec {
	pub fn new() -> Self {
		Self::with_max_length(MAX_FRAME_BYTES)
	}

	pub fn with_max_length(max_length: usize) -> Self {
		Self {
			lines: LinesCodec::new_with_max_length(max_length),
			max_length,
		}
	}

	fn recover(
		&self,
		decoded: Result<Option<String>, LinesCodecError>,
	) -> Result<Option<InboundFrame>, LinesCodecError> {
		match decoded {
			Ok(line) => Ok(line.map(InboundFrame::Message)),
			Err(LinesCodecError::MaxLineLengthExceeded) => {
				warn!(max_bytes = self.max_length, "oversize frame discarded");
				Ok(Some(InboundFrame::Malformed(format!(
					"frame exceeds {} bytes",
					self.max_length
				))))
			}
			Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
				warn!(error = %e, "frame is not valid UTF-8");
				Ok(Some(InboundFrame::Malformed("frame is not valid UTF-8".to_string())))
			}
			Err(e) => Err(e),
		}
	}
}

impl Default for FrameCodec {
	fn default() -> Self {
		Self::new()
	}
}

impl Decoder for FrameCodec {
	type Item = InboundFrame;
	type Error = LinesCodecError;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundFrame>, LinesCodecError> {
		let decoded = self.lines.decode(src);
		self.recover(decoded)
	}

	fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InboundFrame>, LinesCodecError> {
		let decoded = self.lines.decode_eof(src);
		self.recover(decoded)
	}
}

/// Reads one frame at a time from the inbound stream.
pub struct FrameReader<R> {
	inner: FramedRead<R, FrameCodec>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
	pub fn new(reader: R) -> Self {
		Self::with_codec(reader, FrameCodec::new())
	}

	pub fn with_codec(reader: R, codec: FrameCodec) -> Self {
		Self {
			inner: FramedRead::new(reader, codec),
		}
	}

	/// Next non-blank frame, or `None` once the stream has ended.
	///
	/// Errors are fatal read failures; a bad line comes back as
	/// [`InboundFrame::Malformed`].
	pub async fn read_message(&mut self) -> Result<Option<InboundFrame>, AcpError> {
		while let Some(frame) = self.inner.next().await {
			match frame.map_err(map_codec_error)? {
				InboundFrame::Message(line) if line.trim().is_empty() => continue,
				InboundFrame::Message(line) => {
					trace!(bytes = line.len(), "frame received");
					return Ok(Some(InboundFrame::Message(line)));
				}
				malformed => return Ok(Some(malformed)),
			}
		}
		Ok(None)
	}
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to the outbound stream.
///
/// Each frame is encoded and flushed while the lock is held, so concurrent
/// senders never interleave partial lines.
#[derive(Clone)]
pub struct FrameWriter {
	inner: Arc<Mutex<FramedWrite<BoxedWriter, LinesCodec>>>,
}

impl FrameWriter {
	pub fn new<W>(writer: W) -> Self
	where
		W: AsyncWrite + Send + Unpin + 'static,
	{
		let boxed: BoxedWriter = Box::new(writer);
		Self {
			inner: Arc::new(Mutex::new(FramedWrite::new(boxed, LinesCodec::new()))),
		}
	}

	pub async fn write_message<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), AcpError> {
		let line = serde_json::to_string(message)?;
		let mut sink = self.inner.lock().await;
		sink.send(line).await.map_err(map_codec_error)
	}

	pub async fn send_response(&self, id: &Value, result: Value) -> Result<(), AcpError> {
		self.write_message(&response_message(id, result)).await
	}

	pub async fn send_error(&self, id: &Value, error: RpcError) -> Result<(), AcpError> {
		self.write_message(&error_message(id, error)).await
	}

	pub async fn send_notification<P: Serialize>(
		&self,
		method: &str,
		params: &P,
	) -> Result<(), AcpError> {
		let message = notification_message(method, params)?;
		self.write_message(&message).await
	}
}

impl std::fmt::Debug for FrameWriter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FrameWriter").finish_non_exhaustive()
	}
}
