//! Framing codec and pump protocol for the worker channel.

use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtoError;
use crate::types::{Frame, Request, RequestId, Response, ResponsePayload, RpcException, StatusResult};

/// Upper bound for a single frame body.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

impl Frame {
	/// Reads one length-prefixed frame from the stream.
	///
	/// A body that fails to decode inside an intact length prefix yields
	/// [`Frame::Unknown`] instead of an error: the stream stays usable and
	/// the caller decides what to do with the frame. Unrecognized request
	/// kinds from newer hosts arrive through this path.
	///
	/// # Errors
	///
	/// [`ProtoError::Disconnect`] when the stream ends at a frame boundary,
	/// [`ProtoError::FrameTooLarge`] for an oversized announcement, and
	/// [`ProtoError::Io`] for torn frames and transport failures.
	pub async fn read(input: &mut (impl AsyncBufRead + Unpin + Send)) -> Result<Self, ProtoError> {
		let len = match input.read_u32_le().await {
			Ok(len) => len,
			Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
				return Err(ProtoError::Disconnect);
			}
			Err(err) => return Err(err.into()),
		};
		if len > MAX_FRAME_LEN {
			return Err(ProtoError::FrameTooLarge { len });
		}
		let mut buf = vec![0u8; len as usize];
		input.read_exact(&mut buf).await?;
		match postcard::from_bytes(&buf) {
			Ok(frame) => Ok(frame),
			Err(err) => {
				tracing::warn!(len, error = %err, "undecodable frame on worker channel");
				Ok(Self::Unknown)
			}
		}
	}

	/// Writes one length-prefixed frame to the stream.
	///
	/// # Errors
	///
	/// [`ProtoError::Encode`] when the frame cannot be encoded and
	/// [`ProtoError::Io`] for transport failures.
	pub async fn write(&self, output: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), ProtoError> {
		let buf = postcard::to_allocvec(self)?;
		output.write_u32_le(buf.len() as u32).await?;
		output.write_all(&buf).await?;
		output.flush().await?;
		Ok(())
	}
}

/// Worker-side protocol binding for [`tether_rpc::MainLoop`].
#[derive(Debug, Clone, Default)]
pub struct WorkerProtocol;

impl WorkerProtocol {
	/// Creates a new protocol instance.
	#[must_use]
	pub const fn new() -> Self {
		Self
	}
}

impl tether_rpc::Protocol for WorkerProtocol {
	type Id = RequestId;
	type Message = Frame;
	type Request = Request;
	type Response = Response;
	type Notification = Frame;
	type ReqResult = ResponsePayload;
	type ReqError = RpcException;
	type LoopError = ProtoError;
	type IdGen = tether_rpc::CounterIdGen;

	fn next_id(id_gen: &mut Self::IdGen) -> Self::Id {
		RequestId(id_gen.next())
	}

	async fn read_message(
		&mut self,
		input: &mut (impl AsyncBufRead + Unpin + Send),
	) -> Result<Self::Message, ProtoError> {
		Frame::read(input).await
	}

	async fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &Self::Message,
	) -> Result<(), ProtoError> {
		msg.write(output).await
	}

	fn split_inbound(msg: Self::Message) -> tether_rpc::Inbound<Self::Request, Self::Response, Self::Notification> {
		match msg {
			Frame::Request(req) => tether_rpc::Inbound::Request(req),
			Frame::Response(resp) => tether_rpc::Inbound::Response(resp),
			// Handshake, Log and Unknown frames are uncorrelated.
			other => tether_rpc::Inbound::Notification(other),
		}
	}

	fn request_id(req: &Self::Request) -> Self::Id {
		req.id
	}

	fn set_request_id(req: &mut Self::Request, id: Self::Id) {
		req.id = id;
	}

	fn response_id(resp: &Self::Response) -> Self::Id {
		resp.request_id
	}

	fn wrap_request(req: Self::Request) -> Self::Message {
		Frame::Request(req)
	}

	fn wrap_response(resp: Self::Response) -> Self::Message {
		Frame::Response(resp)
	}

	fn wrap_notification(notif: Self::Notification) -> Self::Message {
		notif
	}

	fn response_ok(id: Self::Id, result: Self::ReqResult) -> Self::Response {
		Response { request_id: id, payload: result }
	}

	fn response_err(id: Self::Id, error: Self::ReqError) -> Self::Response {
		Response {
			request_id: id,
			payload: ResponsePayload::Failed(StatusResult::failure(error)),
		}
	}

	fn is_disconnect(err: &Self::LoopError) -> bool {
		matches!(err, ProtoError::Disconnect)
	}
}
