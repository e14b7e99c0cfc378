//! Protocol abstraction binding a wire format to message semantics.

use std::hash::Hash;

use tokio::io::{AsyncBufRead, AsyncWrite};

/// Monotonic counter for protocols with sequential integer request IDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter starting at 0.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Generates the next unique ID and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> u64 {
		let id = self.0;
		self.0 += 1;
		id
	}
}

/// Classification of an inbound message.
///
/// Everything arriving on the stream falls into one of three buckets: a
/// request the service must answer, a response correlating with a request we
/// sent earlier, or an uncorrelated notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<Req, Resp, Notif> {
	/// An incoming request.
	Request(Req),
	/// An incoming response.
	Response(Resp),
	/// An incoming uncorrelated message.
	Notification(Notif),
}

/// Binding between the generic pump and a concrete wire format.
///
/// A protocol owns framing (how messages are read and written) and the
/// envelope semantics the pump needs: extracting and assigning correlation
/// IDs, classifying inbound traffic, and building success/error responses.
pub trait Protocol: Send + 'static {
	/// Correlation ID type for requests and responses.
	type Id: Eq + Hash + Clone + Send + 'static;

	/// The wire message type.
	type Message: Send + 'static;

	/// Request message type.
	type Request: Send + 'static;

	/// Response message type.
	type Response: Send + 'static;

	/// Uncorrelated message type.
	type Notification: Send + 'static;

	/// Successful result type produced by request handlers.
	type ReqResult: Send + 'static;

	/// Error type produced by request handlers.
	type ReqError: Send + 'static;

	/// Error type for IO/codec failures in the loop.
	type LoopError: From<std::io::Error> + Send + 'static;

	/// State for generating IDs of locally originated requests.
	type IdGen: Send + 'static;

	/// Generates the next unique request ID.
	fn next_id(id_gen: &mut Self::IdGen) -> Self::Id;

	/// Reads one complete message from the input stream.
	fn read_message(
		&mut self,
		input: &mut (impl AsyncBufRead + Unpin + Send),
	) -> impl std::future::Future<Output = std::result::Result<Self::Message, Self::LoopError>> + Send;

	/// Writes one message to the output stream.
	fn write_message(
		&mut self,
		output: &mut (impl AsyncWrite + Unpin + Send),
		msg: &Self::Message,
	) -> impl std::future::Future<Output = std::result::Result<(), Self::LoopError>> + Send;

	/// Classifies an inbound message.
	fn split_inbound(msg: Self::Message) -> Inbound<Self::Request, Self::Response, Self::Notification>;

	/// Returns the correlation ID of a request.
	fn request_id(req: &Self::Request) -> Self::Id;

	/// Assigns the correlation ID on a locally originated request.
	fn set_request_id(req: &mut Self::Request, id: Self::Id);

	/// Returns the correlation ID of a response.
	fn response_id(resp: &Self::Response) -> Self::Id;

	/// Wraps a request into a wire message.
	fn wrap_request(req: Self::Request) -> Self::Message;

	/// Wraps a response into a wire message.
	fn wrap_response(resp: Self::Response) -> Self::Message;

	/// Wraps an uncorrelated message into a wire message.
	fn wrap_notification(notif: Self::Notification) -> Self::Message;

	/// Builds a successful response for the given request ID.
	fn response_ok(id: Self::Id, result: Self::ReqResult) -> Self::Response;

	/// Builds an error response for the given request ID.
	fn response_err(id: Self::Id, error: Self::ReqError) -> Self::Response;

	/// Returns true when the loop error represents a clean peer disconnect.
	///
	/// A clean disconnect ends the loop with `Ok(())` instead of an error.
	fn is_disconnect(_err: &Self::LoopError) -> bool {
		false
	}
}
