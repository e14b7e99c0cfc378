//! Main loop driver pumping a full-duplex RPC stream.

use std::collections::HashMap;
use std::future::{Future, poll_fn};
use std::ops::ControlFlow;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tower_service::Service;

use crate::event::AnyEvent;
use crate::protocol::{Inbound, Protocol};
use crate::socket::{MainLoopEvent, PeerSocket};

/// Hooks a service must provide beyond plain request handling.
///
/// Request handling itself goes through [`tower_service::Service`]; this
/// trait adds the paths that do not produce a response: uncorrelated inbound
/// messages and loopback events. Returning `ControlFlow::Break` from either
/// hook stops the loop with the given result.
pub trait RpcService<P: Protocol>:
	Service<P::Request, Response = P::ReqResult, Error = P::ReqError>
{
	/// Handles an uncorrelated inbound message.
	fn notify(&mut self, notif: P::Notification) -> ControlFlow<Result<(), P::LoopError>>;

	/// Handles a loopback event injected through a [`PeerSocket`].
	fn emit(&mut self, event: AnyEvent) -> ControlFlow<Result<(), P::LoopError>>;
}

/// Generic main loop for a framed RPC peer.
///
/// Owns the inbound stream, the shared outbound queue, and the set of
/// in-flight request handler tasks. Handler tasks run concurrently; their
/// responses are emitted in completion order, each carrying the correlation
/// ID of the request that produced it.
pub struct MainLoop<P: Protocol, S> {
	/// Wire format and envelope semantics.
	protocol: P,
	/// The wrapped service.
	service: S,
	/// Receiver side of the shared outbound queue.
	rx: mpsc::UnboundedReceiver<MainLoopEvent<P>>,
	/// ID generator for locally originated requests.
	id_gen: P::IdGen,
	/// Locally originated requests awaiting responses.
	outgoing: HashMap<P::Id, tokio::sync::oneshot::Sender<P::Response>>,
	/// Concurrent request handler tasks in flight.
	tasks: tokio::task::JoinSet<P::Response>,
}

impl<P, S> MainLoop<P, S>
where
	P: Protocol,
	S: RpcService<P>,
	S::Future: Send + 'static,
{
	/// Creates a main loop, handing the service builder a socket onto the
	/// loop's outbound queue.
	#[must_use]
	pub fn new(
		builder: impl FnOnce(PeerSocket<P>) -> S,
		protocol: P,
		id_gen: P::IdGen,
	) -> (Self, PeerSocket<P>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let socket = PeerSocket::new(tx);
		let this = Self {
			protocol,
			service: builder(socket.clone()),
			rx,
			id_gen,
			outgoing: HashMap::new(),
			tasks: tokio::task::JoinSet::new(),
		};
		(this, socket)
	}

	/// Returns a reference to the inner service.
	#[must_use]
	pub fn get_ref(&self) -> &S {
		&self.service
	}

	/// Returns a mutable reference to the inner service.
	#[must_use]
	pub fn get_mut(&mut self) -> &mut S {
		&mut self.service
	}

	/// Drives the stream until disconnect, queue closure, or a fatal error.
	///
	/// # Errors
	///
	/// Propagates the protocol's `LoopError` for IO and codec failures.
	/// A clean disconnect (per [`Protocol::is_disconnect`]) and closure of
	/// the outbound queue both end the loop with `Ok(())`.
	pub async fn run(
		mut self,
		mut input: impl AsyncBufRead + Unpin + Send,
		mut output: impl AsyncWrite + Unpin + Send,
	) -> Result<(), P::LoopError> {
		let ret = loop {
			let ctl = tokio::select! {
				biased;

				resp = self.tasks.join_next(), if !self.tasks.is_empty() => {
					match resp {
						Some(Ok(resp)) => ControlFlow::Continue(Some(P::wrap_response(resp))),
						Some(Err(err)) => {
							tracing::error!(error = %err, "request handler task panicked or was cancelled");
							ControlFlow::Continue(None)
						}
						None => ControlFlow::Continue(None),
					}
				}

				event = self.rx.recv() => match event {
					Some(event) => self.dispatch_event(event),
					None => break Ok(()),
				},

				msg = self.protocol.read_message(&mut input) => match msg {
					Ok(msg) => self.dispatch_message(msg).await,
					Err(err) if P::is_disconnect(&err) => break Ok(()),
					Err(err) => break Err(err),
				},
			};

			let msg = match ctl {
				ControlFlow::Continue(Some(msg)) => msg,
				ControlFlow::Continue(None) => continue,
				ControlFlow::Break(ret) => break ret,
			};

			self.protocol.write_message(&mut output, &msg).await?;
		};

		output.shutdown().await?;
		ret
	}

	/// Routes an inbound message to the matching path.
	async fn dispatch_message(
		&mut self,
		msg: P::Message,
	) -> ControlFlow<Result<(), P::LoopError>, Option<P::Message>> {
		match P::split_inbound(msg) {
			Inbound::Request(req) => {
				let id = P::request_id(&req);
				if let Err(err) = poll_fn(|cx| self.service.poll_ready(cx)).await {
					return ControlFlow::Continue(Some(P::wrap_response(P::response_err(id, err))));
				}
				let fut = self.service.call(req);
				self.tasks.spawn(RequestFuture::<P, _> { fut, id: Some(id) });
				ControlFlow::Continue(None)
			}
			Inbound::Response(resp) => {
				if let Some(resp_tx) = self.outgoing.remove(&P::response_id(&resp)) {
					// The requester may have given up; ignore send failures.
					let _ = resp_tx.send(resp);
				}
				ControlFlow::Continue(None)
			}
			Inbound::Notification(notif) => match self.service.notify(notif) {
				ControlFlow::Continue(()) => ControlFlow::Continue(None),
				ControlFlow::Break(ret) => ControlFlow::Break(ret),
			},
		}
	}

	/// Routes an internal event from the outbound queue.
	fn dispatch_event(
		&mut self,
		event: MainLoopEvent<P>,
	) -> ControlFlow<Result<(), P::LoopError>, Option<P::Message>> {
		match event {
			MainLoopEvent::Outgoing(msg) => ControlFlow::Continue(Some(msg)),
			MainLoopEvent::OutgoingRequest(mut req, resp_tx) => {
				let id = P::next_id(&mut self.id_gen);
				P::set_request_id(&mut req, id.clone());
				self.outgoing.insert(id, resp_tx);
				ControlFlow::Continue(Some(P::wrap_request(req)))
			}
			MainLoopEvent::Any(event) => match self.service.emit(event) {
				ControlFlow::Continue(()) => ControlFlow::Continue(None),
				ControlFlow::Break(ret) => ControlFlow::Break(ret),
			},
		}
	}
}

pin_project! {
	struct RequestFuture<P, Fut>
	where
		P: Protocol,
	{
		#[pin]
		fut: Fut,
		id: Option<P::Id>,
	}
}

impl<P, Fut> Future for RequestFuture<P, Fut>
where
	P: Protocol,
	Fut: Future<Output = Result<P::ReqResult, P::ReqError>>,
{
	type Output = P::Response;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.project();
		let result = ready!(this.fut.poll(cx));
		let id = this.id.take().expect("future polled after completion");
		Poll::Ready(match result {
			Ok(result) => P::response_ok(id, result),
			Err(err) => P::response_err(id, err),
		})
	}
}

#[cfg(test)]
mod tests {
	use std::io::ErrorKind;
	use std::sync::Arc;
	use std::sync::Mutex;

	use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};

	use super::*;
	use crate::protocol::CounterIdGen;

	/// Line-based test wire: `Q <id> <body>`, `A <id> <body>`, `N <body>`.
	#[derive(Debug, Clone, PartialEq, Eq)]
	enum TestMsg {
		Request { id: u64, body: String },
		Response { id: u64, body: String },
		Note(String),
	}

	struct TestProtocol;

	impl Protocol for TestProtocol {
		type Id = u64;
		type Message = TestMsg;
		type Request = (u64, String);
		type Response = (u64, String);
		type Notification = String;
		type ReqResult = String;
		type ReqError = String;
		type LoopError = std::io::Error;
		type IdGen = CounterIdGen;

		fn next_id(id_gen: &mut Self::IdGen) -> Self::Id {
			id_gen.next()
		}

		async fn read_message(
			&mut self,
			input: &mut (impl AsyncBufRead + Unpin + Send),
		) -> std::io::Result<Self::Message> {
			let mut line = String::new();
			if input.read_line(&mut line).await? == 0 {
				return Err(std::io::Error::from(ErrorKind::UnexpectedEof));
			}
			let line = line.trim_end();
			let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
			match tag {
				"Q" | "A" => {
					let (id, body) = rest.split_once(' ').unwrap_or((rest, ""));
					let id = id
						.parse()
						.map_err(|_| std::io::Error::from(ErrorKind::InvalidData))?;
					if tag == "Q" {
						Ok(TestMsg::Request { id, body: body.to_string() })
					} else {
						Ok(TestMsg::Response { id, body: body.to_string() })
					}
				}
				"N" => Ok(TestMsg::Note(rest.to_string())),
				_ => Err(std::io::Error::from(ErrorKind::InvalidData)),
			}
		}

		async fn write_message(
			&mut self,
			output: &mut (impl AsyncWrite + Unpin + Send),
			msg: &Self::Message,
		) -> std::io::Result<()> {
			let line = match msg {
				TestMsg::Request { id, body } => format!("Q {id} {body}\n"),
				TestMsg::Response { id, body } => format!("A {id} {body}\n"),
				TestMsg::Note(body) => format!("N {body}\n"),
			};
			tokio::io::AsyncWriteExt::write_all(output, line.as_bytes()).await
		}

		fn split_inbound(msg: Self::Message) -> Inbound<Self::Request, Self::Response, Self::Notification> {
			match msg {
				TestMsg::Request { id, body } => Inbound::Request((id, body)),
				TestMsg::Response { id, body } => Inbound::Response((id, body)),
				TestMsg::Note(body) => Inbound::Notification(body),
			}
		}

		fn request_id(req: &Self::Request) -> Self::Id {
			req.0
		}

		fn set_request_id(req: &mut Self::Request, id: Self::Id) {
			req.0 = id;
		}

		fn response_id(resp: &Self::Response) -> Self::Id {
			resp.0
		}

		fn wrap_request(req: Self::Request) -> Self::Message {
			TestMsg::Request { id: req.0, body: req.1 }
		}

		fn wrap_response(resp: Self::Response) -> Self::Message {
			TestMsg::Response { id: resp.0, body: resp.1 }
		}

		fn wrap_notification(notif: Self::Notification) -> Self::Message {
			TestMsg::Note(notif)
		}

		fn response_ok(id: Self::Id, result: Self::ReqResult) -> Self::Response {
			(id, result)
		}

		fn response_err(id: Self::Id, error: Self::ReqError) -> Self::Response {
			(id, format!("ERR:{error}"))
		}

		fn is_disconnect(err: &Self::LoopError) -> bool {
			err.kind() == ErrorKind::UnexpectedEof
		}
	}

	struct EchoService {
		notes: Arc<Mutex<Vec<String>>>,
	}

	impl Service<(u64, String)> for EchoService {
		type Response = String;
		type Error = String;
		type Future = std::future::Ready<Result<String, String>>;

		fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
			Poll::Ready(Ok(()))
		}

		fn call(&mut self, (_, body): (u64, String)) -> Self::Future {
			std::future::ready(if body == "boom" {
				Err(body)
			} else {
				Ok(body.to_uppercase())
			})
		}
	}

	impl RpcService<TestProtocol> for EchoService {
		fn notify(&mut self, notif: String) -> ControlFlow<std::io::Result<()>> {
			self.notes.lock().unwrap().push(notif);
			ControlFlow::Continue(())
		}

		fn emit(&mut self, _event: AnyEvent) -> ControlFlow<std::io::Result<()>> {
			ControlFlow::Continue(())
		}
	}

	fn spawn_loop() -> (
		tokio::io::DuplexStream,
		Arc<Mutex<Vec<String>>>,
		PeerSocket<TestProtocol>,
		tokio::task::JoinHandle<std::io::Result<()>>,
	) {
		let (peer, ours) = tokio::io::duplex(1024);
		let notes = Arc::new(Mutex::new(Vec::new()));
		let service_notes = notes.clone();
		let (main_loop, socket) = MainLoop::new(
			move |_socket| EchoService { notes: service_notes },
			TestProtocol,
			CounterIdGen::new(),
		);
		let handle = tokio::spawn(async move {
			let (read, write) = tokio::io::split(ours);
			main_loop.run(BufReader::new(read), write).await
		});
		(peer, notes, socket, handle)
	}

	async fn read_line(reader: &mut (impl AsyncBufRead + Unpin)) -> String {
		let mut line = String::new();
		reader.read_line(&mut line).await.unwrap();
		line.trim_end().to_string()
	}

	#[tokio::test]
	async fn request_gets_correlated_response() {
		let (peer, _notes, _socket, _handle) = spawn_loop();
		let (read, mut write) = tokio::io::split(peer);
		let mut read = BufReader::new(read);

		tokio::io::AsyncWriteExt::write_all(&mut write, b"Q 7 hello\n")
			.await
			.unwrap();
		assert_eq!(read_line(&mut read).await, "A 7 HELLO");
	}

	#[tokio::test]
	async fn handler_error_becomes_error_response() {
		let (peer, _notes, _socket, _handle) = spawn_loop();
		let (read, mut write) = tokio::io::split(peer);
		let mut read = BufReader::new(read);

		tokio::io::AsyncWriteExt::write_all(&mut write, b"Q 2 boom\n")
			.await
			.unwrap();
		assert_eq!(read_line(&mut read).await, "A 2 ERR:boom");
	}

	#[tokio::test]
	async fn notes_reach_notify_without_response() {
		let (peer, notes, _socket, _handle) = spawn_loop();
		let (read, mut write) = tokio::io::split(peer);
		let mut read = BufReader::new(read);

		tokio::io::AsyncWriteExt::write_all(&mut write, b"N ping\nQ 1 x\n")
			.await
			.unwrap();
		// The response to the request proves the note produced no output of
		// its own (frames are emitted in order on this stream).
		assert_eq!(read_line(&mut read).await, "A 1 X");
		assert_eq!(notes.lock().unwrap().as_slice(), ["ping"]);
	}

	#[tokio::test]
	async fn outgoing_request_roundtrip() {
		let (peer, _notes, socket, _handle) = spawn_loop();
		let (read, mut write) = tokio::io::split(peer);
		let mut read = BufReader::new(read);

		let pending = tokio::spawn(async move { socket.request((0, "ping".into())).await });

		assert_eq!(read_line(&mut read).await, "Q 0 ping");
		tokio::io::AsyncWriteExt::write_all(&mut write, b"A 0 pong\n")
			.await
			.unwrap();
		assert_eq!(pending.await.unwrap().unwrap(), (0, "pong".to_string()));
	}

	#[tokio::test]
	async fn peer_disconnect_ends_loop_cleanly() {
		let (peer, _notes, socket, handle) = spawn_loop();
		drop(peer);
		handle.await.unwrap().unwrap();
		assert!(socket.is_closed());
		assert_eq!(
			socket.notify("late".into()),
			Err(crate::Error::ServiceStopped)
		);
	}
}
