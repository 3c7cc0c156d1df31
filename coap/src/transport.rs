use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};

use collections::bytes::Slice;
use log::error;
use runtime::Io;

pub fn slice_from(bytes: &[u8]) -> Slice {
	let mut slice = Slice::new(bytes.len());
	slice.copy_from_slice(bytes);
	slice
}

/// A session's transport leg.
pub trait Transport {
	/// `Ok(true)`: sent. `Ok(false)`: the transport is backpressured
	/// (WOULDBLOCK) and the caller should queue or drop the datagram.
	/// `Err(())`: an unrecoverable I/O error, already logged.
	fn send(&mut self, buf: &[u8]) -> utils::error::Result<bool>;

	/// Drain frames received since the last call.
	fn recv(&mut self) -> Vec<Slice>;

	fn peer(&self) -> SocketAddr;

	/// Feed externally-demultiplexed bytes in. Only meaningful for transports
	/// sharing one OS socket across sessions (UDP, DTLS); stream transports
	/// pull their own bytes straight from their dedicated `Io`.
	fn push_inbound(&mut self, _data: Slice) {}
}

/// UDP is connectionless: every session on one local port shares a single
/// `UdpSocket`, demultiplexed by source address at the endpoint level
/// (`UdpEndpoint`). Each session only holds a cloned handle for `send_to`
/// and a queue the endpoint feeds via `push_inbound`.
pub struct UdpTransport {
	socket: UdpSocket,
	peer: SocketAddr,
	inbound: VecDeque<Slice>,
}

impl UdpTransport {
	fn new(socket: UdpSocket, peer: SocketAddr) -> Self {
		Self { socket, peer, inbound: VecDeque::new() }
	}
}

impl Transport for UdpTransport {
	fn send(&mut self, buf: &[u8]) -> utils::error::Result<bool> {
		match self.socket.send_to(buf, self.peer) {
			Ok(_) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
			Err(e) => Err(error!("UDP send to {} failed: {e}", self.peer)),
		}
	}

	fn recv(&mut self) -> Vec<Slice> {
		self.inbound.drain(..).collect()
	}

	fn peer(&self) -> SocketAddr {
		self.peer
	}

	fn push_inbound(&mut self, data: Slice) {
		self.inbound.push_back(data);
	}
}

/// The shared, non-blocking socket backing every `UdpTransport` on one local
/// endpoint. Polled directly by the context rather than through `runtime::Io`,
/// since demultiplexing by source address needs `recv_from`.
pub struct UdpEndpoint {
	socket: UdpSocket,
}

impl UdpEndpoint {
	pub fn bind(local: SocketAddr) -> io::Result<Self> {
		let socket = UdpSocket::bind(local)?;
		socket.set_nonblocking(true)?;

		Ok(Self { socket })
	}

	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.socket.local_addr()
	}

	/// Pull one more datagram off the shared socket, if any is pending.
	pub fn try_recv(&self) -> io::Result<Option<(SocketAddr, Slice)>> {
		let mut buf = [0u8; 1500];

		match self.socket.recv_from(&mut buf) {
			Ok((n, addr)) => Ok(Some((addr, slice_from(&buf[..n])))),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub fn new_transport(&self, peer: SocketAddr) -> io::Result<UdpTransport> {
		Ok(UdpTransport::new(self.socket.try_clone()?, peer))
	}
}

/// TCP is connection-oriented: each session really does own a distinct OS
/// socket, registered individually with the shared poller.
pub struct TcpTransport {
	io: Io<TcpStream>,
	peer: SocketAddr,
}

impl TcpTransport {
	pub fn connect(peer: SocketAddr) -> io::Result<Self> {
		let sock = TcpStream::connect(peer)?;
		sock.set_nonblocking(true)?;

		Ok(Self { io: Io::new(sock), peer })
	}

	fn from_stream(sock: TcpStream) -> io::Result<Self> {
		let peer = sock.peer_addr()?;
		sock.set_nonblocking(true)?;

		Ok(Self { io: Io::new(sock), peer })
	}
}

impl Transport for TcpTransport {
	/// `runtime::Io::write` queues internally and re-arms `POLLOUT` on
	/// WOULDBLOCK, so from the caller's perspective the write always lands.
	fn send(&mut self, buf: &[u8]) -> utils::error::Result<bool> {
		self.io.write(|c| {
			c.push(buf);
		})?;

		Ok(true)
	}

	fn recv(&mut self) -> Vec<Slice> {
		self.io.recv()
	}

	fn peer(&self) -> SocketAddr {
		self.peer
	}
}

/// Delegated to an externally supplied DTLS/TLS implementation. This crate
/// frames and interprets CoAP only; it never terminates a handshake.
pub trait SecurityLayer {
	fn wrap(&mut self, plaintext: &[u8]) -> Vec<u8>;

	/// Returns `None` if `ciphertext` didn't decrypt to a complete record yet.
	fn unwrap(&mut self, ciphertext: &[u8]) -> Option<Vec<u8>>;
}

pub struct DtlsTransport<S> {
	inner: UdpTransport,
	security: S,
}

impl<S: SecurityLayer> DtlsTransport<S> {
	pub fn new(inner: UdpTransport, security: S) -> Self {
		Self { inner, security }
	}
}

impl<S: SecurityLayer> Transport for DtlsTransport<S> {
	fn send(&mut self, buf: &[u8]) -> utils::error::Result<bool> {
		let record = self.security.wrap(buf);
		self.inner.send(&record)
	}

	fn recv(&mut self) -> Vec<Slice> {
		self.inner.recv().into_iter().filter_map(|s| self.security.unwrap(&s).map(|pt| slice_from(&pt))).collect()
	}

	fn peer(&self) -> SocketAddr {
		self.inner.peer()
	}

	fn push_inbound(&mut self, data: Slice) {
		self.inner.push_inbound(data)
	}
}

pub struct TlsTransport<S> {
	inner: TcpTransport,
	security: S,
}

impl<S: SecurityLayer> TlsTransport<S> {
	pub fn new(inner: TcpTransport, security: S) -> Self {
		Self { inner, security }
	}
}

impl<S: SecurityLayer> Transport for TlsTransport<S> {
	fn send(&mut self, buf: &[u8]) -> utils::error::Result<bool> {
		let record = self.security.wrap(buf);
		self.inner.send(&record)
	}

	fn recv(&mut self) -> Vec<Slice> {
		self.inner.recv().into_iter().filter_map(|s| self.security.unwrap(&s).map(|pt| slice_from(&pt))).collect()
	}

	fn peer(&self) -> SocketAddr {
		self.inner.peer()
	}
}

pub struct TcpListenerTransport {
	listener: TcpListener,
}

impl TcpListenerTransport {
	pub fn bind(local: SocketAddr) -> io::Result<Self> {
		let listener = TcpListener::bind(local)?;
		listener.set_nonblocking(true)?;

		Ok(Self { listener })
	}

	pub fn try_accept(&self) -> io::Result<Option<TcpTransport>> {
		match self.listener.accept() {
			Ok((stream, _addr)) => TcpTransport::from_stream(stream).map(Some),
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
			Err(e) => Err(e),
		}
	}
}
