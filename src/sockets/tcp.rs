/*!
 * TCP Sockets
 * Connection state machine over tokio sockets
 *
 * unbound -> bound -> listening -> (accept) new connected socket
 * unbound | bound -> connecting -> connected | closed
 * any -> closed on shutdown
 *
 * Native sockets are created lazily, after the allow-list check. Connect
 * and accept run as tasks on the host runtime; their completion is only
 * observable through `subscribe` and the non-blocking accessors.
 */

use super::context::SocketContext;
use super::network::Network;
use super::types::{IpAddressFamily, ShutdownType, SocketState};
use crate::poll::{Condition, Pollable, Readiness, Signal};
use crate::streams::{InputStream, OutputStream};
use crate::table::HostResource;
use crate::translate::{ErrorCode, Operation};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Outcome of one connect attempt
struct ConnectSlot {
    outcome: Mutex<Option<Result<TcpStream, ErrorCode>>>,
    completed: AtomicBool,
    signal: Signal,
}

impl ConnectSlot {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(None),
            completed: AtomicBool::new(false),
            signal: Signal::new(),
        })
    }

    /// Slot for a socket that arrived already connected
    fn established() -> Arc<Self> {
        let slot = Self::pending();
        slot.completed.store(true, Ordering::Release);
        slot
    }

    /// First result wins; later ones are discarded
    fn complete(&self, result: Result<TcpStream, ErrorCode>) {
        {
            let mut outcome = self.outcome.lock();
            if self.completed.load(Ordering::Acquire) {
                return;
            }
            *outcome = Some(result);
            self.completed.store(true, Ordering::Release);
        }
        self.signal.raise();
    }

    fn take(&self) -> Option<Result<TcpStream, ErrorCode>> {
        self.outcome.lock().take()
    }
}

impl Readiness for ConnectSlot {
    // Stays true after finish_connect so every subscriber observes it
    fn is_ready(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn signal(&self) -> Option<&Signal> {
        Some(&self.signal)
    }
}

type Accepted = Result<(TcpStream, SocketAddr), ErrorCode>;

/// Connections accepted by the background task, bounded by the backlog
struct AcceptQueue {
    pending: Mutex<VecDeque<Accepted>>,
    limit: usize,
    closed: AtomicBool,
    signal: Signal,
    space: Notify,
}

impl AcceptQueue {
    fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
            closed: AtomicBool::new(false),
            signal: Signal::new(),
            space: Notify::new(),
        })
    }

    fn pop(&self) -> Option<Accepted> {
        let next = self.pending.lock().pop_front();
        if next.is_some() {
            self.space.notify_one();
        }
        next
    }

    /// No more connections will arrive; waiters wake and see the socket closed
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.signal.raise();
    }
}

impl Readiness for AcceptQueue {
    fn is_ready(&self) -> bool {
        self.closed.load(Ordering::Acquire) || !self.pending.lock().is_empty()
    }

    fn signal(&self) -> Option<&Signal> {
        Some(&self.signal)
    }
}

async fn accept_loop(listener: TcpListener, queue: Arc<AcceptQueue>, ctx: SocketContext) {
    loop {
        loop {
            let room = queue.space.notified();
            if queue.pending.lock().len() < queue.limit {
                break;
            }
            room.await;
        }
        let accepted = listener
            .accept()
            .await
            .map_err(|e| ctx.translator.translate(&e, Operation::Accept));
        trace!(ok = accepted.is_ok(), "accept completed");
        queue.pending.lock().push_back(accepted);
        queue.signal.raise();
    }
}

enum State {
    Unbound,
    Bound {
        socket: tokio::net::TcpSocket,
        local: SocketAddr,
    },
    Listening {
        local: SocketAddr,
        queue: Arc<AcceptQueue>,
        task: JoinHandle<()>,
    },
    Connecting {
        slot: Arc<ConnectSlot>,
        task: JoinHandle<()>,
    },
    Connected {
        local: SocketAddr,
        remote: SocketAddr,
        control: std::net::TcpStream,
        slot: Arc<ConnectSlot>,
    },
    Closed,
}

impl State {
    fn observe(&self) -> SocketState {
        match self {
            Self::Unbound => SocketState::Unbound,
            Self::Bound { .. } => SocketState::Bound,
            Self::Listening { .. } => SocketState::Listening,
            Self::Connecting { .. } => SocketState::Connecting,
            Self::Connected { .. } => SocketState::Connected,
            Self::Closed => SocketState::Closed,
        }
    }
}

/// Connected stream split into guest-facing halves
struct Established {
    local: SocketAddr,
    remote: SocketAddr,
    control: std::net::TcpStream,
    input: InputStream,
    output: OutputStream,
}

pub struct TcpSocket {
    family: IpAddressFamily,
    state: Mutex<State>,
    ctx: SocketContext,
}

impl TcpSocket {
    pub(crate) fn new(ctx: SocketContext, family: IpAddressFamily) -> Self {
        Self {
            family,
            state: Mutex::new(State::Unbound),
            ctx,
        }
    }

    #[inline]
    pub fn address_family(&self) -> IpAddressFamily {
        self.family
    }

    pub fn state(&self) -> SocketState {
        self.state.lock().observe()
    }

    fn native_error(&self, op: Operation) -> impl Fn(std::io::Error) -> ErrorCode + '_ {
        move |e| self.ctx.translator.translate(&e, op)
    }

    fn check_family(&self, addr: &SocketAddr) -> Result<(), ErrorCode> {
        if IpAddressFamily::of(addr) == self.family {
            Ok(())
        } else {
            Err(ErrorCode::InvalidArgument)
        }
    }

    fn new_native(&self) -> Result<tokio::net::TcpSocket, ErrorCode> {
        let socket = match self.family {
            IpAddressFamily::Ipv4 => tokio::net::TcpSocket::new_v4(),
            IpAddressFamily::Ipv6 => tokio::net::TcpSocket::new_v6(),
        }
        .map_err(self.native_error(Operation::Other))?;
        #[cfg(not(windows))]
        socket
            .set_reuseaddr(true)
            .map_err(self.native_error(Operation::Bind))?;
        Ok(socket)
    }

    pub fn bind(&self, network: &Network, local: SocketAddr) -> Result<(), ErrorCode> {
        network.check(&local)?;
        self.check_family(&local)?;
        let mut state = self.state.lock();
        if !matches!(*state, State::Unbound) {
            return Err(ErrorCode::InvalidArgument);
        }
        let socket = self.new_native()?;
        socket.bind(local).map_err(self.native_error(Operation::Bind))?;
        let local = socket
            .local_addr()
            .map_err(self.native_error(Operation::Bind))?;
        debug!(%local, "socket bound");
        *state = State::Bound { socket, local };
        Ok(())
    }

    /// Start listening; `backlog` defaults to the configured value
    pub fn listen(&self, backlog: Option<u32>) -> Result<(), ErrorCode> {
        let mut state = self.state.lock();
        let (socket, local) = match mem::replace(&mut *state, State::Closed) {
            State::Bound { socket, local } => (socket, local),
            other => {
                *state = other;
                return Err(ErrorCode::InvalidArgument);
            }
        };
        let backlog = backlog.unwrap_or(self.ctx.listen_backlog).max(1);
        let listener = {
            let _runtime = self.ctx.runtime.enter();
            socket
                .listen(backlog)
                .map_err(self.native_error(Operation::Listen))?
        };
        let queue = AcceptQueue::new(backlog as usize);
        let task = self
            .ctx
            .runtime
            .spawn(accept_loop(listener, Arc::clone(&queue), self.ctx.clone()));
        info!(%local, backlog, "socket listening");
        *state = State::Listening { local, queue, task };
        Ok(())
    }

    /// Take the next accepted connection without waiting
    pub fn accept(&self) -> Result<(TcpSocket, InputStream, OutputStream), ErrorCode> {
        let queue = match &*self.state.lock() {
            State::Listening { queue, .. } => Arc::clone(queue),
            _ => return Err(ErrorCode::InvalidArgument),
        };
        let (stream, remote) = match queue.pop() {
            None => return Err(ErrorCode::WouldBlock),
            Some(accepted) => accepted?,
        };
        let established = self.establish(stream)?;
        debug!(%remote, "connection accepted");

        let socket = TcpSocket {
            family: IpAddressFamily::of(&established.remote),
            state: Mutex::new(State::Connected {
                local: established.local,
                remote: established.remote,
                control: established.control,
                slot: ConnectSlot::established(),
            }),
            ctx: self.ctx.clone(),
        };
        Ok((socket, established.input, established.output))
    }

    /// Begin connecting; completion is observed via `subscribe`
    pub fn start_connect(&self, network: &Network, remote: SocketAddr) -> Result<(), ErrorCode> {
        network.check(&remote)?;
        self.check_family(&remote)?;
        if remote.ip().is_unspecified() || remote.port() == 0 {
            return Err(ErrorCode::InvalidArgument);
        }

        let mut state = self.state.lock();
        let socket = match mem::replace(&mut *state, State::Closed) {
            State::Unbound => match self.new_native() {
                Ok(socket) => socket,
                Err(code) => {
                    *state = State::Unbound;
                    return Err(code);
                }
            },
            State::Bound { socket, .. } => socket,
            other => {
                *state = other;
                return Err(ErrorCode::InvalidArgument);
            }
        };

        let slot = ConnectSlot::pending();
        let task = {
            let slot = Arc::clone(&slot);
            let translator = self.ctx.translator;
            let timeout = self.ctx.connect_timeout;
            self.ctx.runtime.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, socket.connect(remote)).await {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(translator.translate(&e, Operation::Connect)),
                    Err(_) => Err(ErrorCode::Timeout),
                };
                debug!(%remote, ok = outcome.is_ok(), "connect completed");
                slot.complete(outcome);
            })
        };
        debug!(%remote, "connect started");
        *state = State::Connecting { slot, task };
        Ok(())
    }

    /// Collect the connect result: would-block until it is known
    pub fn finish_connect(&self) -> Result<(InputStream, OutputStream), ErrorCode> {
        let mut state = self.state.lock();
        let slot = match &*state {
            State::Connecting { slot, .. } => Arc::clone(slot),
            _ => return Err(ErrorCode::InvalidArgument),
        };
        if !slot.is_ready() {
            return Err(ErrorCode::WouldBlock);
        }

        let established = match slot.take() {
            Some(Ok(stream)) => self.establish(stream),
            Some(Err(code)) => Err(code),
            None => Err(ErrorCode::Io),
        };
        match established {
            Ok(established) => {
                info!(remote = %established.remote, "socket connected");
                *state = State::Connected {
                    local: established.local,
                    remote: established.remote,
                    control: established.control,
                    slot,
                };
                Ok((established.input, established.output))
            }
            Err(code) => {
                *state = State::Closed;
                Err(code)
            }
        }
    }

    fn establish(&self, stream: TcpStream) -> Result<Established, ErrorCode> {
        let local = stream.local_addr().map_err(self.native_error(Operation::Connect))?;
        let remote = stream.peer_addr().map_err(self.native_error(Operation::Connect))?;

        // Keep a duplicate of the native socket for shutdown
        let native = stream.into_std().map_err(self.native_error(Operation::Connect))?;
        let control = native.try_clone().map_err(self.native_error(Operation::Connect))?;
        let stream = {
            let _runtime = self.ctx.runtime.enter();
            TcpStream::from_std(native).map_err(self.native_error(Operation::Connect))?
        };
        let (read, write) = stream.into_split();
        let input = InputStream::from_async_read(
            &self.ctx.runtime,
            read,
            self.ctx.stream_capacity,
            self.ctx.translator,
        );
        let output = OutputStream::from_async_write(
            &self.ctx.runtime,
            write,
            self.ctx.stream_capacity,
            self.ctx.translator,
        );
        Ok(Established {
            local,
            remote,
            control,
            input,
            output,
        })
    }

    pub fn shutdown(&self, how: ShutdownType) -> Result<(), ErrorCode> {
        let previous = mem::replace(&mut *self.state.lock(), State::Closed);
        match previous {
            State::Connected { control, .. } => match control.shutdown(how.into()) {
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                result => result.map_err(self.native_error(Operation::Shutdown)),
            },
            other => {
                settle(other);
                Ok(())
            }
        }
    }

    /// Pollable for connect completion or a pending accepted connection
    pub fn subscribe(&self) -> Pollable {
        match &*self.state.lock() {
            State::Connecting { slot, .. } | State::Connected { slot, .. } => {
                Pollable::new(Arc::clone(slot) as Arc<dyn Readiness>, Condition::ConnectionEstablished)
            }
            State::Listening { queue, .. } => {
                Pollable::new(Arc::clone(queue) as Arc<dyn Readiness>, Condition::AcceptReady)
            }
            _ => Pollable::ready(),
        }
    }

    pub fn local_address(&self) -> Result<SocketAddr, ErrorCode> {
        match &*self.state.lock() {
            State::Bound { local, .. }
            | State::Listening { local, .. }
            | State::Connected { local, .. } => Ok(*local),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }

    pub fn remote_address(&self) -> Result<SocketAddr, ErrorCode> {
        match &*self.state.lock() {
            State::Connected { remote, .. } => Ok(*remote),
            _ => Err(ErrorCode::InvalidArgument),
        }
    }
}

impl HostResource for TcpSocket {
    fn release(&self) {
        settle(mem::replace(&mut *self.state.lock(), State::Closed));
    }
}

/// Stop the background work of a state being left, waking its pollables
fn settle(previous: State) {
    match previous {
        State::Listening { queue, task, .. } => {
            task.abort();
            queue.close();
        }
        State::Connecting { slot, task } => {
            task.abort();
            slot.complete(Err(ErrorCode::Interrupted));
        }
        _ => {}
    }
}

impl fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpSocket")
            .field("family", &self.family)
            .field("state", &self.state())
            .finish()
    }
}
