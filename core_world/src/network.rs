use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use bevy::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{info, trace, warn};

use world_proto::{encode_frame_line, ControlFrame};

use crate::{config::WorldHostConfig, framing::LineFramer};

const READ_CHUNK_BYTES: usize = 64 * 1024;
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// What the socket thread reports to the state-owning side.
#[derive(Debug)]
pub enum ServerEvent {
    ClientConnected,
    ClientDisconnected,
    /// One complete framed line, already trimmed.
    Message(String),
}

/// Startup failure of the command channel. Runtime socket trouble after a
/// successful start is logged and survived instead of surfacing here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind command listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// The dispatcher's side of the socket thread: inbound events out, control
/// frames back in.
#[derive(Resource)]
pub struct ServerEndpoint {
    pub(crate) events: Receiver<ServerEvent>,
    pub(crate) outbound: Sender<ControlFrame>,
}

impl ServerEndpoint {
    pub fn try_recv(&self) -> Option<ServerEvent> {
        self.events.try_recv().ok()
    }

    /// Queue a frame for the connected controller. With the thread gone the
    /// frame has nowhere to go and is dropped silently.
    pub fn send_frame(&self, frame: ControlFrame) {
        let _ = self.outbound.send(frame);
    }
}

/// Owns the background socket thread serving one controller at a time.
pub struct CommandServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CommandServer {
    /// Bind the listener and start the socket thread. The returned endpoint
    /// goes into the app as a resource so the dispatcher can drain it.
    pub fn start(config: &WorldHostConfig) -> Result<(Self, ServerEndpoint), TransportError> {
        let addr = config.command_bind;
        let bind_err = |source| TransportError::Bind { addr, source };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = unbounded();
        let (frame_tx, frame_rx) = unbounded();
        let worker = SocketWorker {
            listener,
            shutdown: Arc::clone(&shutdown),
            events: event_tx,
            frames: frame_rx,
            greeting: config.greeting.clone(),
            max_line_bytes: config.max_line_bytes,
            poll_interval: config.poll_interval(),
            scratch: vec![0u8; READ_CHUNK_BYTES],
        };
        let thread = thread::spawn(move || worker.run());

        info!(target: "worldloom::net", addr = %local_addr, "command server listening");
        Ok((
            Self {
                local_addr,
                shutdown,
                thread: Some(thread),
            },
            ServerEndpoint {
                events: event_rx,
                outbound: frame_tx,
            },
        ))
    }

    /// The bound address, useful when the config asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the socket thread and block until it has fully exited, closing
    /// the listener and any active client. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!(target: "worldloom::net", "socket thread panicked during shutdown");
            } else {
                info!(target: "worldloom::net", "command server stopped");
            }
        }
    }
}

impl Drop for CommandServer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SocketWorker {
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    events: Sender<ServerEvent>,
    frames: Receiver<ControlFrame>,
    greeting: String,
    max_line_bytes: usize,
    poll_interval: Duration,
    scratch: Vec<u8>,
}

struct ClientConn {
    stream: TcpStream,
    peer: SocketAddr,
    framer: LineFramer,
    write_queue: VecDeque<Vec<u8>>,
    write_offset: usize,
}

impl SocketWorker {
    fn run(mut self) {
        let mut client: Option<ClientConn> = None;
        while !self.shutdown.load(Ordering::SeqCst) {
            if client.is_none() {
                client = self.poll_accept();
            }
            let mut drop_client = false;
            if let Some(conn) = client.as_mut() {
                drop_client = !self.service_client(conn);
            } else {
                // No peer to write to; queued frames are stale by design.
                while let Ok(frame) = self.frames.try_recv() {
                    trace!(target: "worldloom::net", ?frame, "dropping frame, no controller");
                }
            }
            if drop_client {
                client = None;
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn poll_accept(&mut self) -> Option<ClientConn> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = stream.set_nonblocking(true) {
                    warn!(target: "worldloom::net", %peer, error = %err, "rejecting client, nonblocking mode failed");
                    return None;
                }
                if let Err(err) = stream.set_nodelay(true) {
                    warn!(target: "worldloom::net", %peer, error = %err, "TCP_NODELAY not applied");
                }
                info!(target: "worldloom::net", %peer, "controller connected");
                let mut conn = ClientConn {
                    stream,
                    peer,
                    framer: LineFramer::new(self.max_line_bytes),
                    write_queue: VecDeque::new(),
                    write_offset: 0,
                };
                match encode_frame_line(&ControlFrame::connected(self.greeting.clone())) {
                    Ok(line) => conn.write_queue.push_back(line.into_bytes()),
                    Err(err) => {
                        warn!(target: "worldloom::net", error = %err, "greeting frame encode failed")
                    }
                }
                if self.events.send(ServerEvent::ClientConnected).is_err() {
                    self.request_shutdown();
                    return None;
                }
                Some(conn)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
            Err(err) => {
                warn!(target: "worldloom::net", error = %err, "accept failed");
                thread::sleep(ACCEPT_RETRY_DELAY);
                None
            }
        }
    }

    // Returns false when the connection should be dropped.
    fn service_client(&mut self, conn: &mut ClientConn) -> bool {
        loop {
            match conn.stream.read(&mut self.scratch) {
                Ok(0) => {
                    info!(target: "worldloom::net", peer = %conn.peer, "controller disconnected");
                    self.notify_disconnect();
                    return false;
                }
                Ok(read) => {
                    if let Err(err) = conn.framer.push(&self.scratch[..read]) {
                        warn!(
                            target: "worldloom::net",
                            peer = %conn.peer,
                            error = %err,
                            "framing violation, dropping connection"
                        );
                        self.notify_disconnect();
                        return false;
                    }
                    for line in conn.framer.drain_lines() {
                        if self.events.send(ServerEvent::Message(line)).is_err() {
                            self.request_shutdown();
                            return false;
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(target: "worldloom::net", peer = %conn.peer, error = %err, "read failed");
                    self.notify_disconnect();
                    return false;
                }
            }
        }

        while let Ok(frame) = self.frames.try_recv() {
            match encode_frame_line(&frame) {
                Ok(line) => conn.write_queue.push_back(line.into_bytes()),
                Err(err) => {
                    warn!(target: "worldloom::net", error = %err, "dropping unencodable frame")
                }
            }
        }
        self.flush_writes(conn)
    }

    // Nonblocking flush with partial-write tracking; leftovers wait for the
    // next poll.
    fn flush_writes(&mut self, conn: &mut ClientConn) -> bool {
        loop {
            let Some(front) = conn.write_queue.front() else {
                return true;
            };
            match conn.stream.write(&front[conn.write_offset..]) {
                Ok(0) => {
                    warn!(target: "worldloom::net", peer = %conn.peer, "peer stopped accepting writes");
                    self.notify_disconnect();
                    return false;
                }
                Ok(written) => {
                    conn.write_offset += written;
                    let finished = conn.write_offset >= front.len();
                    if finished {
                        conn.write_queue.pop_front();
                        conn.write_offset = 0;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(target: "worldloom::net", peer = %conn.peer, error = %err, "write failed");
                    self.notify_disconnect();
                    return false;
                }
            }
        }
    }

    fn notify_disconnect(&self) {
        if self.events.send(ServerEvent::ClientDisconnected).is_err() {
            self.request_shutdown();
        }
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
