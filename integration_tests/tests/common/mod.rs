#![allow(dead_code)] // each test binary uses its own slice of these helpers

use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpStream},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use bevy::prelude::*;
use core_world::{build_host_app, start_command_channel, CommandServer, WorldHostConfig};
use world_proto::{decode_frame, ControlFrame};

const WAIT_BUDGET: Duration = Duration::from_secs(5);

/// A live host under test: app plus its bound command channel. Binds port 0
/// so parallel test binaries never collide.
pub struct TestHost {
    pub app: App,
    pub server: CommandServer,
    pub addr: SocketAddr,
}

pub fn start_host() -> TestHost {
    let mut config = WorldHostConfig::default();
    config.command_bind = "127.0.0.1:0".parse().expect("loopback addr");
    config.poll_interval_ms = 1;
    let mut app = build_host_app(config);
    let server = start_command_channel(&mut app).expect("test host should bind");
    let addr = server.local_addr();
    TestHost { app, server, addr }
}

impl TestHost {
    /// Drive app updates until the predicate holds or the wait budget runs
    /// out. The socket thread keeps polling on its own; this only pumps the
    /// state-owning side.
    pub fn pump_until(&mut self, what: &str, mut done: impl FnMut(&mut App) -> bool) {
        let deadline = Instant::now() + WAIT_BUDGET;
        loop {
            self.app.update();
            if done(&mut self.app) {
                return;
            }
            if Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Blocking client side of the wire protocol.
pub struct Controller {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Controller {
    /// Connect and consume the greeting, which the socket thread sends
    /// without any app pumping.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream =
            TcpStream::connect(addr).with_context(|| format!("connect to test host at {addr}"))?;
        stream
            .set_read_timeout(Some(WAIT_BUDGET))
            .context("set read timeout")?;
        stream.set_nodelay(true).context("set nodelay")?;
        let reader = BufReader::new(stream.try_clone().context("clone stream")?);
        let mut controller = Self { stream, reader };
        let frame = controller.read_frame()?;
        let ControlFrame::Connected { .. } = frame else {
            bail!("expected CONNECTED greeting, got {frame:?}");
        };
        Ok(controller)
    }

    pub fn send_line(&mut self, line: &str) -> Result<()> {
        self.send_bytes(line.as_bytes())?;
        self.send_bytes(b"\n")
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).context("send to host")?;
        self.stream.flush().context("flush to host")
    }

    pub fn read_frame(&mut self) -> Result<ControlFrame> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).context("read from host")?;
        if read == 0 {
            bail!("host closed the connection");
        }
        decode_frame(line.trim()).with_context(|| format!("unparseable frame: {line:?}"))
    }

    pub fn expect_acks(&mut self, count: usize) -> Result<()> {
        for idx in 0..count {
            let frame = self.read_frame()?;
            let ControlFrame::Ack { status } = frame else {
                bail!("expected ACK #{idx}, got {frame:?}");
            };
            if status != "ok" {
                bail!("ACK #{idx} carried status {status:?}");
            }
        }
        Ok(())
    }
}
