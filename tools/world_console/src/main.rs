use std::{
    fs,
    io::{BufRead, BufReader, Write},
    net::TcpStream,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value as JsonValue};
use world_proto::{decode_frame, ControlFrame, DEFAULT_COMMAND_PORT};

#[derive(Parser, Debug)]
#[command(author, version, about = "Operator console for a Worldloom host", long_about = None)]
struct Args {
    /// Host running the command channel
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Command channel port
    #[arg(long, default_value_t = DEFAULT_COMMAND_PORT)]
    port: u16,

    /// Seconds to wait for each reply frame
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// Replace the narrative era
    SetEra {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        period: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Set one trait scalar (clamped host-side to [0,1])
    SetTrait { name: String, value: f64 },
    /// Set the atmosphere
    SetAtmosphere { name: String },
    /// Spawn a landmark; the host picks the position
    Spawn {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        kind: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Send a partial state sync (inline JSON, or @path to read a file)
    Sync { state: String },
    /// Send one raw JSON line verbatim
    Raw { line: String },
    /// Stay connected and print every frame the host sends
    Watch,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let stream = TcpStream::connect(&addr)
        .with_context(|| format!("failed to connect to Worldloom host at {addr}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(args.timeout_secs)))
        .context("failed to set read timeout")?;
    let mut reader = BufReader::new(stream.try_clone().context("failed to clone stream")?);

    let greeting = read_frame(&mut reader).context("no greeting from host")?;
    print_frame(&greeting);

    if let ConsoleCommand::Watch = args.command {
        // Watch blocks indefinitely between frames.
        stream
            .set_read_timeout(None)
            .context("failed to clear read timeout")?;
        return watch(&mut reader);
    }

    let line = payload_for(&args.command)?;
    send_line(&stream, &line)?;
    let reply = read_frame(&mut reader).context("no acknowledgment from host")?;
    print_frame(&reply);
    Ok(())
}

fn payload_for(command: &ConsoleCommand) -> Result<String> {
    let payload = match command {
        ConsoleCommand::SetEra {
            id,
            name,
            period,
            description,
        } => json!({
            "type": "SET_ERA",
            "era": {
                "id": id,
                "name": name,
                "period": period,
                "description": description,
            },
        }),
        ConsoleCommand::SetTrait { name, value } => json!({
            "type": "SET_TRAIT",
            "trait": name,
            "value": value,
        }),
        ConsoleCommand::SetAtmosphere { name } => json!({
            "type": "SET_ATMOSPHERE",
            "atmosphere": name,
        }),
        ConsoleCommand::Spawn {
            id,
            name,
            kind,
            description,
        } => json!({
            "type": "SPAWN_SETTLEMENT",
            "settlement": {
                "id": id,
                "name": name,
                "type": kind,
                "description": description,
            },
        }),
        ConsoleCommand::Sync { state } => {
            let state = parse_state_arg(state)?;
            json!({ "type": "SYNC_WORLD_STATE", "state": state })
        }
        ConsoleCommand::Raw { line } => {
            let parsed: JsonValue =
                serde_json::from_str(line).context("raw line is not valid JSON")?;
            if !parsed.is_object() {
                bail!("raw line must be a JSON object");
            }
            parsed
        }
        ConsoleCommand::Watch => unreachable!("watch is handled before payload construction"),
    };
    Ok(payload.to_string())
}

fn parse_state_arg(state: &str) -> Result<JsonValue> {
    let text = match state.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read state file {path}"))?
        }
        None => state.to_owned(),
    };
    let value: JsonValue = serde_json::from_str(&text).context("state payload is not valid JSON")?;
    if !value.is_object() {
        bail!("state payload must be a JSON object");
    }
    Ok(value)
}

fn send_line(mut stream: &TcpStream, line: &str) -> Result<()> {
    stream
        .write_all(line.as_bytes())
        .and_then(|()| stream.write_all(b"\n"))
        .context("failed to send command")?;
    stream.flush().context("failed to flush command")
}

fn read_frame(reader: &mut BufReader<TcpStream>) -> Result<ControlFrame> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).context("read from host failed")?;
    if read == 0 {
        bail!("host closed the connection");
    }
    decode_frame(line.trim()).with_context(|| format!("unparseable frame from host: {line:?}"))
}

fn print_frame(frame: &ControlFrame) {
    match frame {
        ControlFrame::Connected { message } => println!("connected: {message}"),
        ControlFrame::Ack { status } => println!("ack: {status}"),
    }
}

fn watch(reader: &mut BufReader<TcpStream>) -> Result<()> {
    loop {
        match read_frame(reader) {
            Ok(frame) => print_frame(&frame),
            Err(err) => return Err(err),
        }
    }
}
