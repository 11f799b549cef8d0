use std::{process, thread};

use tracing::{error, info};

use core_world::{build_host_app, run_host_update, start_command_channel, WorldHostConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match WorldHostConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "host config load failed");
            process::exit(1);
        }
    };
    let poll_interval = config.poll_interval();

    let mut app = build_host_app(config);
    let server = match start_command_channel(&mut app) {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "command channel failed to start");
            process::exit(1);
        }
    };

    info!(addr = %server.local_addr(), "Worldloom host ready");

    loop {
        run_host_update(&mut app);
        thread::sleep(poll_interval);
    }
}
