//! Spawning the server binary with a generated config.
// Not every test target uses every helper.
#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio::process::{Child, Command};

/// A running server, killed on drop.
pub struct Server {
    pub child: Child,
    pub port: u16,
    config: PathBuf,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.config);
    }
}

impl Server {
    pub fn client(&self) -> anyhow::Result<httpc_test::Client> {
        Ok(httpc_test::new_client(format!("http://127.0.0.1:{}", self.port))?)
    }
}

/// Writes `endpoints` to a config file listening on a random port.
pub fn write_config(endpoints: &Value, port: u16) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("httpwrap-test-{}.json", fastrand::u64(..)));
    let config = serde_json::json!({
        "endpoints": endpoints,
        "listen_address": "127.0.0.1",
        "listen_port": port,
    });
    std::fs::write(&path, config.to_string()).expect("Should be able to write to the temporary directory!");
    path
}

pub fn server_command() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_httpwrap-server"));
    command.kill_on_drop(true).env_remove("CONFIG_FILE_PATH");
    command
}

/// Starts the server binary and waits until it accepts connections.
pub async fn spawn_server(endpoints: &Value) -> anyhow::Result<Server> {
    // IANA recommended port range.
    let port = fastrand::u16(49152..65535);
    let config = write_config(endpoints, port);
    let child = server_command().arg("--config").arg(&config).spawn()?;

    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(Server {
                child,
                port,
                config,
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    anyhow::bail!("server did not start listening on port {port}")
}
