//! Startup failures and shutdown of the server binary.
#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::{server_command, spawn_server, write_config};
use serde_json::json;

#[tokio::test]
async fn missing_config_path() -> anyhow::Result<()> {
    let status = server_command().status().await?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}

#[tokio::test]
async fn unreadable_config() -> anyhow::Result<()> {
    let status = server_command()
        .env("CONFIG_FILE_PATH", "/nonexistent/httpwrap.json")
        .status()
        .await?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn malformed_config() -> anyhow::Result<()> {
    let mut path = std::env::temp_dir();
    path.push(format!("httpwrap-test-{}.json", fastrand::u64(..)));
    std::fs::write(&path, "{ not json")?;
    let status = server_command().arg("--config").arg(&path).status().await?;
    std::fs::remove_file(&path)?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}

#[tokio::test]
async fn port_in_use() -> anyhow::Result<()> {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = occupied.local_addr()?.port();
    let path = write_config(&json!({}), port);
    let status = server_command().arg("--config").arg(&path).status().await?;
    std::fs::remove_file(&path)?;
    assert_eq!(status.code(), Some(3));
    Ok(())
}

async fn interrupt(pid: u32) -> anyhow::Result<()> {
    let status = tokio::process::Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .status()
        .await?;
    anyhow::ensure!(status.success(), "failed to send SIGINT");
    Ok(())
}

#[tokio::test]
async fn interrupt_when_idle() -> anyhow::Result<()> {
    let mut server = spawn_server(&json!({
        "/hello": { "command": "echo", "arguments": ["hello"] }
    }))
    .await?;
    let pid = server.child.id().expect("server is running");
    // Give the server a moment to install its signal handlers.
    tokio::time::sleep(Duration::from_millis(200)).await;

    interrupt(pid).await?;
    let status = tokio::time::timeout(Duration::from_secs(3), server.child.wait()).await??;
    assert!(status.success());
    Ok(())
}

#[tokio::test]
async fn interrupt_with_long_running_command() -> anyhow::Result<()> {
    let mut server = spawn_server(&json!({
        "/sleep": { "command": "sleep", "arguments": ["30"] }
    }))
    .await?;
    let pid = server.child.id().expect("server is running");

    let hc = server.client()?;
    let request = hc.do_get("/sleep");
    let shutdown = async {
        // Let the command start before interrupting.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let start = Instant::now();
        interrupt(pid).await?;
        let status = tokio::time::timeout(Duration::from_secs(10), server.child.wait()).await??;
        anyhow::Ok((status, start.elapsed()))
    };
    // The request is either cut off or answered with the killed process.
    let (_, shutdown) = tokio::join!(request, shutdown);
    let (status, elapsed) = shutdown?;

    assert!(status.success());
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(10));
    Ok(())
}
