#![allow(dead_code)]

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Scratch directory for CSV inputs, configs and outputs, removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

pub fn importfile() -> Command {
    let mut cmd = Command::cargo_bin("bonita-importfile").expect("binary exists");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Parses JSON-lines output into one value per line.
pub fn json_lines(output: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

/// A minimal Bonita server on a local port. Login issues an API token cookie,
/// the process listing answers with `processes`, and every request head is
/// recorded in arrival order.
pub struct FakeBonita {
    url: String,
    requests: Receiver<String>,
}

impl FakeBonita {
    pub fn start(processes: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let (tx, requests) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let Some(head) = read_request_head(&mut stream) else {
                    continue;
                };
                let (extra, body) = if head.contains("/loginservice") {
                    ("Set-Cookie: X-Bonita-API-Token=token-1; Path=/\r\n", "")
                } else if head.contains("/API/bpm/process?") {
                    ("", processes)
                } else {
                    ("", "")
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra}\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                if tx.send(head).is_err() {
                    break;
                }
            }
        });
        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request heads received so far, lowercased.
    pub fn requests(&self) -> Vec<String> {
        let mut heads = Vec::new();
        while let Ok(head) = self.requests.recv_timeout(Duration::from_millis(500)) {
            heads.push(head.to_lowercase());
        }
        heads
    }
}

fn read_request_head(stream: &mut TcpStream) -> Option<String> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        if line == "\r\n" {
            break;
        }
        if let Some((_, value)) = line
            .split_once(':')
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
        head.push_str(&line);
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(head)
}
