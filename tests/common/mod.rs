//! Shared utilities for integration tests.
//!
//! Provides a simulated host application:
//! - A [`HostLauncher`] that records every automation command
//! - An in-test extension that connects back over TCP and answers frames
//! - Logging initialization

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use cad_bridge::protocol::{PING, PONG, encode_frame};
use cad_bridge::session::EXTENSION_FILE_NAME;
use cad_bridge::{AutomationHandle, HostFault, HostLauncher};
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// What the simulated extension does after reading a request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write this payload back as one frame.
    Frame(String),
    /// Close the connection without answering.
    Hangup,
}

type Handler = dyn Fn(&str, &str) -> Reply + Send + Sync;

struct HostState {
    commands: Vec<String>,
    stream: Option<TcpStream>,
    busy_calls: usize,
    missing_document: bool,
    documents_added: usize,
    launches: Vec<String>,
}

/// Simulated host application and its loaded extension.
#[derive(Clone)]
pub struct SimulatedHost {
    state: Arc<Mutex<HostState>>,
    handler: Arc<Handler>,
}

// ============================================================================
// SimulatedHost
// ============================================================================

impl SimulatedHost {
    /// Host whose extension answers `ping` with `pong` and everything else
    /// through `handler(wake_command, payload)`.
    pub fn new(handler: impl Fn(&str, &str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                commands: Vec::new(),
                stream: None,
                busy_calls: 0,
                missing_document: false,
                documents_added: 0,
                launches: Vec::new(),
            })),
            handler: Arc::new(handler),
        }
    }

    /// Host answering every operation with `{"b":2}`.
    pub fn answering() -> Self {
        Self::new(|command, payload| {
            if payload == PING {
                Reply::Frame(PONG.to_string())
            } else if command == "SACAD_DBOP" {
                Reply::Frame(r#"{"b":2}"#.to_string())
            } else {
                Reply::Frame(format!("{command}:{payload}"))
            }
        })
    }

    /// Rejects the next `count` commands as busy.
    pub fn reject_next(&self, count: usize) {
        self.state.lock().busy_calls = count;
    }

    /// Fails the next command with "no active document".
    pub fn close_document(&self) {
        self.state.lock().missing_document = true;
    }

    /// Command names dispatched so far, in order.
    pub fn command_names(&self) -> Vec<String> {
        self.state
            .lock()
            .commands
            .iter()
            .map(|text| command_parts(text).0)
            .collect()
    }

    /// Full command texts dispatched so far.
    pub fn command_texts(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Program ids passed to the launcher.
    pub fn launches(&self) -> Vec<String> {
        self.state.lock().launches.clone()
    }

    /// Documents created after a "no active document" fault.
    pub fn documents_added(&self) -> usize {
        self.state.lock().documents_added
    }

    /// Closes the extension's side of the connection.
    pub fn drop_connection(&self) {
        if let Some(stream) = self.state.lock().stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl HostLauncher for SimulatedHost {
    fn launch_or_attach(&self, prog_id: &str) -> Result<Box<dyn AutomationHandle>, HostFault> {
        self.state.lock().launches.push(prog_id.to_string());
        Ok(Box::new(self.clone()))
    }
}

impl AutomationHandle for SimulatedHost {
    fn set_visible(&mut self, _visible: bool) -> Result<(), HostFault> {
        Ok(())
    }

    fn send_command(&mut self, text: &str) -> Result<(), HostFault> {
        {
            let mut state = self.state.lock();
            if state.busy_calls > 0 {
                state.busy_calls -= 1;
                return Err(HostFault::call_rejected());
            }
            if state.missing_document {
                return Err(HostFault::no_document());
            }
            state.commands.push(text.to_string());
        }

        let (name, args) = command_parts(text);
        match name.as_str() {
            "SACAD_CONNECT" => self.connect_back(&args[0]),
            "SACAD_PING" | "SACAD_DBOP" | "SACAD_DOCOP" | "SACAD_SESSIONOP" => self.answer(&name),
            _ => Ok(()),
        }
    }

    fn add_document(&mut self) -> Result<(), HostFault> {
        let mut state = self.state.lock();
        state.missing_document = false;
        state.documents_added += 1;
        Ok(())
    }

    fn activate_window(&mut self) -> Result<(), HostFault> {
        Ok(())
    }
}

impl SimulatedHost {
    fn connect_back(&self, endpoint: &str) -> Result<(), HostFault> {
        let stream = TcpStream::connect(endpoint)
            .map_err(|e| HostFault::other(format!("extension cannot connect: {e}")))?;
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .map_err(|e| HostFault::other(e.to_string()))?;
        self.state.lock().stream = Some(stream);
        Ok(())
    }

    /// Reads the waiting frame and answers it.
    fn answer(&self, command: &str) -> Result<(), HostFault> {
        let Some(mut stream) = self.state.lock().stream.take() else {
            return Err(HostFault::other("extension is not connected"));
        };

        let payload = read_frame(&mut stream).map_err(|e| HostFault::other(e.to_string()))?;

        match (self.handler)(command, &payload) {
            Reply::Frame(reply) => {
                stream
                    .write_all(&encode_frame(&reply))
                    .map_err(|e| HostFault::other(e.to_string()))?;
                self.state.lock().stream = Some(stream);
            }
            Reply::Hangup => {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing for tests.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("cad_bridge=debug"))
        .with_test_writer()
        .try_init();
}

/// Creates an extension folder holding builds for `releases`.
pub fn extension_dir(releases: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for release in releases {
        let folder = dir.path().join(release);
        fs::create_dir_all(&folder).expect("mkdir");
        fs::write(folder.join(EXTENSION_FILE_NAME), b"MZ").expect("write extension");
    }
    dir
}

/// Splits `(command "NAME" "a" "b") ` into the name and arguments.
pub fn command_parts(text: &str) -> (String, Vec<String>) {
    let mut quoted = text.split('"').skip(1).step_by(2).map(str::to_string);
    let name = quoted.next().unwrap_or_default();
    (name, quoted.collect())
}

/// Reads one `<len>\n<payload>` frame.
pub fn read_frame(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut header = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        header.push(byte[0]);
    }

    let len: usize = String::from_utf8_lossy(&header)
        .trim()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    String::from_utf8(payload).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
