//! Backend process wrapper and the single command channel to it (async I/O)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use posdb_core::response::QueryResponse;

use crate::config::ClientConfig;
use crate::error::{ClientError, ProtocolError};
use crate::framing;
use crate::protocol::{
    self, CreateRequest, DatabaseInfo, DatabaseStats, DatabaseSupportManifest, DumpRequest,
    Progress, QueryRequest, Request, SupportResponse,
};

/// Everything guarded by the channel mutex.
struct Session {
    stream: TcpStream,
    process: Option<Child>,
    /// Cleared while a request is in flight and by protocol errors; later
    /// calls fail fast.
    usable: bool,
    path: Option<PathBuf>,
    is_open: bool,
}

impl Session {
    /// Write one request. The channel stays marked unusable until the reply
    /// has been read in full, so an exchange dropped midway poisons it.
    async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        if !self.usable {
            return Err(ClientError::Unusable);
        }
        let payload = request.to_json()?;
        // Rejected before any byte is written; the channel is still in sync.
        let frame = framing::encode_frame(&payload)?;
        debug!(command = request.name(), bytes = payload.len(), "DB <");

        self.usable = false;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<serde_json::Value, ClientError> {
        let payload = framing::read_frame(&mut self.stream).await;
        let payload = self.checked(payload.map_err(ClientError::from))?;
        debug!(bytes = payload.len(), "DB >");
        if payload.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        let value = serde_json::from_str(&payload).map_err(ProtocolError::from);
        self.checked(value.map_err(ClientError::from))
    }

    /// Mark the channel unusable on transport-level failures.
    fn checked<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Protocol(_) | ClientError::Io(_)) = &result {
            self.usable = false;
        }
        result
    }

    fn decode<T: serde::de::DeserializeOwned>(
        &mut self,
        value: serde_json::Value,
    ) -> Result<T, ClientError> {
        protocol::check_error(&value)?;
        let decoded = serde_json::from_value(value).map_err(ProtocolError::from);
        self.checked(decoded.map_err(ClientError::from))
    }

    async fn exchange<T: serde::de::DeserializeOwned>(
        &mut self,
        request: &Request,
    ) -> Result<T, ClientError> {
        self.send(request).await?;
        let value = self.receive().await?;
        self.usable = true;
        self.decode(value)
    }

    /// Read progress frames until `is_terminal` accepts one.
    async fn stream_progress<F, P>(
        &mut self,
        request: &Request,
        mut on_progress: F,
        mut is_terminal: P,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&Progress),
        P: FnMut(&Progress) -> bool,
    {
        self.send(request).await?;
        loop {
            let value = self.receive().await?;
            // An error frame ends the operation
            if let Err(e) = protocol::check_error(&value) {
                self.usable = true;
                return Err(e);
            }
            let progress: Progress = self.decode(value)?;
            on_progress(&progress);
            if is_terminal(&progress) {
                self.usable = true;
                return Ok(());
            }
        }
    }

    async fn close(&mut self) {
        if !self.is_open {
            return;
        }
        self.path = None;
        self.is_open = false;

        // The database counts as closed even when the backend complains.
        if let Err(e) = self.exchange::<serde_json::Value>(&Request::Close).await {
            warn!(error = %e, "Close failed");
        }
    }
}

/// Owner of the backend process and its TCP channel.
///
/// One request is in flight at a time: the mutex is held across the whole
/// send/receive sequence, including every progress frame of a streamed
/// operation.
pub struct DatabaseProxy {
    session: Mutex<Session>,
    support: OnceCell<BTreeMap<String, DatabaseSupportManifest>>,
}

impl DatabaseProxy {
    /// Kill stale backends, spawn a fresh one and connect to it.
    pub async fn launch(config: &ClientConfig) -> Result<Self, ClientError> {
        let killed = kill_processes_named(&config.executable);
        if killed > 0 {
            info!(killed, executable = %config.executable, "Killed colliding backend processes");
        }

        let mut process = Command::new(&config.executable)
            .arg("tcp")
            .arg(config.port.to_string())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| {
                ClientError::Connection(format!("Failed to spawn {}: {e}", config.executable))
            })?;

        info!(executable = %config.executable, port = config.port, "Backend spawned");

        let stream = match connect_with_retries(
            &config.address(),
            config.connect_attempts,
            config.connect_delay,
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                let _ = process.kill().await;
                return Err(e);
            }
        };

        Ok(Self::with_session(stream, Some(process)))
    }

    /// Connect to an already running backend.
    pub async fn connect(address: &str, attempts: u32, delay: Duration) -> Result<Self, ClientError> {
        let stream = connect_with_retries(address, attempts, delay).await?;
        Ok(Self::with_session(stream, None))
    }

    fn with_session(stream: TcpStream, process: Option<Child>) -> Self {
        Self {
            session: Mutex::new(Session {
                stream,
                process,
                usable: true,
                path: None,
                is_open: false,
            }),
            support: OnceCell::new(),
        }
    }

    /// Database type -> manifest. Fetched once and memoized.
    pub async fn support_manifests(
        &self,
    ) -> Result<&BTreeMap<String, DatabaseSupportManifest>, ClientError> {
        self.support
            .get_or_try_init(|| async {
                let mut session = self.session.lock().await;
                let response: SupportResponse = session.exchange(&Request::Support).await?;
                Ok(response.support_manifests)
            })
            .await
    }

    pub async fn supported_database_types(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.support_manifests().await?.keys().cloned().collect())
    }

    /// File extensions importable into `database_type`; None for unknown types.
    pub async fn supported_extensions(
        &self,
        database_type: &str,
    ) -> Result<Option<Vec<String>>, ClientError> {
        Ok(self
            .support_manifests()
            .await?
            .get(database_type)
            .map(|m| m.supported_file_types.clone()))
    }

    pub async fn info(&self) -> Result<DatabaseInfo, ClientError> {
        let mut session = self.session.lock().await;
        if !session.is_open {
            return Ok(DatabaseInfo {
                path: None,
                is_open: false,
                stats: None,
            });
        }
        let stats: DatabaseStats = session.exchange(&Request::Stats).await?;
        Ok(DatabaseInfo {
            path: session.path.clone(),
            is_open: true,
            stats: Some(stats),
        })
    }

    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_open
    }

    /// Open a database, closing the current one first.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref().to_path_buf();
        let mut session = self.session.lock().await;
        session.close().await;

        let request = Request::Open {
            database_path: path.clone(),
        };
        session
            .stream_progress(&request, |_| {}, |p| p.finished)
            .await?;

        info!(path = %path.display(), "Database opened");
        session.path = Some(path);
        session.is_open = true;
        Ok(())
    }

    /// Close the current database. No-op when none is open.
    pub async fn close(&self) {
        self.session.lock().await.close().await;
    }

    pub async fn query(&self, fen: &str, san: Option<&str>) -> Result<QueryResponse, ClientError> {
        let request = Request::Query {
            query: QueryRequest::for_position(fen, san),
        };
        self.session.lock().await.exchange(&request).await
    }

    /// Dump positions of `request.pgns`. Import and dump progress is reported.
    pub async fn dump<F>(&self, request: DumpRequest, mut on_progress: F) -> Result<(), ClientError>
    where
        F: FnMut(&Progress),
    {
        let request = Request::Dump(request);
        let mut session = self.session.lock().await;
        session
            .stream_progress(
                &request,
                |p| {
                    if p.is("import") || p.is("dump") {
                        on_progress(p);
                    }
                },
                |p| p.is("dump") && p.finished,
            )
            .await
    }

    /// Create a database. Import and merge progress is reported.
    pub async fn create<F>(&self, request: CreateRequest, mut on_progress: F) -> Result<(), ClientError>
    where
        F: FnMut(&Progress),
    {
        let request = Request::Create(request);
        let mut session = self.session.lock().await;
        session
            .stream_progress(
                &request,
                |p| {
                    if p.is("import") || p.is("merge") {
                        on_progress(p);
                    }
                },
                |p| p.is("create") && p.finished,
            )
            .await
    }

    /// Ask the backend to exit and wait for the process to terminate.
    pub async fn exit(&self) {
        let mut session = self.session.lock().await;
        if let Err(e) = session.send(&Request::Exit).await {
            debug!(error = %e, "Exit not delivered");
        }
        session.usable = false;
        session.is_open = false;
        if let Some(process) = session.process.as_mut() {
            let _ = process.wait().await;
        }
        info!("Backend exited");
    }
}

impl Drop for DatabaseProxy {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        if let Some(process) = self.session.get_mut().process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

async fn connect_with_retries(
    address: &str,
    attempts: u32,
    delay: Duration,
) -> Result<TcpStream, ClientError> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match TcpStream::connect(address).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                info!(address, attempt, "Connected to backend");
                return Ok(stream);
            }
            Err(e) => {
                debug!(address, attempt, error = %e, "Connect failed");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(ClientError::Connection(match last_error {
        Some(e) => format!("{address}: {e}"),
        None => address.to_string(),
    }))
}

/// Kill every running process whose name matches the executable's file stem.
fn kill_processes_named(executable: &str) -> usize {
    use sysinfo::System;

    let Some(target) = Path::new(executable).file_stem().map(|s| s.to_string_lossy().into_owned())
    else {
        return 0;
    };

    let mut sys = System::new_all();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    let own_pid = sysinfo::get_current_pid().ok();

    sys.processes()
        .values()
        .filter(|p| Some(p.pid()) != own_pid)
        .filter(|p| {
            Path::new(p.name())
                .file_stem()
                .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case(&target))
                .unwrap_or(false)
        })
        .filter(|p| p.kill())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_retries_exhausted() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect_with_retries(&address, 2, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
    }

    #[test]
    fn test_kill_unknown_process_name() {
        assert_eq!(kill_processes_named("posdb-no-such-process-name"), 0);
    }
}
