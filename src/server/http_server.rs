//! Standalone HTTP(S) host adapter.

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::service::AppService;
use super::tls;

/// Hosting seam shared by the standalone server and the FastCGI
/// responder.
pub trait Host {
    /// Start serving. With `background` the accept loop runs on its
    /// own and the call returns immediately; otherwise it blocks until
    /// the server stops.
    fn run(&mut self, background: bool) -> Result<()>;

    /// Stop serving.
    fn close(&mut self) -> Result<()>;
}

/// Wrapper around may_minihttp's HTTP server.
pub struct HttpServer<T>(pub T);

/// Handle to a running accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    pub(crate) fn new(addr: SocketAddr, handle: JoinHandle<()>) -> Self {
        Self { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block briefly until the listener accepts connections.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel the accept loop. In-flight handlers run to completion on
    /// their own coroutines.
    pub fn stop(self) {
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Start the HTTP server on the given address.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = MiniHttpServer(self.0).start(addr)?;
        Ok(ServerHandle::new(addr, handle))
    }
}

/// Standalone host: plain HTTP, or HTTPS when both a certificate and a
/// key are configured.
pub struct StandaloneServer {
    pub addr: String,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    service: AppService,
    handle: Option<ServerHandle>,
}

impl StandaloneServer {
    pub fn new(addr: impl Into<String>, service: AppService) -> Self {
        Self {
            addr: addr.into(),
            cert_file: None,
            key_file: None,
            service,
            handle: None,
        }
    }

    pub fn with_tls(mut self, cert_file: PathBuf, key_file: PathBuf) -> Self {
        self.cert_file = Some(cert_file);
        self.key_file = Some(key_file);
        self
    }

    fn start(&self) -> Result<ServerHandle> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => {
                info!(addr = %self.addr, "starting HTTPS server");
                tls::start(self.service.clone(), &self.addr, cert, key)
            }
            _ => {
                info!(addr = %self.addr, "starting HTTP server");
                HttpServer(self.service.clone())
                    .start(self.addr.as_str())
                    .with_context(|| format!("failed to bind {}", self.addr))
            }
        }
    }
}

impl Host for StandaloneServer {
    fn run(&mut self, background: bool) -> Result<()> {
        let handle = self.start()?;
        if background {
            self.handle = Some(handle);
            Ok(())
        } else {
            handle
                .join()
                .map_err(|e| anyhow::anyhow!("server terminated abnormally: {e:?}"))
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        Ok(())
    }
}
