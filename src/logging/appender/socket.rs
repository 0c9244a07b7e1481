use super::Appender;
use crate::common::CmResult;
use crate::logging::pattern::{FormatInput, Pattern};
use std::io::Write;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Owns a listening server socket and a background accept thread;
/// `append` fans the rendered record out to every connected client,
/// dropping any that fail to receive it (spec §4.6.4 kind 4).
pub struct SocketAppender {
    name: String,
    local_addr: std::net::SocketAddr,
    pattern: Pattern,
    clients: Arc<Mutex<Vec<TcpStream>>>,
    running: Arc<AtomicBool>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl SocketAppender {
    pub fn new(name: impl Into<String>, listen_host: &str, listen_port: u16) -> CmResult<Arc<Self>> {
        Self::with_pattern(
            name,
            listen_host,
            listen_port,
            Pattern::compile(crate::logging::pattern::DEFAULT_PATTERN).expect("default pattern always compiles"),
        )
    }

    pub fn with_pattern(
        name: impl Into<String>,
        listen_host: &str,
        listen_port: u16,
        pattern: Pattern,
    ) -> CmResult<Arc<Self>> {
        let name = name.into();
        let listener = TcpListener::bind((listen_host, listen_port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let clients: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let accept_thread = {
            let clients = Arc::clone(&clients);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name(format!("{name}-accept"))
                .spawn(move || accept_loop(listener, clients, running))
                .expect("failed to spawn socket appender accept thread")
        };

        Ok(Arc::new(Self {
            name,
            local_addr,
            pattern,
            clients,
            running,
            accept_thread: Mutex::new(Some(accept_thread)),
        }))
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

fn accept_loop(listener: TcpListener, clients: Arc<Mutex<Vec<TcpStream>>>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let _ = stream.set_nonblocking(true);
                clients.lock().unwrap_or_else(|e| e.into_inner()).push(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(_) => std::thread::sleep(Duration::from_millis(100)),
        }
    }
}

impl Appender for SocketAppender {
    fn append(&self, input: &FormatInput<'_>) -> CmResult<()> {
        let rendered = self.pattern.render(input);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.retain_mut(|client| client.write_all(rendered.as_bytes()).is_ok());
        Ok(())
    }

    fn flush(&self) -> CmResult<()> {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        for client in clients.iter_mut() {
            let _ = client.flush();
        }
        Ok(())
    }

    fn set_async(&self, _buffer_size: usize) {
        // The socket sink is already a fan-out write with per-client
        // failure isolation; a slow client blocks on the underlying
        // socket either way, so async double-buffering adds nothing here.
    }

    fn destroy(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::level::Level;
    use std::io::Read;
    use std::net::TcpStream as ClientStream;

    #[test]
    fn connected_client_receives_appended_records() {
        let appender = SocketAppender::with_pattern(
            "socket",
            "127.0.0.1",
            0,
            Pattern::compile("%m%n").unwrap(),
        )
        .unwrap();
        let mut client = ClientStream::connect(appender.local_addr()).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let input = FormatInput { logger_name: "x", level: Level::Info, file: "f.rs", line: 1, message: "hello", stack: None };
        appender.append(&input).unwrap();

        let mut buf = [0u8; 64];
        client.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        let n = client.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello\n");

        appender.destroy();
    }
}
