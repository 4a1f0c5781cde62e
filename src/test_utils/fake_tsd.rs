//! Minimal loopback TSD speaking the telnet-style line protocol.

use std::{
    io::{BufRead, BufReader, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::socket_client::Endpoint;

/// Reply sent for every `version` request.
pub const VERSION_REPLY: &str = "net.opentsdb.tools.BuildData built at revision 0000000 (MODIFIED)\n";

/// How the server answers the `version` probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeBehaviour {
    /// Reply with a version banner.
    Answer,
    /// Drop the connection without replying.
    Hangup,
}

#[derive(Default)]
struct Shared {
    puts: Mutex<Vec<String>>,
    streams: Mutex<Vec<TcpStream>>,
    connections: AtomicUsize,
    probes: AtomicUsize,
    stopping: AtomicBool,
}

/// Loopback server recording every `put` line it receives.
///
/// Dropping the server stops accepting and closes every open connection.
pub struct FakeTsd {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeTsd {
    /// Start a server that answers probes.
    pub fn start() -> Self {
        Self::start_with(ProbeBehaviour::Answer)
    }

    pub fn start_with(behaviour: ProbeBehaviour) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let shared = Arc::new(Shared::default());
        let server = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                if server.stopping.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                server.connections.fetch_add(1, Ordering::SeqCst);
                if let Ok(handle) = stream.try_clone() {
                    server.streams.lock().push(handle);
                }
                let conn_state = Arc::clone(&server);
                thread::spawn(move || serve(stream, behaviour, &conn_state));
            }
        });
        Self { addr, shared }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    /// `put` lines received so far, without the trailing newline.
    pub fn puts(&self) -> Vec<String> {
        self.shared.puts.lock().clone()
    }

    /// Wait until at least `count` lines arrived or `timeout` passed.
    pub fn wait_for_puts(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let puts = self.puts();
            if puts.len() >= count || Instant::now() >= deadline {
                return puts;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Accepted connections so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// `version` requests seen so far.
    pub fn probes(&self) -> usize {
        self.shared.probes.load(Ordering::SeqCst)
    }
}

impl Drop for FakeTsd {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        // Wake the accept loop so it observes the flag.
        let _ = TcpStream::connect_timeout(&self.addr, Duration::from_millis(100));
        for stream in self.shared.streams.lock().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn serve(stream: TcpStream, behaviour: ProbeBehaviour, shared: &Shared) {
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { return };
        if line == "version" {
            shared.probes.fetch_add(1, Ordering::SeqCst);
            match behaviour {
                ProbeBehaviour::Answer => {
                    if writer.write_all(VERSION_REPLY.as_bytes()).is_err() {
                        return;
                    }
                }
                ProbeBehaviour::Hangup => return,
            }
        } else if line.starts_with("put ") {
            shared.puts.lock().push(line);
        }
    }
}

/// An endpoint on loopback with nothing listening behind it.
pub fn closed_endpoint() -> Endpoint {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    let port = listener.local_addr().expect("listener has address").port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}
