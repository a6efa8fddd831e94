/* Any copyright is dedicated to the Public Domain.
 * https://creativecommons.org/publicdomain/zero/1.0/ */
use std::{
    io::{BufReader, Read, Write},
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::{mpsc, Mutex},
    thread,
    time::Duration,
};

use bytes::BytesMut;
use clap::{App, Arg};

use safra::{Codec, PostcardCodec, Ring, Terminator, Token, TokenMessenger};

#[derive(Debug)]
struct CliParams {
    ring: Ring,
    host: IpAddr,
    base_port: u16,
    work: Duration,
}

impl CliParams {
    fn new() -> Self {
        let matches = App::new("tcp_ring")
            .arg(
                Arg::with_name("ID")
                    .help("Position of this process in the ring. 0 is the master")
                    .required(true)
                    .index(1),
            )
            .arg(
                Arg::with_name("SIZE")
                    .help("How many processes form the ring")
                    .required(true)
                    .index(2),
            )
            .arg(
                Arg::with_name("host")
                    .help("Address every process binds to. Defaults to 127.0.0.1")
                    .takes_value(true)
                    .long("host"),
            )
            .arg(
                Arg::with_name("base-port")
                    .help("Process ID listens on base-port + ID. Defaults to 7000")
                    .takes_value(true)
                    .short("p")
                    .long("base-port"),
            )
            .arg(
                Arg::with_name("work-ms")
                    .help("Pretend to work this long before going idle")
                    .takes_value(true)
                    .short("w")
                    .long("work-ms"),
            )
            .get_matches();

        let id = matches
            .value_of("ID")
            .and_then(|id| id.parse().ok())
            .expect("ID must be a non-negative integer");
        let size = matches
            .value_of("SIZE")
            .and_then(|size| size.parse().ok())
            .expect("SIZE must be a positive integer");
        let ring = Ring::new(id, size).expect("ID must be smaller than SIZE");

        let host = matches
            .value_of("host")
            .map(|host| host.parse().expect("Invalid host address"))
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));

        let base_port = matches
            .value_of("base-port")
            .map(|port| port.parse().expect("Invalid base port"))
            .unwrap_or(7000);

        let work = Duration::from_millis(
            matches
                .value_of("work-ms")
                .map(|ms| ms.parse().expect("Invalid work duration"))
                .unwrap_or(0),
        );

        Self {
            ring,
            host,
            base_port,
            work,
        }
    }

    fn addr_of(&self, id: usize) -> SocketAddr {
        SocketAddr::new(self.host, self.base_port + id as u16)
    }
}

// Tokens are framed with a single length byte: postcard never needs
// more than a handful of bytes for them
struct TcpMessenger {
    ring: Ring,
    outgoing: mpsc::Sender<Token>,
    writer: thread::JoinHandle<()>,
    incoming: Mutex<BufReader<TcpStream>>,
}

impl TcpMessenger {
    fn connect(params: &CliParams) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(params.addr_of(params.ring.id()))?;

        // The successor may not be up yet
        let successor = params.addr_of(params.ring.successor());
        let mut next = loop {
            match TcpStream::connect(successor) {
                Ok(stream) => break stream,
                Err(err) => {
                    tracing::debug!(%successor, %err, "Successor not ready, retrying");
                    thread::sleep(Duration::from_millis(200));
                }
            }
        };
        next.set_nodelay(true)?;

        let (previous, from) = listener.accept()?;
        tracing::info!(%successor, predecessor = %from, "Ring connected");

        // A dedicated writer thread makes sending non-blocking
        let (outgoing, rx) = mpsc::channel::<Token>();
        let writer = thread::spawn(move || {
            let mut codec = PostcardCodec;
            let mut buf = BytesMut::with_capacity(64);
            while let Ok(token) = rx.recv() {
                buf.clear();
                buf.extend_from_slice(&[0]);
                if let Err(err) = codec.encode_token(&token, &mut buf) {
                    tracing::error!(%err, %token, "Failed to encode token");
                    break;
                }
                buf[0] = (buf.len() - 1) as u8;
                if let Err(err) = next.write_all(&buf) {
                    tracing::error!(%err, %token, "Failed to send token");
                    break;
                }
            }
        });

        Ok(Self {
            ring: params.ring,
            outgoing,
            writer,
            incoming: Mutex::new(BufReader::new(previous)),
        })
    }
}

impl TcpMessenger {
    // Closing the channel stops the writer once everything queued
    // has been written
    fn shutdown(self) -> Result<(), anyhow::Error> {
        let Self {
            outgoing, writer, ..
        } = self;
        drop(outgoing);
        writer
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))
    }
}

impl TokenMessenger for TcpMessenger {
    type Error = anyhow::Error;

    fn send_to_next_async(&self, token: Token) -> Result<(), Self::Error> {
        self.outgoing
            .send(token)
            .map_err(|_| anyhow::anyhow!("writer thread is gone"))
    }

    fn receive_from_previous(&self) -> Result<Token, Self::Error> {
        let mut incoming = self.incoming.lock().expect("lock poisoned");

        let mut len = [0u8; 1];
        incoming.read_exact(&mut len)?;
        let mut frame = vec![0u8; usize::from(len[0])];
        incoming.read_exact(&mut frame)?;

        PostcardCodec
            .decode_token(&frame[..])
            .map_err(anyhow::Error::msg)
    }

    fn is_master(&self) -> bool {
        self.ring.is_master()
    }
}

fn main() -> Result<(), anyhow::Error> {
    // When RUST_LOG is unset, default to Level::INFO
    if std::env::var("RUST_LOG").is_err() {
        tracing_subscriber::fmt().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let params = CliParams::new();
    tracing::info!(?params, "Started");

    let messenger = TcpMessenger::connect(&params)?;
    let terminator = Terminator::create_new(messenger);

    thread::scope(|scope| -> Result<(), anyhow::Error> {
        let waiting = scope.spawn(|| terminator.wait_for_termination());

        thread::sleep(params.work);
        terminator.set_done()?;
        tracing::info!(id = params.ring.id(), "Idle");

        waiting.join().expect("termination loop panicked")?;
        Ok(())
    })?;

    tracing::info!(id = params.ring.id(), "Termination detected");

    // The terminal token may still be queued for the successor
    terminator.into_messenger().shutdown()
}
