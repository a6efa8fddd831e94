/* Any copyright is dedicated to the Public Domain.
 * https://creativecommons.org/publicdomain/zero/1.0/ */
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Mutex,
    },
    thread,
    time::Duration,
};

use clap::{App, Arg};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use safra::Terminator;

#[derive(Debug)]
struct CliParams {
    processes: usize,
    messages: usize,
    seed: u64,
}

impl CliParams {
    fn new() -> Self {
        let matches = App::new("ring_simulation")
            .arg(
                Arg::with_name("processes")
                    .help("How many processes form the ring")
                    .takes_value(true)
                    .short("p")
                    .long("processes"),
            )
            .arg(
                Arg::with_name("messages")
                    .help("Upper bound of messages each process starts out sending")
                    .takes_value(true)
                    .short("m")
                    .long("messages"),
            )
            .arg(
                Arg::with_name("seed")
                    .help("Seed for the random workload. Random by default")
                    .takes_value(true)
                    .short("s")
                    .long("seed"),
            )
            .get_matches();

        let processes = matches
            .value_of("processes")
            .map(|p| p.parse().expect("processes must be a positive integer"))
            .unwrap_or(5);

        let messages = matches
            .value_of("messages")
            .map(|m| m.parse().expect("messages must be a positive integer"))
            .unwrap_or(100);

        let seed = matches
            .value_of("seed")
            .map(|s| s.parse().expect("seed must be an unsigned integer"))
            .unwrap_or_else(rand::random);

        Self {
            processes,
            messages,
            seed,
        }
    }
}

// The application message: a number that shrinks every time it's
// bounced around, so the computation always ends
type Payload = u32;

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

    let CliParams {
        processes,
        messages,
        seed,
    } = params;

    let messengers = safra::memory::ring(processes)?;
    let terminators: Vec<_> = messengers.iter().map(Terminator::create_new).collect();

    let (inboxes, outlets): (Vec<_>, Vec<_>) = (0..processes)
        .map(|_| mpsc::channel::<Option<Payload>>())
        .unzip();
    let outlets: Vec<_> = outlets.into_iter().map(Mutex::new).collect();

    // Every process has a writer (which also waits for termination)
    // and a reader. The reader may only flag the process as idle
    // once the writer is done, so both share this guard
    let writer_done: Vec<_> = (0..processes).map(|_| Mutex::new(false)).collect();

    let total_sent = AtomicUsize::new(0);
    let total_received = AtomicUsize::new(0);

    let send = |from: usize, to: usize, payload: Payload| -> Result<(), anyhow::Error> {
        terminators[from].message_sent()?;
        total_sent.fetch_add(1, Ordering::Relaxed);
        inboxes[to]
            .send(Some(payload))
            .map_err(|_| anyhow::anyhow!("process {} is gone", to))
    };

    thread::scope(|scope| -> Result<(), anyhow::Error> {
        let mut handles = Vec::with_capacity(processes * 2);

        for id in 0..processes {
            let send = &send;
            let terminator = &terminators[id];
            let inbox = &inboxes[id];
            let outlet = &outlets[id];
            let writer_done = &writer_done[id];
            let total_received = &total_received;

            handles.push(scope.spawn(move || -> Result<(), anyhow::Error> {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(id as u64));
                let amount = rng.random_range(0..=messages);
                for _ in 0..amount {
                    send(id, rng.random_range(0..processes), rng.random_range(0..200))?;
                    if rng.random_bool(0.05) {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
                tracing::debug!(id, amount, "Writer done");

                {
                    let mut done = writer_done.lock().expect("lock poisoned");
                    if terminator.is_working() {
                        terminator.set_done()?;
                    }
                    *done = true;
                }

                terminator.wait_for_termination()?;
                tracing::info!(id, "Termination detected");

                // Poison pill for our own reader
                let _ignored = inbox.send(None);
                Ok(())
            }));

            handles.push(scope.spawn(move || -> Result<(), anyhow::Error> {
                let mut rng = SmallRng::seed_from_u64(seed.rotate_left(32).wrapping_add(id as u64));
                let outlet = outlet.lock().expect("lock poisoned");

                while let Ok(Some(payload)) = outlet.recv() {
                    let done = writer_done.lock().expect("lock poisoned");
                    terminator.message_received()?;
                    total_received.fetch_add(1, Ordering::Relaxed);

                    if rng.random_bool(0.5 * f64::from(payload) / 200.0) {
                        send(id, rng.random_range(0..processes), payload * 2 / 3)?;
                    }

                    if *done && terminator.is_working() {
                        terminator.set_done()?;
                    }
                }

                Ok(())
            }));
        }

        handles
            .into_iter()
            .try_for_each(|handle| handle.join().expect("worker panicked"))
    })?;

    let sent = total_sent.load(Ordering::Relaxed);
    let received = total_received.load(Ordering::Relaxed);
    tracing::info!(sent, received, "Finished");
    anyhow::ensure!(sent == received, "terminated with messages in flight");

    Ok(())
}
