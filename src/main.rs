//! bytering-driver - Throughput Driver
//!
//! Writer thread menulis chunk tetap, reader thread membaca dan memverifikasi
//! isinya, thread monitor mencetak throughput setiap interval.
//!
//! Usage:
//!   cargo run --release -- --variant mpmc -w 2 -r 4 --blocking
//!   RUST_LOG=info cargo run --release -- --variant spsc --iterations 10000000

use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytering::{MpmcRingBuffer, SpscRingBuffer, TransferCounters};
use clap::{Parser, ValueEnum};
use log::{error, info};

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    Spsc,
    Mpmc,
}

/// Driver configuration
#[derive(Debug, Parser)]
#[command(name = "bytering-driver", about = "Throughput driver for the bytering ring buffers")]
struct DriverConfig {
    /// Ring buffer variant
    #[arg(long, value_enum, default_value_t = Variant::Mpmc)]
    variant: Variant,

    /// Number of writer threads
    #[arg(short, long, default_value_t = 1)]
    writers: usize,

    /// Number of reader threads (default: available cores minus writers)
    #[arg(short, long)]
    readers: Option<usize>,

    /// Ring capacity in bytes, power of 2
    #[arg(long, default_value_t = 8192)]
    capacity: u64,

    /// Bytes per write/read
    #[arg(long, default_value_t = 1000)]
    chunk: usize,

    /// Suspend on full/empty instead of spinning
    #[arg(long)]
    blocking: bool,

    /// Chunks written by each writer
    #[arg(long, default_value_t = 1_000_000)]
    iterations: u64,

    /// Report interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

impl DriverConfig {
    fn readers(&self) -> usize {
        match self.readers {
            Some(r) => r,
            None => {
                let cores = thread::available_parallelism().map_or(2, |n| n.get());
                cores.saturating_sub(self.writers).max(1)
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.writers == 0 || self.readers() == 0 {
            return Err("need at least one writer and one reader".to_string());
        }
        if self.variant == Variant::Spsc && (self.writers != 1 || self.readers() != 1) {
            return Err(format!(
                "spsc needs exactly one writer and one reader, got w = {}, r = {}",
                self.writers,
                self.readers()
            ));
        }
        if self.chunk == 0 || self.chunk as u64 > self.capacity {
            return Err(format!(
                "chunk {} must be in 1..={} (capacity)",
                self.chunk, self.capacity
            ));
        }
        if self.interval_ms == 0 {
            return Err("interval must be positive".to_string());
        }
        Ok(())
    }

    fn total_chunks(&self) -> u64 {
        self.writers as u64 * self.iterations
    }
}

/// State yang dibagi antar reader
struct Progress {
    tickets: AtomicU64,
    mismatches: AtomicU64,
    done: AtomicBool,
}

impl Progress {
    fn new() -> Self {
        Self {
            tickets: AtomicU64::new(0),
            mismatches: AtomicU64::new(0),
            done: AtomicBool::new(false),
        }
    }

    /// Klaim satu chunk; false jika semua chunk sudah diklaim
    fn claim(&self, total: u64) -> bool {
        self.tickets.fetch_add(1, Ordering::Relaxed) < total
    }

    fn check(&self, chunk: &[u8], payload: &[u8]) {
        if chunk != payload {
            self.mismatches.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn make_payload(len: usize) -> Vec<u8> {
    BASE64_CHARS.iter().copied().cycle().take(len).collect()
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut unit = 0;
    let mut converted = bytes as f64;
    while converted >= 1024.0 && unit < UNITS.len() - 1 {
        converted /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", converted, UNITS[unit])
}

fn per_second(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}

/// Sample counter tiap `interval` sampai `done`
fn report(counters: &impl TransferCounters, interval: Duration, done: &AtomicBool) {
    let started = Instant::now();
    let mut last = Instant::now();
    let mut last_written = 0;
    let mut last_read = 0;

    while !done.load(Ordering::Acquire) {
        thread::park_timeout(interval);

        let written = counters.total_written();
        let read = counters.total_read();
        let now = Instant::now();
        let window = now - last;

        info!(
            "cur write:{}/S, read:{}/S, avg write:{}/S, read:{}/S, total write:{}, total read:{}",
            format_bytes(per_second(written - last_written, window)),
            format_bytes(per_second(read - last_read, window)),
            format_bytes(per_second(written, started.elapsed())),
            format_bytes(per_second(read, started.elapsed())),
            format_bytes(written),
            format_bytes(read),
        );

        last = now;
        last_written = written;
        last_read = read;
    }
}

fn run_spsc(config: &DriverConfig, payload: &[u8], progress: &Progress) -> Result<(), Box<dyn Error>> {
    let (mut writer, mut reader) = SpscRingBuffer::new(config.capacity, config.blocking)?.split();
    let monitor = writer.monitor();
    let interval = Duration::from_millis(config.interval_ms);
    let total = config.total_chunks();

    thread::scope(|s| {
        let reporter = s.spawn(|| report(&monitor, interval, &progress.done));

        let consumer = s.spawn(move || {
            let mut buf = vec![0u8; payload.len()];
            while progress.claim(total) {
                reader.read(&mut buf);
                progress.check(&buf, payload);
            }
        });
        let producer = s.spawn(move || {
            for _ in 0..config.iterations {
                writer.write(payload);
            }
        });

        let joined = producer.join().and(consumer.join());
        progress.done.store(true, Ordering::Release);
        reporter.thread().unpark();
        joined.map_err(|_| Box::<dyn Error>::from("worker thread panicked"))
    })
}

fn run_mpmc(config: &DriverConfig, payload: &[u8], progress: &Progress) -> Result<(), Box<dyn Error>> {
    let rb = MpmcRingBuffer::new(config.capacity, config.blocking)?;
    let interval = Duration::from_millis(config.interval_ms);
    let total = config.total_chunks();
    let rb = &rb;

    thread::scope(|s| {
        let reporter = s.spawn(|| report(rb, interval, &progress.done));

        let mut workers = Vec::with_capacity(config.writers + config.readers());
        for _ in 0..config.readers() {
            workers.push(s.spawn(move || {
                let mut buf = vec![0u8; payload.len()];
                while progress.claim(total) {
                    rb.read(&mut buf);
                    progress.check(&buf, payload);
                }
            }));
        }
        for _ in 0..config.writers {
            workers.push(s.spawn(move || {
                for _ in 0..config.iterations {
                    rb.write(payload);
                }
            }));
        }

        let mut panicked = false;
        for worker in workers {
            panicked |= worker.join().is_err();
        }
        progress.done.store(true, Ordering::Release);
        reporter.thread().unpark();

        if panicked {
            Err(Box::<dyn Error>::from("worker thread panicked"))
        } else {
            Ok(())
        }
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = DriverConfig::parse();
    config.validate()?;

    info!(
        "set variant = {:?}, w = {}, r = {}, capacity = {}, chunk = {}, blocking = {}",
        config.variant,
        config.writers,
        config.readers(),
        config.capacity,
        config.chunk,
        config.blocking
    );

    let payload = make_payload(config.chunk);
    let progress = Progress::new();
    let started = Instant::now();

    match config.variant {
        Variant::Spsc => run_spsc(&config, &payload, &progress)?,
        Variant::Mpmc => run_mpmc(&config, &payload, &progress)?,
    }

    let elapsed = started.elapsed();
    let bytes = config.total_chunks() * config.chunk as u64;
    info!(
        "done: {} in {:.2?} ({}/S)",
        format_bytes(bytes),
        elapsed,
        format_bytes(per_second(bytes, elapsed))
    );

    let mismatches = progress.mismatches.load(Ordering::Relaxed);
    if mismatches > 0 {
        error!("{} chunks did not match the payload", mismatches);
        return Err(format!("{} corrupted chunks", mismatches).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> DriverConfig {
        DriverConfig::parse_from(std::iter::once("bytering-driver").chain(args.iter().copied()))
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(8 * 1024 * 1024), "8.00 MB");
        assert_eq!(format_bytes(u64::MAX), "16777216.00 TB");
    }

    #[test]
    fn test_payload_cycles_base64() {
        let payload = make_payload(66);
        assert_eq!(&payload[..3], b"ABC");
        assert_eq!(payload[63], b'/');
        assert_eq!(&payload[64..], b"AB");
    }

    #[test]
    fn test_validate_rejects_bad_spsc() {
        assert!(config(&["--variant", "spsc", "-w", "1", "-r", "1"]).validate().is_ok());
        assert!(config(&["--variant", "spsc", "-w", "2", "-r", "1"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        assert!(config(&["-r", "1", "--capacity", "1024", "--chunk", "2048"]).validate().is_err());
        assert!(config(&["-r", "1", "--chunk", "0"]).validate().is_err());
    }

    #[test]
    fn test_small_runs_complete() {
        for args in [
            ["--variant", "spsc", "-w", "1", "-r", "1"],
            ["--variant", "mpmc", "-w", "3", "-r", "2"],
        ] {
            for blocking in [false, true] {
                let mut cfg = config(&args);
                cfg.iterations = 2000;
                cfg.capacity = 4096;
                cfg.chunk = 100;
                cfg.interval_ms = 10;
                cfg.blocking = blocking;
                cfg.validate().unwrap();

                let payload = make_payload(cfg.chunk);
                let progress = Progress::new();
                match cfg.variant {
                    Variant::Spsc => run_spsc(&cfg, &payload, &progress).unwrap(),
                    Variant::Mpmc => run_mpmc(&cfg, &payload, &progress).unwrap(),
                }
                assert_eq!(progress.mismatches.load(Ordering::Relaxed), 0);
            }
        }
    }
}
