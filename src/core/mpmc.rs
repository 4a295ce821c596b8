//! Multi-Producer Multi-Consumer (MPMC) byte ring buffer
//!
//! Setiap arah punya dua cursor:
//! - `reserved`: diklaim lewat CAS sebelum copy, memberi range eksklusif
//! - `completed`: maju setelah copy selesai, baru terlihat oleh sisi lawan
//!
//! Writer dibatasi oleh `reads.completed`, reader dibatasi oleh
//! `writes.completed`. Copy dari banyak thread bisa overlap dalam waktu,
//! tapi `completed` hanya maju ke total yang kontigu.
//!
//! Progress: lock-free (sistem selalu maju), bukan wait-free.

use crossbeam_utils::Backoff;
use std::sync::atomic::{AtomicU64, Ordering};

use super::cursor::{check_len, fits_read, fits_write, CacheLinePadded};
use super::storage::Storage;
use super::wait::Signal;
use super::TransferCounters;
use crate::error::Result;

/// Cursor pair + signal untuk satu arah
#[derive(Default)]
struct Direction {
    reserved: AtomicU64,
    completed: AtomicU64,
    // Dinotifikasi setiap kali `completed` maju
    signal: Signal,
}

impl Direction {
    /// Publikasikan `[start, start + len)`.
    ///
    /// CAS hanya berhasil saat semua range sebelumnya sudah selesai, jadi
    /// `completed` tidak pernah melompati byte yang belum di-copy.
    #[inline(always)]
    fn complete(&self, start: u64, len: u64) {
        let backoff = Backoff::new();
        while self
            .completed
            .compare_exchange_weak(start, start + len, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
    }
}

/// MPMC byte ring buffer, dipakai bersama lewat `Arc`.
///
/// # Examples
/// ```
/// use bytering::MpmcRingBuffer;
/// use std::sync::Arc;
/// use std::thread;
///
/// let rb = Arc::new(MpmcRingBuffer::new(1024, true).unwrap());
/// let writers: Vec<_> = (0..4u8)
///     .map(|id| {
///         let rb = rb.clone();
///         thread::spawn(move || rb.write(&[id; 16]))
///     })
///     .collect();
///
/// let mut seen = Vec::new();
/// for _ in 0..4 {
///     let mut record = [0u8; 16];
///     rb.read(&mut record);
///     assert!(record.iter().all(|&b| b == record[0]));
///     seen.push(record[0]);
/// }
/// for w in writers {
///     w.join().unwrap();
/// }
/// seen.sort();
/// assert_eq!(seen, vec![0, 1, 2, 3]);
/// ```
pub struct MpmcRingBuffer {
    // Producer side - cache line aligned
    writes: CacheLinePadded<Direction>,
    // Consumer side - cache line aligned
    reads: CacheLinePadded<Direction>,
    storage: Storage,
    blocking: bool,
}

impl MpmcRingBuffer {
    /// Membuat ring buffer baru. `capacity` HARUS power of 2.
    pub fn new(capacity: u64, blocking: bool) -> Result<Self> {
        let storage = Storage::new(capacity)?;
        log::debug!(
            "mpmc ring allocated: capacity={} blocking={}",
            capacity,
            blocking
        );

        Ok(Self {
            writes: CacheLinePadded::default(),
            reads: CacheLinePadded::default(),
            storage,
            blocking,
        })
    }

    /// Tulis seluruh `data` sebagai satu range kontigu.
    ///
    /// Aman dipanggil dari banyak thread sekaligus.
    ///
    /// # Aborts
    /// Proses di-abort jika `data.len() > capacity`: request seperti itu
    /// tidak akan pernah muat.
    pub fn write(&self, data: &[u8]) {
        let len = data.len() as u64;
        let capacity = self.storage.capacity();
        check_len("write", len, capacity);
        if len == 0 {
            return;
        }

        let backoff = Backoff::new();
        let start = loop {
            if self.blocking {
                // Pre-check kasar, bukan keputusan final
                self.reads.signal.wait_until(|| {
                    fits_write(
                        self.writes.reserved.load(Ordering::Relaxed),
                        len,
                        self.reads.completed.load(Ordering::Acquire),
                        capacity,
                    )
                });
            }

            let start = self.writes.reserved.load(Ordering::Relaxed);
            let read = self.reads.completed.load(Ordering::Acquire);
            if !fits_write(start, len, read, capacity) {
                backoff.spin();
                continue;
            }

            match self.writes.reserved.compare_exchange_weak(
                start,
                start + len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break start,
                Err(_) => backoff.spin(), // Retry on contention
            }
        };

        // SAFETY: CAS di atas memberi range [start, start + len) eksklusif ke
        // thread ini, dan reader sudah selesai dengan range tersebut
        unsafe { self.storage.copy_in(start, data) };

        self.writes.complete(start, len);

        if self.blocking {
            self.writes.signal.notify_all();
        }
    }

    /// Isi seluruh `buf` dengan range kontigu berikutnya.
    ///
    /// Aman dipanggil dari banyak thread sekaligus.
    ///
    /// # Aborts
    /// Proses di-abort jika `buf.len() > capacity`.
    pub fn read(&self, buf: &mut [u8]) {
        let len = buf.len() as u64;
        check_len("read", len, self.storage.capacity());
        if len == 0 {
            return;
        }

        let backoff = Backoff::new();
        let start = loop {
            if self.blocking {
                self.writes.signal.wait_until(|| {
                    fits_read(
                        self.reads.reserved.load(Ordering::Relaxed),
                        len,
                        self.writes.completed.load(Ordering::Acquire),
                    )
                });
            }

            let start = self.reads.reserved.load(Ordering::Relaxed);
            let written = self.writes.completed.load(Ordering::Acquire);
            if !fits_read(start, len, written) {
                backoff.spin();
                continue;
            }

            match self.reads.reserved.compare_exchange_weak(
                start,
                start + len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break start,
                Err(_) => backoff.spin(),
            }
        };

        // SAFETY: range sudah selesai ditulis (writes.completed) dan diklaim
        // eksklusif oleh reader ini; writer tidak menimpanya sebelum
        // reads.completed melewatinya
        unsafe { self.storage.copy_out(start, buf) };

        self.reads.complete(start, len);

        if self.blocking {
            self.reads.signal.notify_all();
        }
    }

    pub fn capacity(&self) -> u64 {
        self.storage.capacity()
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Perkiraan byte yang belum dibaca
    pub fn len(&self) -> u64 {
        self.in_flight()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransferCounters for MpmcRingBuffer {
    /// Total byte yang selesai ditulis
    fn total_written(&self) -> u64 {
        self.writes.completed.load(Ordering::Acquire)
    }

    /// Total byte yang selesai dibaca
    fn total_read(&self) -> u64 {
        self.reads.completed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cursor::assert_aborts;
    use crate::error::Error;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_thread() {
        let rb = MpmcRingBuffer::new(8, false).unwrap();
        rb.write(b"AB");
        rb.write(b"CDEF");

        let mut out = [0u8; 6];
        rb.read(&mut out);
        assert_eq!(&out, b"ABCDEF");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let rb = MpmcRingBuffer::new(8, true).unwrap();

        rb.write(b"ABCDEF");
        let mut head = [0u8; 4];
        rb.read(&mut head);
        assert_eq!(&head, b"ABCD");

        rb.write(b"GHIJKL");
        assert_eq!(rb.len(), 8);

        let mut rest = [0u8; 8];
        rb.read(&mut rest);
        assert_eq!(&rest, b"EFGHIJKL");
    }

    #[test]
    fn test_reservation_tracks_completion_when_idle() {
        let rb = MpmcRingBuffer::new(16, false).unwrap();
        rb.write(&[1u8; 10]);
        let mut buf = [0u8; 4];
        rb.read(&mut buf);

        assert_eq!(rb.writes.reserved.load(Ordering::Relaxed), 10);
        assert_eq!(rb.writes.completed.load(Ordering::Relaxed), 10);
        assert_eq!(rb.reads.reserved.load(Ordering::Relaxed), 4);
        assert_eq!(rb.reads.completed.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_zero_len_is_noop() {
        let rb = MpmcRingBuffer::new(8, true).unwrap();
        rb.write(&[]);
        rb.read(&mut []);
        assert_eq!(rb.total_written(), 0);
        assert_eq!(rb.total_read(), 0);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(matches!(
            MpmcRingBuffer::new(3, false),
            Err(Error::InvalidCapacity(3))
        ));
    }

    #[test]
    fn test_is_blocking() {
        assert!(MpmcRingBuffer::new(8, true).unwrap().is_blocking());
        assert!(!MpmcRingBuffer::new(8, false).unwrap().is_blocking());
    }

    #[test]
    fn test_oversized_write_aborts() {
        assert_aborts("core::mpmc::tests::test_oversized_write_aborts", || {
            let rb = MpmcRingBuffer::new(4096, false).unwrap();
            rb.write(&vec![0u8; 4097]);
        });
    }

    #[test]
    fn test_oversized_read_aborts() {
        assert_aborts("core::mpmc::tests::test_oversized_read_aborts", || {
            let rb = MpmcRingBuffer::new(8, true).unwrap();
            let mut buf = [0u8; 9];
            rb.read(&mut buf);
        });
    }

    #[test]
    fn test_concurrent_writers_keep_records_whole() {
        const WRITERS: u8 = 4;
        const RECORDS: usize = 500;

        let rb = Arc::new(MpmcRingBuffer::new(64, true).unwrap());
        let handles: Vec<_> = (0..WRITERS)
            .map(|id| {
                let rb = rb.clone();
                thread::spawn(move || {
                    for _ in 0..RECORDS {
                        rb.write(&[id; 8]);
                    }
                })
            })
            .collect();

        let mut counts = [0usize; WRITERS as usize];
        for _ in 0..WRITERS as usize * RECORDS {
            let mut record = [0u8; 8];
            rb.read(&mut record);
            assert!(record.iter().all(|&b| b == record[0]), "torn record {:?}", record);
            counts[record[0] as usize] += 1;
        }
        for h in handles {
            h.join().unwrap();
        }

        assert!(counts.iter().all(|&c| c == RECORDS));
        assert_eq!(rb.total_written(), (WRITERS as u64) * RECORDS as u64 * 8);
        assert_eq!(rb.total_read(), rb.total_written());
    }
}
