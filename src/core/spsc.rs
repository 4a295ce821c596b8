//! Single-Producer Single-Consumer (SPSC) byte ring buffer
//!
//! Satu cursor write, satu cursor read. Tidak ada dua thread yang berebut
//! cursor yang sama, jadi cukup release fence sebelum publish dan acquire
//! fence sebelum memutuskan muat/tidak. Kontrak satu writer + satu reader
//! dijaga oleh ownership: [`SpscRingBuffer::split`] menghasilkan tepat satu
//! [`SpscWriter`] dan satu [`SpscReader`].

use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

use super::cursor::{check_len, fits_read, fits_write, CacheLinePadded};
use super::storage::Storage;
use super::wait::{spin_until, Signal};
use super::TransferCounters;
use crate::error::Result;

struct Shared {
    // Producer side - cache line aligned
    write_total: CacheLinePadded<AtomicU64>,
    // Consumer side - cache line aligned
    read_total: CacheLinePadded<AtomicU64>,
    storage: Storage,
    blocking: bool,
    signal: Signal,
}

impl Shared {
    fn new(capacity: u64, blocking: bool) -> Result<Self> {
        let storage = Storage::new(capacity)?;
        log::debug!(
            "spsc ring allocated: capacity={} blocking={}",
            capacity,
            blocking
        );

        Ok(Self {
            write_total: CacheLinePadded::new(AtomicU64::new(0)),
            read_total: CacheLinePadded::new(AtomicU64::new(0)),
            storage,
            blocking,
            signal: Signal::default(),
        })
    }

    #[inline(always)]
    fn can_put(&self, len: u64) -> bool {
        let write = self.write_total.load(Ordering::Relaxed);
        let read = self.read_total.load(Ordering::Relaxed);
        // Acquire: reader sudah selesai copy-out sebelum slot ditimpa
        fence(Ordering::Acquire);
        fits_write(write, len, read, self.storage.capacity())
    }

    #[inline(always)]
    fn can_get(&self, len: u64) -> bool {
        let read = self.read_total.load(Ordering::Relaxed);
        let write = self.write_total.load(Ordering::Relaxed);
        // Acquire: byte yang dipublikasikan writer sudah terlihat
        fence(Ordering::Acquire);
        fits_read(read, len, write)
    }

    #[inline(always)]
    fn wait(&self, ready: impl FnMut() -> bool) {
        if self.blocking {
            self.signal.wait_until(ready);
        } else {
            spin_until(ready);
        }
    }

    /// Hanya boleh dipanggil oleh satu-satunya writer.
    fn write(&self, data: &[u8]) {
        let len = data.len() as u64;
        check_len("write", len, self.storage.capacity());
        if len == 0 {
            return;
        }

        self.wait(|| self.can_put(len));

        let write = self.write_total.load(Ordering::Relaxed);
        // SAFETY: range [write, write + len) sudah dibaca habis oleh reader
        // (can_put) dan hanya writer ini yang menulis
        unsafe { self.storage.copy_in(write, data) };

        // Release fence: copy di atas visible sebelum write_total di-update
        fence(Ordering::Release);
        self.write_total.store(write + len, Ordering::Relaxed);

        if self.blocking {
            self.signal.notify_one();
        }
    }

    /// Hanya boleh dipanggil oleh satu-satunya reader.
    fn read(&self, buf: &mut [u8]) {
        let len = buf.len() as u64;
        check_len("read", len, self.storage.capacity());
        if len == 0 {
            return;
        }

        self.wait(|| self.can_get(len));

        let read = self.read_total.load(Ordering::Relaxed);
        // SAFETY: range [read, read + len) sudah dipublikasikan writer
        // (can_get) dan tidak akan ditimpa sebelum read_total maju
        unsafe { self.storage.copy_out(read, buf) };

        // Release fence: copy-out selesai sebelum slot dikembalikan ke writer
        fence(Ordering::Release);
        self.read_total.store(read + len, Ordering::Relaxed);

        if self.blocking {
            self.signal.notify_one();
        }
    }

    #[inline(always)]
    fn total_written(&self) -> u64 {
        self.write_total.load(Ordering::Acquire)
    }

    #[inline(always)]
    fn total_read(&self) -> u64 {
        self.read_total.load(Ordering::Acquire)
    }
}

/// SPSC byte ring buffer.
///
/// Dipakai langsung (`&mut self`) dari satu thread, atau di-[`split`] menjadi
/// writer dan reader untuk dua thread.
///
/// # Examples
/// ```
/// use bytering::SpscRingBuffer;
///
/// let mut rb = SpscRingBuffer::new(8, false).unwrap();
/// rb.write(b"AB");
/// rb.write(b"CDEF");
///
/// let mut out = [0u8; 6];
/// rb.read(&mut out);
/// assert_eq!(&out, b"ABCDEF");
/// ```
///
/// [`split`]: SpscRingBuffer::split
pub struct SpscRingBuffer {
    shared: Arc<Shared>,
}

impl SpscRingBuffer {
    /// Membuat ring buffer baru. `capacity` HARUS power of 2.
    ///
    /// `blocking = true` men-suspend thread saat penuh/kosong, `false`
    /// busy-spin.
    pub fn new(capacity: u64, blocking: bool) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(Shared::new(capacity, blocking)?),
        })
    }

    /// Tulis seluruh `data`, menunggu sampai ada ruang.
    ///
    /// Tanpa reader di thread lain, call ini menunggu selamanya jika ruang
    /// tidak cukup.
    ///
    /// # Aborts
    /// Proses di-abort jika `data.len() > capacity`.
    pub fn write(&mut self, data: &[u8]) {
        self.shared.write(data);
    }

    /// Isi seluruh `buf`, menunggu sampai datanya tersedia.
    ///
    /// # Aborts
    /// Proses di-abort jika `buf.len() > capacity`.
    pub fn read(&mut self, buf: &mut [u8]) {
        self.shared.read(buf);
    }

    /// Pisahkan menjadi satu writer dan satu reader.
    pub fn split(self) -> (SpscWriter, SpscReader) {
        (
            SpscWriter {
                shared: self.shared.clone(),
            },
            SpscReader {
                shared: self.shared,
            },
        )
    }

    /// Handle untuk sampling counter dari thread mana pun.
    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: self.shared.clone(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.shared.storage.capacity()
    }

    pub fn is_blocking(&self) -> bool {
        self.shared.blocking
    }

    /// Jumlah byte yang belum dibaca
    pub fn len(&self) -> u64 {
        self.in_flight()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sisi producer dari SPSC ring buffer
pub struct SpscWriter {
    shared: Arc<Shared>,
}

impl SpscWriter {
    /// Lihat [`SpscRingBuffer::write`].
    #[inline]
    pub fn write(&mut self, data: &[u8]) {
        self.shared.write(data);
    }

    pub fn capacity(&self) -> u64 {
        self.shared.storage.capacity()
    }

    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: self.shared.clone(),
        }
    }
}

/// Sisi consumer dari SPSC ring buffer
pub struct SpscReader {
    shared: Arc<Shared>,
}

impl SpscReader {
    /// Lihat [`SpscRingBuffer::read`].
    #[inline]
    pub fn read(&mut self, buf: &mut [u8]) {
        self.shared.read(buf);
    }

    pub fn capacity(&self) -> u64 {
        self.shared.storage.capacity()
    }

    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: self.shared.clone(),
        }
    }
}

/// Read-only view atas counter SPSC, aman dibagi ke thread monitor.
#[derive(Clone)]
pub struct RingMonitor {
    shared: Arc<Shared>,
}

impl RingMonitor {
    pub fn capacity(&self) -> u64 {
        self.shared.storage.capacity()
    }
}

impl TransferCounters for SpscRingBuffer {
    fn total_written(&self) -> u64 {
        self.shared.total_written()
    }

    fn total_read(&self) -> u64 {
        self.shared.total_read()
    }
}

impl TransferCounters for RingMonitor {
    fn total_written(&self) -> u64 {
        self.shared.total_written()
    }

    fn total_read(&self) -> u64 {
        self.shared.total_read()
    }
}
