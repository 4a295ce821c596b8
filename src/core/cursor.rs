//! Aritmetika cursor dan isolasi cache line
//!
//! Cursor adalah total byte yang pernah lewat satu sisi (write atau read).
//! Tidak pernah di-reset dan tidak pernah di-mask: hanya offset fisik yang
//! di-mask. Dengan begitu "kosong" dan "penuh" tidak pernah ambigu.

use std::ops::Deref;

/// Ukuran cache line yang dipakai untuk memisahkan cursor producer dan consumer
///
/// Harus sama dengan nilai `align` pada [`CacheLinePadded`].
pub const CACHE_LINE_SIZE: usize = 64;

/// Padding untuk cache line isolation
#[repr(C, align(64))]
#[derive(Default)]
pub(crate) struct CacheLinePadded<T> {
    value: T,
}

const _: () = assert!(std::mem::align_of::<CacheLinePadded<u8>>() == CACHE_LINE_SIZE);

impl<T> CacheLinePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CacheLinePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.value
    }
}

/// `len` byte baru muat jika total unread tidak melebihi kapasitas
#[inline(always)]
pub(crate) fn fits_write(write: u64, len: u64, read: u64, capacity: u64) -> bool {
    write + len <= read + capacity
}

/// `len` byte bisa dibaca jika sudah dipublikasikan oleh sisi write
#[inline(always)]
pub(crate) fn fits_read(read: u64, len: u64, write: u64) -> bool {
    read + len <= write
}

/// Request lebih besar dari kapasitas tidak akan pernah muat, jadi fatal.
///
/// Seluruh proses di-abort, termasuk peer yang sedang menunggu.
#[inline(always)]
pub(crate) fn check_len(op: &str, len: u64, capacity: u64) {
    if len > capacity {
        oversized(op, len, capacity);
    }
}

#[cold]
#[inline(never)]
fn oversized(op: &str, len: u64, capacity: u64) -> ! {
    log::error!("{} len {} exceeds capacity {}, aborting", op, len, capacity);
    std::process::abort();
}

/// Jalankan `body` di child process dan pastikan child ter-abort.
///
/// Parent me-re-exec binary test ini dengan filter `test` (path lengkap dari
/// root crate) dan env `BYTERING_ABORT_CHILD`; child menjalankan `body`.
#[cfg(test)]
pub(crate) fn assert_aborts(test: &str, body: impl FnOnce()) {
    use std::process::Command;
    use std::time::{Duration, Instant};

    const CHILD_ENV: &str = "BYTERING_ABORT_CHILD";

    if std::env::var_os(CHILD_ENV).is_some() {
        body();
        return;
    }

    let mut child = Command::new(std::env::current_exe().unwrap())
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("{} hung instead of aborting", test);
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    assert!(!status.success(), "{} exited cleanly: {}", test, status);
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(status.signal(), Some(6), "{} did not abort: {}", test, status);
    }
}
