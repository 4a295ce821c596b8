//! Core module: byte ring buffer SPSC dan MPMC
//!
//! Prinsip desain:
//! - Fixed capacity: backing store dialokasikan sekali, power of 2
//! - Monotonic cursor: total byte, di-mask hanya untuk offset fisik
//! - Wraparound split copy: range yang melewati ujung store di-copy dua kali
//! - Blocking atau spinning: dipilih saat konstruksi

mod cursor;
mod mpmc;
mod spsc;
mod storage;
mod wait;

pub use cursor::CACHE_LINE_SIZE;
pub use mpmc::MpmcRingBuffer;
pub use spsc::{RingMonitor, SpscReader, SpscRingBuffer, SpscWriter};

/// Counter total byte yang bisa di-sample kapan saja, dari thread mana saja.
///
/// Hanya untuk observasi throughput, bukan untuk keputusan correctness.
pub trait TransferCounters {
    /// Total byte yang sudah dipublikasikan ke reader
    fn total_written(&self) -> u64;

    /// Total byte yang sudah selesai dibaca
    fn total_read(&self) -> u64;

    /// Byte yang ditulis tapi belum dibaca.
    ///
    /// `total_written` di-load lebih dulu, jadi hasilnya tidak pernah
    /// melebihi kapasitas walaupun kedua sisi sedang bergerak.
    fn in_flight(&self) -> u64 {
        let written = self.total_written();
        let read = self.total_read();
        written.saturating_sub(read)
    }
}
