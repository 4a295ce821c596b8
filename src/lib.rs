//! bytering - Fixed-Capacity Byte Ring Buffers
//!
//! Arsitektur:
//! - SPSC: satu writer, satu reader, release/acquire fence
//! - MPMC: reservation + completion cursor per arah, CAS retry loop
//! - Blocking (condvar) atau spinning (busy-poll), dipilih saat konstruksi
//! - Tidak ada alokasi setelah inisialisasi
//!
//! Buffer memindahkan byte mentah, bukan message: writer dan reader harus
//! sepakat soal ukuran chunk.

pub mod core;
pub mod error;

pub use crate::core::{
    MpmcRingBuffer, RingMonitor, SpscReader, SpscRingBuffer, SpscWriter, TransferCounters,
    CACHE_LINE_SIZE,
};
pub use crate::error::{Error, Result};
