//! Primitive tunggu: spin murni dan condition wait
//!
//! Mode spin tidak pernah men-suspend thread. Mode blocking menunggu di bawah
//! mutex dengan predikat yang selalu dicek ulang setelah bangun.

use crossbeam_utils::Backoff;
use std::sync::{Condvar, Mutex, PoisonError};

/// Spin sampai `ready()` true, dengan exponential backoff tanpa yield.
#[inline]
pub(crate) fn spin_until(mut ready: impl FnMut() -> bool) {
    let backoff = Backoff::new();
    while !ready() {
        backoff.spin();
    }
}

/// Pasangan mutex + condvar.
///
/// Mutex tidak menjaga data apa pun; state sebenarnya ada di atomic milik
/// buffer. Notifier mengambil mutex sebentar setelah update atomic, jadi
/// notifikasi tidak bisa hilang di antara cek predikat dan tidur.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Signal {
    pub(crate) fn wait_until(&self, mut ready: impl FnMut() -> bool) {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .cond
            .wait_while(guard, |_| !ready())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Bangunkan satu waiter (SPSC: peer-nya hanya satu)
    pub(crate) fn notify_one(&self) {
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cond.notify_one();
    }

    /// Bangunkan semua waiter; yang kalah akan cek predikat dan tidur lagi
    pub(crate) fn notify_all(&self) {
        drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        self.cond.notify_all();
    }
}
