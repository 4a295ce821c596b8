//! Backing store berbasis anonymous mmap
//!
//! Satu region byte dengan panjang tetap, dialokasikan sekali saat konstruksi
//! dan dilepas saat buffer di-drop. Kapasitas harus power of 2 supaya offset
//! cukup dihitung dengan mask.

use memmap2::MmapMut;

use crate::error::{Error, Result};

pub(crate) struct Storage {
    // Mapping harus hidup selama `ptr` dipakai
    _mmap: MmapMut,
    ptr: *mut u8,
    len: usize,
    mask: u64,
}

// SAFETY: Storage hanya memberi akses lewat copy_in/copy_out yang unsafe.
// Pemanggil menjamin range yang disentuh eksklusif (lewat cursor/CAS).
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Storage {
    /// Alokasi backing store sebesar `capacity` byte
    pub(crate) fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(Error::InvalidCapacity(capacity));
        }
        let len = usize::try_from(capacity).map_err(|_| Error::InvalidCapacity(capacity))?;

        let mut mmap = MmapMut::map_anon(len)?;
        let ptr = mmap.as_mut_ptr();

        Ok(Self {
            _mmap: mmap,
            ptr,
            len,
            mask: capacity - 1,
        })
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> u64 {
        self.len as u64
    }

    /// Pecah range `[cursor, cursor + len)` di batas wrap.
    ///
    /// Returns `(offset, first, second)`: `first` byte mulai di `offset`,
    /// sisanya `second` byte mulai di offset 0.
    #[inline(always)]
    pub(crate) fn split(&self, cursor: u64, len: usize) -> (usize, usize, usize) {
        let offset = (cursor & self.mask) as usize;
        let first = len.min(self.len - offset);
        (offset, first, len - first)
    }

    /// Copy `data` ke store mulai dari cursor `cursor`.
    ///
    /// # Safety
    /// `data.len() <= capacity`, dan tidak ada thread lain yang membaca atau
    /// menulis range `[cursor, cursor + data.len())` selama copy.
    #[inline(always)]
    pub(crate) unsafe fn copy_in(&self, cursor: u64, data: &[u8]) {
        let (offset, first, second) = self.split(cursor, data.len());
        std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), first);
        if second > 0 {
            std::ptr::copy_nonoverlapping(data.as_ptr().add(first), self.ptr, second);
        }
    }

    /// Copy dari store mulai cursor `cursor` ke `buf`.
    ///
    /// # Safety
    /// `buf.len() <= capacity`, range sudah dipublikasikan penulisnya dan
    /// tidak sedang ditulis ulang.
    #[inline(always)]
    pub(crate) unsafe fn copy_out(&self, cursor: u64, buf: &mut [u8]) {
        let (offset, first, second) = self.split(cursor, buf.len());
        std::ptr::copy_nonoverlapping(self.ptr.add(offset), buf.as_mut_ptr(), first);
        if second > 0 {
            std::ptr::copy_nonoverlapping(self.ptr, buf.as_mut_ptr().add(first), second);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_capacity() {
        assert!(matches!(Storage::new(0), Err(Error::InvalidCapacity(0))));
        assert!(matches!(Storage::new(12), Err(Error::InvalidCapacity(12))));
        assert!(Storage::new(1).is_ok());
        assert_eq!(Storage::new(4096).unwrap().capacity(), 4096);
    }

    #[test]
    fn test_split_without_wrap() {
        let storage = Storage::new(8).unwrap();
        assert_eq!(storage.split(0, 8), (0, 8, 0));
        assert_eq!(storage.split(2, 4), (2, 4, 0));
        // cursor tidak pernah di-mask, hanya offset
        assert_eq!(storage.split(17, 3), (1, 3, 0));
    }

    #[test]
    fn test_split_across_wrap() {
        let storage = Storage::new(8).unwrap();
        assert_eq!(storage.split(6, 6), (6, 2, 4));
        assert_eq!(storage.split(15, 8), (7, 1, 7));
    }

    #[test]
    fn test_copy_across_wrap() {
        let storage = Storage::new(8).unwrap();
        unsafe {
            storage.copy_in(0, b"01234567");
            storage.copy_in(6, b"ABCDEF");
        }

        let mut out = [0u8; 8];
        unsafe { storage.copy_out(0, &mut out) };
        assert_eq!(&out, b"CDEF45AB");

        let mut out = [0u8; 6];
        unsafe { storage.copy_out(14, &mut out) };
        assert_eq!(&out, b"ABCDEF");
    }
}
