//! Persistent cell store backed by a memory-mapped file.
//!
//! The backing file holds raw cells; whatever a program writes is
//! visible to later processes that open the same file.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::Memory;
use crate::error::MasmError;

/// Cell store mapped over a file with `mmap`. The file is created if
/// missing and grown to at least the requested minimum size; an
/// existing larger file keeps its size.
pub struct MappedMemory {
    ptr: *mut i64,
    cells: usize,
    map_len: usize,
    fd: libc::c_int,
}

impl MappedMemory {
    pub fn open(path: &Path, min_size: usize) -> Result<Self, MasmError> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            MasmError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "memory file path contains a NUL byte",
            ))
        })?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CREAT, 0o644) };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err.into());
        }

        let mut size = st.st_size as usize;
        if size < min_size {
            size = min_size;
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err.into());
            }
        }
        // Whole cells only; a tail shorter than one cell is unaddressable.
        let map_len = size - size % std::mem::size_of::<i64>();

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err.into());
        }

        Ok(Self {
            ptr: ptr as *mut i64,
            cells: map_len / std::mem::size_of::<i64>(),
            map_len,
            fd,
        })
    }

    /// Release the mapping and file handle. Safe to call more than
    /// once; subsequent cell access fails with OutOfRange.
    pub fn close(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.map_len);
                libc::close(self.fd);
            }
            self.ptr = std::ptr::null_mut();
            self.cells = 0;
        }
    }

    fn check(&self, index: i64) -> Result<usize, MasmError> {
        if self.ptr.is_null() || index < 0 || index as usize >= self.cells {
            return Err(MasmError::OutOfRange(format!(
                "cell {} (capacity {})",
                index, self.cells
            )));
        }
        Ok(index as usize)
    }
}

impl Memory for MappedMemory {
    fn read_cell(&self, index: i64) -> Result<i64, MasmError> {
        let idx = self.check(index)?;
        // SAFETY: idx is bounds-checked and the mapping is live.
        Ok(unsafe { *self.ptr.add(idx) })
    }

    fn write_cell(&mut self, index: i64, value: i64) -> Result<(), MasmError> {
        let idx = self.check(index)?;
        // SAFETY: idx is bounds-checked and the mapping is live.
        unsafe { *self.ptr.add(idx) = value };
        Ok(())
    }

    fn len(&self) -> i64 {
        self.cells as i64
    }
}

impl Drop for MappedMemory {
    fn drop(&mut self) {
        self.close();
    }
}

// The mapping is exclusively owned; nothing shares the raw pointer.
unsafe impl Send for MappedMemory {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_MAPPED_SIZE;

    #[test]
    fn test_open_creates_and_sizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.mem");
        let mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
        assert_eq!(mem.len() as usize, MIN_MAPPED_SIZE / 8);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), MIN_MAPPED_SIZE as u64);
    }

    #[test]
    fn test_cell_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.mem");
        let mut mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
        mem.write_cell(100, 12345).unwrap();
        assert_eq!(mem.read_cell(100).unwrap(), 12345);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.mem");
        {
            let mut mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
            mem.write_cell(512, 777).unwrap();
            mem.write_string_at(1000, "persisted").unwrap();
        }
        let mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
        assert_eq!(mem.read_cell(512).unwrap(), 777);
        assert_eq!(mem.read_string_at(1000).unwrap(), "persisted");
    }

    #[test]
    fn test_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.mem");
        let mut mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
        let cap = mem.len();
        assert!(matches!(mem.read_cell(cap), Err(MasmError::OutOfRange(_))));
        assert!(matches!(mem.write_cell(-1, 0), Err(MasmError::OutOfRange(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.mem");
        let mut mem = MappedMemory::open(&path, MIN_MAPPED_SIZE).unwrap();
        mem.close();
        mem.close();
        assert!(mem.read_cell(0).is_err());
    }
}
