//! Read-only view of the shared-memory segment the game plugin writes.
//!
//! On Unix the plugin's segment is a file (`/dev/shm/SCS/SCSTelemetry` under
//! Proton/Wine, or any file during tests) and is mapped with `memmap2`.  On
//! Windows it is a named file mapping (`Local\SCSTelemetry`) opened through
//! the Win32 API.
//!
//! The writer keeps updating the segment while we read it.  A snapshot
//! decoded from the mapping may therefore mix two plugin frames; the plugin
//! offers no sequence counter to detect that.

use codriver_types::CoDriverError;
use tracing::info;

#[cfg(unix)]
pub use unix::SharedMemory;
#[cfg(windows)]
pub use windows::SharedMemory;

#[cfg(unix)]
mod unix {
    use std::fs::File;

    use memmap2::Mmap;

    use super::*;

    /// Mapped telemetry segment.
    pub struct SharedMemory {
        name: String,
        map: Mmap,
    }

    impl SharedMemory {
        /// Map the segment at path `name` read-only.
        ///
        /// # Errors
        ///
        /// [`CoDriverError::SharedMemory`] when the file is missing or
        /// cannot be mapped (the game is usually not running).
        pub fn open(name: &str) -> Result<Self, CoDriverError> {
            let file = File::open(name).map_err(|e| {
                CoDriverError::SharedMemory(format!("cannot open segment {name}: {e}"))
            })?;
            // SAFETY: the mapping is read-only; concurrent writes by the
            // plugin can only produce torn values, never invalid memory.
            let map = unsafe { Mmap::map(&file) }.map_err(|e| {
                CoDriverError::SharedMemory(format!("cannot map segment {name}: {e}"))
            })?;
            info!(segment = name, bytes = map.len(), "telemetry segment mapped");
            Ok(Self {
                name: name.to_string(),
                map,
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.map
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::ffi::c_void;

    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::System::Memory::{
        FILE_MAP_READ, MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
        OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
    };

    use super::*;

    /// Mapped telemetry segment.
    pub struct SharedMemory {
        name: String,
        handle: HANDLE,
        view: MEMORY_MAPPED_VIEW_ADDRESS,
        len: usize,
    }

    // SAFETY: the view is read-only and owned exclusively by this value.
    unsafe impl Send for SharedMemory {}

    impl SharedMemory {
        /// Open the named file mapping `name` read-only.
        ///
        /// # Errors
        ///
        /// [`CoDriverError::SharedMemory`] when the mapping does not exist
        /// (the game is not running) or cannot be viewed.
        pub fn open(name: &str) -> Result<Self, CoDriverError> {
            let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            // SAFETY: `wide` is NUL-terminated and outlives the call.
            let handle = unsafe { OpenFileMappingW(FILE_MAP_READ, 0, wide.as_ptr()) };
            if handle == 0 {
                return Err(CoDriverError::SharedMemory(format!(
                    "cannot open segment {name}: {}",
                    std::io::Error::last_os_error()
                )));
            }
            // SAFETY: `handle` is a valid mapping handle; a length of 0 maps
            // the whole section.
            let view = unsafe { MapViewOfFile(handle, FILE_MAP_READ, 0, 0, 0) };
            if view.Value.is_null() {
                let err = std::io::Error::last_os_error();
                // SAFETY: `handle` was returned by OpenFileMappingW above.
                unsafe { CloseHandle(handle) };
                return Err(CoDriverError::SharedMemory(format!(
                    "cannot map segment {name}: {err}"
                )));
            }
            // SAFETY: zeroed MEMORY_BASIC_INFORMATION is a valid out-param.
            let mut info: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
            // SAFETY: `view.Value` points at the mapped view.
            let written = unsafe {
                VirtualQuery(
                    view.Value as *const c_void,
                    &mut info,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            let len = if written == 0 { 0 } else { info.RegionSize };
            info!(segment = name, bytes = len, "telemetry segment mapped");
            Ok(Self {
                name: name.to_string(),
                handle,
                view,
                len,
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }

        pub fn as_bytes(&self) -> &[u8] {
            // SAFETY: the view spans `len` readable bytes until drop.
            unsafe { std::slice::from_raw_parts(self.view.Value as *const u8, self.len) }
        }
    }

    impl Drop for SharedMemory {
        fn drop(&mut self) {
            // SAFETY: both were obtained in `open` and are released once.
            unsafe {
                UnmapViewOfFile(self.view);
                CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn maps_a_file_backed_segment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 64]).unwrap();
        file.flush().unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let shm = SharedMemory::open(&path).unwrap();
        assert_eq!(shm.name(), path);
        assert_eq!(shm.as_bytes().len(), 64);
        assert!(shm.as_bytes().iter().all(|&b| b == 7));
    }

    #[test]
    fn missing_segment_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SCSTelemetry");
        assert!(matches!(
            SharedMemory::open(&path.to_string_lossy()),
            Err(CoDriverError::SharedMemory(_))
        ));
    }
}
