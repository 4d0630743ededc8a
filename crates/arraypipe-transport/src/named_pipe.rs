//! Windows named pipe client opened for overlapped I/O.
//!
//! Every bounded operation owns a manual-reset event for its lifetime. On
//! timeout the pending operation is cancelled with `CancelIoEx` and drained
//! before the event guard closes, so the kernel never touches a buffer or
//! `OVERLAPPED` block that has gone out of scope.

use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::time::Duration;

use tracing::debug;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_IO_PENDING, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_FLAG_OVERLAPPED, OPEN_EXISTING,
};
use windows_sys::Win32::System::Pipes::GetNamedPipeInfo;
use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject};
use windows_sys::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

use crate::channel::{timeout_millis, BufferSizes, Channel, Wait};
use crate::error::{Result, TransportError};

/// Longest finite wait accepted by `WaitForSingleObject` (`INFINITE` is `u32::MAX`).
const MAX_WAIT_MILLIS: u128 = (u32::MAX - 1) as u128;

/// Client end of an existing named pipe (e.g. `\\.\pipe\arraypipe`).
pub struct NamedPipe {
    handle: HANDLE,
    path: PathBuf,
}

// SAFETY: the pipe handle is owned exclusively by this value and is only used
// through `&mut self` for I/O; Win32 handles may be used from any thread.
unsafe impl Send for NamedPipe {}

impl NamedPipe {
    /// Open an existing pipe created by the peer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `wide` is a NUL-terminated UTF-16 string that outlives the call;
        // all pointer arguments are either valid or null where the API permits it.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(TransportError::Connect {
                path: path.to_path_buf(),
                source: io::Error::last_os_error(),
            });
        }

        debug!(?path, "opened named pipe");
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// The pipe path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for an issued overlapped operation; cancel and drain it on expiry.
    fn complete(
        &self,
        overlapped: &mut OVERLAPPED,
        event: &Event,
        timeout: Duration,
    ) -> io::Result<Wait> {
        let millis = timeout_millis(timeout, MAX_WAIT_MILLIS) as u32;
        // SAFETY: `event` is a live event handle owned by the guard.
        let waited = unsafe { WaitForSingleObject(event.0, millis) };

        if waited != WAIT_OBJECT_0 {
            let wait_err = io::Error::last_os_error();
            let drained = self.cancel(overlapped);
            if waited == WAIT_TIMEOUT {
                // The operation may have completed between expiry and cancel.
                return Ok(match drained {
                    0 => Wait::TimedOut,
                    n => Wait::Done(n),
                });
            }
            return Err(wait_err);
        }

        let mut transferred = 0u32;
        // SAFETY: `overlapped` was used to issue the operation on `self.handle`
        // and the event is signalled, so the result is ready.
        let ok = unsafe { GetOverlappedResult(self.handle, overlapped, &mut transferred, 0) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Wait::Done(transferred as usize))
    }

    /// Cancel the pending operation and block until the kernel releases it.
    /// Returns the bytes the operation moved before it stopped.
    fn cancel(&self, overlapped: &mut OVERLAPPED) -> usize {
        let mut transferred = 0u32;
        // SAFETY: `overlapped` identifies an operation issued on `self.handle`.
        // Waiting on its result guarantees the kernel is done with the buffer.
        unsafe {
            CancelIoEx(self.handle, overlapped);
            if GetOverlappedResult(self.handle, overlapped, &mut transferred, 1) == 0 {
                transferred = 0;
            }
        }
        debug!(path = ?self.path, transferred, "cancelled pending pipe operation");
        transferred as usize
    }
}

impl Drop for NamedPipe {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by `CreateFileW` and is closed once.
        unsafe { CloseHandle(self.handle) };
    }
}

/// Manual-reset event owned for the duration of one operation.
struct Event(HANDLE);

impl Event {
    fn new() -> io::Result<Self> {
        // SAFETY: unnamed event with default security; null attributes are allowed.
        let handle = unsafe { CreateEventW(ptr::null(), 1, 0, ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self(handle))
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by `CreateEventW` and is closed once.
        unsafe { CloseHandle(self.0) };
    }
}

fn chunk_len(len: usize) -> u32 {
    len.min(u32::MAX as usize) as u32
}

impl Channel for NamedPipe {
    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Wait> {
        if buf.is_empty() {
            return Ok(Wait::Done(0));
        }
        let event = Event::new()?;
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented initial state.
        let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
        overlapped.hEvent = event.0;

        // SAFETY: `buf` and `overlapped` stay alive until `complete` returns,
        // which waits for (or cancels and drains) the operation.
        let ok = unsafe {
            ReadFile(
                self.handle,
                buf.as_mut_ptr(),
                chunk_len(buf.len()),
                ptr::null_mut(),
                &mut overlapped,
            )
        };
        if ok == 0 {
            // SAFETY: reads the calling thread's last-error value.
            let err = unsafe { GetLastError() };
            if err != ERROR_IO_PENDING {
                return Err(io::Error::from_raw_os_error(err as i32));
            }
        }

        match self.complete(&mut overlapped, &event, timeout)? {
            Wait::Done(0) => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            outcome => Ok(outcome),
        }
    }

    fn write_some(&mut self, buf: &[u8], timeout: Duration) -> io::Result<Wait> {
        if buf.is_empty() {
            return Ok(Wait::Done(0));
        }
        let event = Event::new()?;
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented initial state.
        let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
        overlapped.hEvent = event.0;

        // SAFETY: as in `read_some`.
        let ok = unsafe {
            WriteFile(
                self.handle,
                buf.as_ptr(),
                chunk_len(buf.len()),
                ptr::null_mut(),
                &mut overlapped,
            )
        };
        if ok == 0 {
            // SAFETY: reads the calling thread's last-error value.
            let err = unsafe { GetLastError() };
            if err != ERROR_IO_PENDING {
                return Err(io::Error::from_raw_os_error(err as i32));
            }
        }

        match self.complete(&mut overlapped, &event, timeout)? {
            Wait::Done(0) => Err(io::Error::from(io::ErrorKind::WriteZero)),
            outcome => Ok(outcome),
        }
    }

    fn buffer_sizes(&self) -> io::Result<BufferSizes> {
        let mut outbound = 0u32;
        let mut inbound = 0u32;
        // SAFETY: out-pointers are valid; unused outputs are null as permitted.
        let ok = unsafe {
            GetNamedPipeInfo(
                self.handle,
                ptr::null_mut(),
                &mut outbound,
                &mut inbound,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(BufferSizes {
            outbound: outbound as usize,
            inbound: inbound as usize,
        })
    }
}
