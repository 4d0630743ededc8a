use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::{timeout_millis, BufferSizes, Channel, Wait};
use crate::error::{Result, TransportError};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Pipe endpoint backed by a Unix domain socket.
///
/// The side that creates the endpoint binds it here; the other side calls
/// [`UnixDomainSocket::connect`]. The socket file is removed on drop.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    /// Whether the path should be removed on drop (filesystem sockets only).
    cleanup_on_drop: bool,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the path already exists and is a socket, it is removed first
    /// (stale socket cleanup). Any other existing file is an error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |path: &Path, source: io::Error| TransportError::Bind {
            path: path.to_path_buf(),
            source,
        };

        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| bind_err(&path, e))?;
            if !metadata.file_type().is_socket() {
                return Err(bind_err(
                    &path,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| bind_err(&path, e))?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| bind_err(&path, e))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(|e| bind_err(&path, e))?;
        let created = std::fs::symlink_metadata(&path).map_err(|e| bind_err(&path, e))?;

        info!(?path, "pipe endpoint listening");

        Ok(Self {
            listener,
            path,
            created_inode: Some((created.dev(), created.ino())),
            cleanup_on_drop: true,
        })
    }

    /// Accept the peer (blocking).
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted pipe peer");
        Ok(stream)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to pipe endpoint");
        Ok(stream)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if !self.cleanup_on_drop {
            return;
        }
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

/// Switches a descriptor to non-blocking mode for the lifetime of the guard
/// and restores the original file status flags on every exit path.
struct NonBlocking {
    fd: RawFd,
    original: libc::c_int,
}

impl NonBlocking {
    fn enable(fd: RawFd) -> io::Result<Self> {
        // SAFETY: `fd` is an open descriptor borrowed from a live `UnixStream`.
        let original = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if original < 0 {
            return Err(io::Error::last_os_error());
        }
        if original & libc::O_NONBLOCK == 0 {
            // SAFETY: as above; only the O_NONBLOCK bit changes.
            let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, original | libc::O_NONBLOCK) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(Self { fd, original })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        if self.original & libc::O_NONBLOCK == 0 {
            // SAFETY: the descriptor outlives the guard; restores the saved flags.
            unsafe { libc::fcntl(self.fd, libc::F_SETFL, self.original) };
        }
    }
}

/// Wait until `fd` is ready for `events` or `timeout` passes.
fn poll_ready(fd: RawFd, events: libc::c_short, timeout: Duration) -> io::Result<bool> {
    let millis = timeout_millis(timeout, libc::c_int::MAX as u128) as libc::c_int;
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    loop {
        // SAFETY: `pfd` is a valid, exclusively borrowed pollfd array of length 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(rc > 0);
    }
}

/// Without `MSG_NOSIGNAL`, a write to a closed peer must not raise SIGPIPE.
#[cfg(any(
    target_vendor = "apple",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
fn suppress_sigpipe(fd: RawFd) -> io::Result<()> {
    let on: libc::c_int = 1;
    // SAFETY: `on` is a valid readable c_int for the given length and `fd` is
    // an open socket descriptor.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            (&on as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(
    target_vendor = "apple",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
fn suppress_sigpipe(_fd: RawFd) -> io::Result<()> {
    Ok(())
}

fn sockopt_size(fd: RawFd, option: libc::c_int) -> io::Result<usize> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: `value` and `len` are valid writable pointers for the provided sizes,
    // and `fd` is an open Unix socket descriptor owned by this process.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(value.max(0) as usize)
}

impl Channel for UnixStream {
    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Wait> {
        if buf.is_empty() {
            return Ok(Wait::Done(0));
        }
        let fd = self.as_raw_fd();
        let _guard = NonBlocking::enable(fd)?;

        if !poll_ready(fd, libc::POLLIN, timeout)? {
            return Ok(Wait::TimedOut);
        }

        match Read::read(self, buf) {
            Ok(0) => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => Ok(Wait::Done(n)),
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(Wait::Done(0))
            }
            Err(err) => Err(err),
        }
    }

    fn write_some(&mut self, buf: &[u8], timeout: Duration) -> io::Result<Wait> {
        if buf.is_empty() {
            return Ok(Wait::Done(0));
        }
        let fd = self.as_raw_fd();
        suppress_sigpipe(fd)?;
        let _guard = NonBlocking::enable(fd)?;

        if !poll_ready(fd, libc::POLLOUT, timeout)? {
            return Ok(Wait::TimedOut);
        }

        // SAFETY: `buf` is a valid readable slice for `buf.len()` bytes and `fd`
        // is an open socket descriptor.
        let rc = unsafe {
            libc::send(
                fd,
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                SEND_FLAGS,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(Wait::Done(0)),
                _ => Err(err),
            };
        }
        if rc == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero));
        }
        Ok(Wait::Done(rc as usize))
    }

    fn buffer_sizes(&self) -> io::Result<BufferSizes> {
        let fd = self.as_raw_fd();
        Ok(BufferSizes {
            outbound: sockopt_size(fd, libc::SO_SNDBUF)?,
            inbound: sockopt_size(fd, libc::SO_RCVBUF)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Instant;

    #[test]
    fn test_bind_accept_connect() {
        let dir = std::env::temp_dir().join(format!("arraypipe-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("test.sock");

        let listener = UnixDomainSocket::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut client = UnixDomainSocket::connect(&path_clone).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();

        drop(listener);
        assert!(
            !sock_path.exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixDomainSocket::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn test_bind_default_permissions_hardened() {
        let dir = std::env::temp_dir().join(format!("arraypipe-perms-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("perm.sock");

        let listener = UnixDomainSocket::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bind_rejects_existing_non_socket_file() {
        let dir = std::env::temp_dir().join(format!("arraypipe-bind-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixDomainSocket::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_connect_missing_endpoint() {
        let result = UnixDomainSocket::connect("/tmp/arraypipe-definitely-missing.sock");
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn read_some_times_out_when_peer_is_silent() {
        let (mut left, _right) = UnixStream::pair().unwrap();
        let mut buf = [0u8; 4];
        let start = Instant::now();
        let outcome = left
            .read_some(&mut buf, Duration::from_millis(50))
            .unwrap();
        assert_eq!(outcome, Wait::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn read_some_returns_available_bytes() {
        let (mut left, mut right) = UnixStream::pair().unwrap();
        right.write_all(b"xy").unwrap();
        let mut buf = [0u8; 8];
        let outcome = left.read_some(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, Wait::Done(2));
        assert_eq!(&buf[..2], b"xy");
    }

    #[test]
    fn read_some_reports_end_of_stream() {
        let (mut left, right) = UnixStream::pair().unwrap();
        drop(right);
        let mut buf = [0u8; 1];
        let err = left.read_some(&mut buf, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn guard_restores_blocking_mode() {
        let (mut left, mut right) = UnixStream::pair().unwrap();
        let mut buf = [0u8; 1];
        let _ = left.read_some(&mut buf, Duration::from_millis(5)).unwrap();

        // SAFETY: descriptor owned by `left`, only reading flags.
        let flags = unsafe { libc::fcntl(left.as_raw_fd(), libc::F_GETFL) };
        assert_eq!(flags & libc::O_NONBLOCK, 0);

        right.write_all(b"z").unwrap();
        left.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"z");
    }

    #[test]
    fn write_some_then_peer_reads() {
        let (mut left, mut right) = UnixStream::pair().unwrap();
        let outcome = left.write_some(b"abc", Duration::from_secs(1)).unwrap();
        assert_eq!(outcome, Wait::Done(3));
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn write_to_closed_peer_is_broken_pipe() {
        let (mut left, right) = UnixStream::pair().unwrap();
        drop(right);
        let err = left.write_some(b"x", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn buffer_sizes_are_reported() {
        let (left, _right) = UnixStream::pair().unwrap();
        let sizes = left.buffer_sizes().unwrap();
        assert!(sizes.inbound > 0);
        assert!(sizes.outbound > 0);
    }
}
