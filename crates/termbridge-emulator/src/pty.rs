//! Native PTY bridge built on portable-pty.
//!
//! Spawns a child on a fresh pseudo-terminal and exposes non-blocking
//! read/write, resize, wait and kill. The child's line discipline is always
//! reset to cooked mode with echo, whatever mode the host terminal is in.

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use termbridge_core::{Dimensions, Error, Result, SpawnConfig};

const WAIT_POLL: Duration = Duration::from_millis(10);
const WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// Outcome of a non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// `n` bytes were placed in the buffer
    Data(usize),
    /// Nothing available right now
    Empty,
    /// The child side is closed
    Eof,
}

/// Outcome of [`PtyBridge::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The child exited. On unix a child killed by signal `n` reports
    /// `128 + n`, as a shell would.
    Exited(i32),
    /// Still running when the timeout elapsed
    TimedOut,
}

/// Handle to a child process running on its own PTY.
pub struct PtyBridge {
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    reader: Mutex<Box<dyn Read + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    dimensions: Mutex<Dimensions>,
    exit_code: Mutex<Option<i32>>,
    pid: Option<u32>,
    #[cfg(unix)]
    fd: Option<std::os::unix::io::RawFd>,
}

impl std::fmt::Debug for PtyBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyBridge")
            .field("pid", &self.pid)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

fn lock<'a, T: ?Sized>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| Error::Transport(format!("{what} lock poisoned: {e}")))
}

impl PtyBridge {
    /// Spawn `config.program` on a new PTY.
    ///
    /// Zero dimensions fall back to 80x24. Any failure before the child is
    /// running is reported as [`Error::Spawn`].
    ///
    /// # Example
    /// ```no_run
    /// use termbridge_core::SpawnConfig;
    /// use termbridge_emulator::PtyBridge;
    ///
    /// # fn example() -> termbridge_core::Result<()> {
    /// let pty = PtyBridge::spawn(&SpawnConfig::new("/bin/sh").arg("-c").arg("echo hi"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(config: &SpawnConfig) -> Result<Self> {
        let dimensions = config.effective_dimensions();
        let command = config.program.as_str();
        #[cfg(unix)]
        let login_shell = if config.login {
            if !config.args.is_empty() {
                return Err(Error::spawn(command, "a login shell takes no arguments"));
            }
            let path = resolve_program(command)
                .ok_or_else(|| Error::spawn(command, "no such executable"))?;
            Some(path)
        } else {
            None
        };
        info!(
            command,
            args = ?config.args,
            rows = dimensions.rows,
            cols = dimensions.cols,
            cwd = ?config.working_directory,
            login = config.login,
            "Spawning PTY"
        );

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: dimensions.rows,
                cols: dimensions.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| {
                error!("Failed to open PTY: {e}");
                Error::spawn(command, format!("failed to open PTY: {e}"))
            })?;

        #[cfg(unix)]
        let fd = pair.master.as_raw_fd();

        // Must happen before the child starts reading its terminal settings.
        #[cfg(unix)]
        if let Some(fd) = fd {
            if let Err(e) = install_default_termios(fd) {
                warn!("Failed to install default termios: {e}");
            }
        }

        #[cfg(unix)]
        let mut cmd = match &login_shell {
            // The default program runs as `-<basename of $SHELL>`.
            Some(_) => CommandBuilder::new_default_prog(),
            None => CommandBuilder::new(command),
        };
        #[cfg(not(unix))]
        let mut cmd = CommandBuilder::new(command);
        cmd.args(&config.args);
        if !config.inherit_env {
            cmd.env_clear();
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        if let Some(path) = &login_shell {
            cmd.env("SHELL", path);
        }
        if let Some(dir) = &config.working_directory {
            cmd.cwd(dir);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!("Failed to spawn command '{command}': {e}");
            Error::spawn(command, e.to_string())
        })?;
        // Keeping the slave open would hide EOF once the child exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::spawn(command, format!("failed to clone reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::spawn(command, format!("failed to take writer: {e}")))?;

        #[cfg(unix)]
        if let Some(fd) = fd {
            set_nonblocking(fd)?;
        }

        let pid = child.process_id();
        info!(command, ?pid, "PTY spawned");

        Ok(Self {
            master: Mutex::new(pair.master),
            child: Mutex::new(child),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            dimensions: Mutex::new(dimensions),
            exit_code: Mutex::new(None),
            pid,
            #[cfg(unix)]
            fd,
        })
    }

    /// Child process id, if the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Last dimensions applied to the PTY.
    pub fn dimensions(&self) -> Result<Dimensions> {
        Ok(*lock(&self.dimensions, "dimensions")?)
    }

    /// Block until output is readable or `timeout` elapses.
    ///
    /// Returns true when a read would not block (including hang-up).
    #[cfg(unix)]
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        match self.fd {
            Some(fd) => poll_fd(fd, libc::POLLIN, timeout),
            None => Ok(true),
        }
    }

    /// Block until output is readable or `timeout` elapses.
    #[cfg(not(unix))]
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        std::thread::sleep(timeout.min(WAIT_POLL));
        Ok(true)
    }

    /// Read whatever output is available without blocking.
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadResult> {
        let mut reader = lock(&self.reader, "reader")?;
        match reader.read(buf) {
            Ok(0) => Ok(ReadResult::Eof),
            Ok(n) => {
                debug!("Read {n} bytes from PTY");
                Ok(ReadResult::Data(n))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(ReadResult::Empty)
            }
            // Linux reports a closed slave as EIO on the master.
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(libc::EIO) => Ok(ReadResult::Eof),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write all of `data` to the child's input.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        debug!("Writing {} bytes to PTY", data.len());
        let mut writer = lock(&self.writer, "writer")?;
        let deadline = Instant::now() + WRITE_DEADLINE;
        let mut written = 0;
        while written < data.len() {
            match writer.write(&data[written..]) {
                Ok(0) => return Err(Error::Transport("PTY closed during write".to_string())),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(Error::Transport("PTY input is not draining".to_string()));
                    }
                    self.wait_writable(WAIT_POLL)?;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        writer.flush().map_err(Error::Io)?;
        Ok(written)
    }

    #[cfg(unix)]
    fn wait_writable(&self, timeout: Duration) -> Result<()> {
        if let Some(fd) = self.fd {
            poll_fd(fd, libc::POLLOUT, timeout)?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn wait_writable(&self, timeout: Duration) -> Result<()> {
        std::thread::sleep(timeout);
        Ok(())
    }

    /// Change the window size and signal the child's process group.
    pub fn resize(&self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: dimensions.rows,
                cols: dimensions.cols,
            });
        }
        info!(rows = dimensions.rows, cols = dimensions.cols, "Resizing PTY");

        let master = lock(&self.master, "master")?;
        master
            .resize(PtySize {
                rows: dimensions.rows,
                cols: dimensions.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::Resize(e.to_string()))?;

        #[cfg(unix)]
        if let Some(pgrp) = master.process_group_leader() {
            // SAFETY: kill(2) with a negative pid signals the whole group.
            let rc = unsafe { libc::kill(-pgrp, libc::SIGWINCH) };
            if rc != 0 {
                debug!(pgrp, "SIGWINCH delivery failed");
            }
        }
        drop(master);

        *lock(&self.dimensions, "dimensions")? = dimensions;
        Ok(())
    }

    /// Check for exit without blocking.
    pub fn try_wait(&self) -> Result<Option<i32>> {
        let mut cached = lock(&self.exit_code, "exit status")?;
        if cached.is_some() {
            return Ok(*cached);
        }
        let mut child = lock(&self.child, "child")?;
        #[cfg(unix)]
        let reaped = match self.pid {
            Some(pid) => match reap_nonblocking(pid) {
                Err(e) if e.raw_os_error() == Some(libc::ECHILD) => portable_try_wait(&mut **child)?,
                other => other.map_err(Error::Io)?,
            },
            None => portable_try_wait(&mut **child)?,
        };
        #[cfg(not(unix))]
        let reaped = portable_try_wait(&mut **child)?;
        if let Some(code) = reaped {
            info!(pid = ?self.pid, code, "PTY child exited");
            *cached = Some(code);
        }
        Ok(*cached)
    }

    /// Wait up to `timeout` for the child to exit, polling every 10 ms.
    pub fn wait(&self, timeout: Duration) -> Result<WaitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = self.try_wait()? {
                return Ok(WaitStatus::Exited(code));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(WaitStatus::TimedOut);
            }
            std::thread::sleep(WAIT_POLL.min(deadline - now));
        }
    }

    /// Whether the child is still running.
    pub fn is_alive(&self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Exit code, once the child has been reaped.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.lock().ok().and_then(|code| *code)
    }

    /// Terminate the child. Killing an already exited child is not an error.
    pub fn kill(&self) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        info!(pid = ?self.pid, "Killing PTY child");
        let mut child = lock(&self.child, "child")?;
        match child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl Drop for PtyBridge {
    fn drop(&mut self) {
        if self.is_alive() {
            if let Err(e) = self.kill() {
                warn!("Failed to kill PTY child on drop: {e}");
            }
            let _ = self.wait(Duration::from_millis(100));
        }
    }
}

fn portable_try_wait(child: &mut (dyn Child + Send + Sync)) -> Result<Option<i32>> {
    let status = child.try_wait().map_err(Error::Io)?;
    Ok(status.map(|status| status.exit_code() as i32))
}

/// `waitpid(WNOHANG)` with shell-style decoding: a child killed by signal
/// `n` reports `128 + n`.
#[cfg(unix)]
fn reap_nonblocking(pid: u32) -> std::io::Result<Option<i32>> {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: status is a valid out-pointer; the pid is our own child.
        let rc = unsafe { libc::waitpid(pid as libc::pid_t, &mut status, libc::WNOHANG) };
        if rc == 0 {
            return Ok(None);
        }
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        break;
    }
    if libc::WIFEXITED(status) {
        Ok(Some(libc::WEXITSTATUS(status)))
    } else if libc::WIFSIGNALED(status) {
        Ok(Some(128 + libc::WTERMSIG(status)))
    } else {
        Ok(None)
    }
}

/// Look `program` up the way `execvp` would, keeping only executable files.
#[cfg(unix)]
fn resolve_program(program: &str) -> Option<std::path::PathBuf> {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    let executable = |path: &Path| {
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    };
    if program.contains('/') {
        let path = PathBuf::from(program);
        return executable(&path).then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| executable(path))
}

#[cfg(unix)]
fn poll_fd(fd: std::os::unix::io::RawFd, events: libc::c_short, timeout: Duration) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: pfd is a valid pollfd for the duration of the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(Error::Io(err));
    }
    Ok(rc > 0)
}

#[cfg(unix)]
fn set_nonblocking(fd: std::os::unix::io::RawFd) -> Result<()> {
    // SAFETY: fcntl on a descriptor owned by the master PTY.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
    }
    debug!(fd, "Master PTY set to non-blocking");
    Ok(())
}

/// Cooked mode with echo, signals and standard control characters.
#[cfg(unix)]
fn install_default_termios(fd: std::os::unix::io::RawFd) -> std::io::Result<()> {
    // SAFETY: termios is plain data; tcgetattr fills it before use.
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }

        tio.c_iflag = libc::ICRNL | libc::IXON;
        tio.c_oflag = libc::OPOST | libc::ONLCR;
        tio.c_cflag = libc::CS8 | libc::CREAD | libc::CLOCAL;
        tio.c_lflag =
            libc::ECHO | libc::ECHOE | libc::ECHOK | libc::ICANON | libc::ISIG | libc::IEXTEN;

        tio.c_cc[libc::VINTR] = 0x03;
        tio.c_cc[libc::VQUIT] = 0x1c;
        tio.c_cc[libc::VERASE] = 0x7f;
        tio.c_cc[libc::VKILL] = 0x15;
        tio.c_cc[libc::VEOF] = 0x04;
        tio.c_cc[libc::VSTART] = 0x11;
        tio.c_cc[libc::VSTOP] = 0x13;
        tio.c_cc[libc::VSUSP] = 0x1a;
        tio.c_cc[libc::VMIN] = 1;
        tio.c_cc[libc::VTIME] = 0;

        libc::cfsetispeed(&mut tio, libc::B38400);
        libc::cfsetospeed(&mut tio, libc::B38400);

        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> SpawnConfig {
        SpawnConfig::new("/bin/sh").arg("-c").arg(script)
    }

    fn drain(pty: &PtyBridge, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        while Instant::now() < deadline {
            if !pty.poll_readable(Duration::from_millis(50)).unwrap() {
                continue;
            }
            match pty.read(&mut buf).unwrap() {
                ReadResult::Data(n) => out.extend_from_slice(&buf[..n]),
                ReadResult::Empty => {}
                ReadResult::Eof => break,
            }
        }
        out
    }

    #[test]
    fn test_spawn_and_read_until_eof() {
        let pty = PtyBridge::spawn(&sh("printf hello")).unwrap();
        assert!(pty.pid().is_some());
        let out = drain(&pty, Duration::from_secs(5));
        assert!(String::from_utf8_lossy(&out).contains("hello"));
        assert_eq!(pty.wait(Duration::from_secs(5)).unwrap(), WaitStatus::Exited(0));
    }

    #[test]
    fn test_spawn_missing_program_is_spawn_error() {
        let err = PtyBridge::spawn(&SpawnConfig::new("/nonexistent/termbridge-test")).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn test_login_shell_sees_dash_argv0() {
        let pty = PtyBridge::spawn(&SpawnConfig::new("sh").login(true)).unwrap();
        pty.write(b"echo arg0=$0; exit\n").unwrap();
        let out = String::from_utf8_lossy(&drain(&pty, Duration::from_secs(5))).into_owned();
        assert!(out.contains("arg0=-sh"), "{out}");
    }

    #[test]
    fn test_login_shell_rejects_arguments() {
        let err = PtyBridge::spawn(&sh("true").login(true)).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        let err = PtyBridge::spawn(&SpawnConfig::new("/nonexistent/sh").login(true)).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn test_child_gets_cooked_echo_mode() {
        let pty = PtyBridge::spawn(&sh("stty -a; sleep 5")).unwrap();
        let out = String::from_utf8_lossy(&drain(&pty, Duration::from_secs(2))).into_owned();
        assert!(out.contains(" icanon"), "{out}");
        assert!(out.contains(" echo"), "{out}");
        pty.kill().unwrap();
    }

    #[test]
    fn test_write_reaches_child() {
        let pty = PtyBridge::spawn(&sh("read line; echo got:$line")).unwrap();
        pty.write(b"ping\n").unwrap();
        let out = String::from_utf8_lossy(&drain(&pty, Duration::from_secs(5))).into_owned();
        assert!(out.contains("got:ping"), "{out}");
    }

    #[test]
    fn test_resize_updates_dimensions() {
        let pty = PtyBridge::spawn(&sh("sleep 5").dimensions(Dimensions::new(24, 80))).unwrap();
        pty.resize(Dimensions::new(40, 120)).unwrap();
        assert_eq!(pty.dimensions().unwrap(), Dimensions::new(40, 120));
        assert!(pty.resize(Dimensions::new(0, 120)).is_err());
        pty.kill().unwrap();
    }

    #[test]
    fn test_wait_times_out_then_kill_reports_code() {
        let pty = PtyBridge::spawn(&sh("sleep 30")).unwrap();
        assert_eq!(
            pty.wait(Duration::from_millis(50)).unwrap(),
            WaitStatus::TimedOut
        );
        pty.kill().unwrap();
        assert_eq!(
            pty.wait(Duration::from_secs(5)).unwrap(),
            WaitStatus::Exited(128 + libc::SIGKILL)
        );
        assert!(!pty.is_alive());
        assert!(pty.exit_code().is_some());
        // Second kill is a no-op
        pty.kill().unwrap();
    }

    #[test]
    fn test_signal_death_differs_from_exit_one() {
        let exited = PtyBridge::spawn(&sh("exit 1")).unwrap();
        assert_eq!(exited.wait(Duration::from_secs(5)).unwrap(), WaitStatus::Exited(1));

        let killed = PtyBridge::spawn(&sh("sleep 30")).unwrap();
        let pid = killed.pid().unwrap() as libc::pid_t;
        // SAFETY: signalling our own child.
        assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);
        assert_eq!(
            killed.wait(Duration::from_secs(5)).unwrap(),
            WaitStatus::Exited(128 + libc::SIGTERM)
        );
        assert_eq!(killed.exit_code(), Some(143));
    }

    #[test]
    fn test_zero_dimensions_fall_back() {
        let pty = PtyBridge::spawn(&sh("true").dimensions(Dimensions::new(0, 0))).unwrap();
        assert_eq!(pty.dimensions().unwrap(), Dimensions::new(24, 80));
    }
}
