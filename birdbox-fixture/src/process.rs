use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    time::Duration,
};

use color_eyre::eyre::{Result, WrapErr};
use nix::{
    sys::{
        signal::{self, Signal},
        wait::waitpid,
    },
    unistd::Pid,
};
use tracing::{info, warn};

/// How long a spawned server gets to exit after SIGTERM before it is killed.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const LOG_TAIL_BYTES: u64 = 8 * 1024;

/// A server running as a child process, with its output captured in a log
/// file that outlives the run for debugging.
///
/// Dropping a handle that was never stopped still kills the child, so an
/// error between spawn and stop cannot leak a running server.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    log_path: PathBuf,
    stopped: bool,
}

impl ProcessHandle {
    /// Spawn `program` with the given environment. `port` is exported as
    /// `PORT`, which the server reads as its listen port.
    pub fn spawn(
        program: &Path,
        args: &[&str],
        env: &BTreeMap<String, String>,
        port: u16,
    ) -> Result<Self> {
        let (log_file, log_path) = tempfile::NamedTempFile::new()
            .wrap_err("creating server log file")?
            .keep()
            .wrap_err("keeping server log file")?;
        let stdout_log = log_file.try_clone().wrap_err("cloning log file handle")?;

        info!(
            program = %program.display(),
            port,
            log = %log_path.display(),
            "spawning server process"
        );

        let child = Command::new(program)
            .args(args)
            .envs(env)
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(stdout_log)
            .stderr(log_file)
            .spawn()
            .wrap_err_with(|| format!("failed to spawn server: {}", program.display()))?;

        Ok(Self {
            child,
            log_path,
            stopped: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Whether the process has already exited on its own.
    pub fn is_dead(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => false,
            Ok(Some(status)) => {
                warn!(%status, "server process exited");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to query server process status");
                true
            }
        }
    }

    /// Tail of the captured server output, for startup failure reports.
    pub fn log_tail(&self) -> String {
        let Ok(mut file) = File::open(&self.log_path) else {
            return String::new();
        };

        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if len > LOG_TAIL_BYTES {
            use std::io::{Seek, SeekFrom};
            let _ = file.seek(SeekFrom::End(-(LOG_TAIL_BYTES as i64)));
        }

        let mut buf = Vec::new();
        let _ = file.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// SIGTERM, a bounded wait, then SIGKILL.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }

        let pid = Pid::from_raw(self.child.id() as i32);
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) if wait_for_exit(pid, GRACEFUL_STOP_TIMEOUT).is_ok() => {
                info!("server stopped on SIGTERM");
                return;
            }
            Ok(()) => warn!("server did not exit on SIGTERM in time, killing it"),
            Err(e) => warn!(error = %e, "failed to send SIGTERM to server"),
        }

        if let Err(e) = signal::kill(pid, Signal::SIGKILL) {
            warn!(error = %e, "failed to send SIGKILL to server");
        }
        let _ = self.child.wait();
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn wait_for_exit(pid: Pid, timeout: Duration) -> Result<(), ()> {
    // waitpid has no timeout of its own, so park it on a thread and bound
    // the wait through a channel.
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(waitpid(pid, None).map(|_| ()));
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to wait for server process");
            Err(())
        }
        Err(_) => Err(()),
    }
}
