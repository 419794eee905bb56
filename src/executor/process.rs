use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    path::Path,
    process::{Child, Command as StdCommand, Stdio},
    thread,
};

use crate::executor::ExecutorError;

/// Starts `sh -c cmd` with extra environment and returns without waiting.
/// Output goes to `<log_dir>/<label>_stdout.log` / `_stderr.log`; a
/// monitor thread logs the exit status.
pub fn spawn_detached(
    cmd: &str,
    env: &BTreeMap<String, String>,
    log_dir: &Path,
    label: &str,
) -> Result<u32, ExecutorError> {
    let spawn_err = |source| ExecutorError::Spawn {
        cmd: cmd.to_string(),
        source,
    };

    std::fs::create_dir_all(log_dir).map_err(spawn_err)?;
    let stdout_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join(format!("{}_stdout.log", label)))
        .map_err(spawn_err)?;
    let stderr_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join(format!("{}_stderr.log", label)))
        .map_err(spawn_err)?;

    log::info!("Executing shell command ({}): {}", label, cmd);

    let child = StdCommand::new("sh")
        .arg("-c")
        .arg(cmd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .map_err(spawn_err)?;

    let pid = child.id();
    log::info!("{} spawned (PID: {})", label, pid);

    let label = label.to_string();
    thread::spawn(move || monitor(child, label));

    Ok(pid)
}

fn monitor(mut child: Child, label: String) {
    match child.wait() {
        Ok(status) => {
            let exit_code = status.code().unwrap_or(-1);
            if exit_code == 0 {
                log::info!("{} completed", label);
            } else {
                log::error!("{} failed with exit code: {}", label, exit_code);
            }
        }
        Err(e) => log::error!("{} wait error: {}", label, e),
    }
}

/// Runs `sh -c cmd` with `arg` as `$1` and waits for it to finish.
pub fn run_with_arg(cmd: &str, arg: &Path) -> Result<(), ExecutorError> {
    let status = StdCommand::new("sh")
        .arg("-c")
        .arg(format!("{} \"$1\"", cmd))
        .arg("sh")
        .arg(arg)
        .stdin(Stdio::null())
        .status()
        .map_err(|source| ExecutorError::Spawn {
            cmd: cmd.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ExecutorError::Failed {
            cmd: cmd.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}
