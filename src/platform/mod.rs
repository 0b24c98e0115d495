use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("no se pudo iniciar el proceso: {cmd}"))?;

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("fallo al esperar el proceso: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("tiempo de espera agotado ({timeout:?}): {cmd}"));
        }
    };

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut stderr);
    }

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

#[derive(Debug, Clone)]
pub struct InvokingUser {
    pub uid: u32,
    pub gid: u32,
    pub username: Option<String>,
    pub home_dir: PathBuf,
}

/// Under sudo the audit should still read and write the invoking user's
/// config and logs, not root's.
pub fn invoking_user() -> Option<InvokingUser> {
    let uid = std::env::var("SUDO_UID").ok()?.parse::<u32>().ok()?;
    let gid = std::env::var("SUDO_GID").ok()?.parse::<u32>().ok()?;
    let username = std::env::var("SUDO_USER").ok();
    let home_dir = home_dir_for_uid(uid)?;

    Some(InvokingUser {
        uid,
        gid,
        username,
        home_dir,
    })
}

pub fn effective_home_dir() -> Result<PathBuf> {
    if let Some(user) = invoking_user() {
        return Ok(user.home_dir);
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("la variable de entorno HOME no está definida"))
}

#[cfg(unix)]
fn home_dir_for_uid(uid: u32) -> Option<PathBuf> {
    use std::ffi::CStr;

    unsafe {
        let bufsize = libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX);
        let bufsize = if bufsize <= 0 {
            16 * 1024
        } else {
            bufsize as usize
        };
        let mut buf = vec![0u8; bufsize];
        let mut pwd: libc::passwd = std::mem::zeroed();
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = libc::getpwuid_r(
            uid as libc::uid_t,
            &mut pwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        );
        if rc != 0 || result.is_null() {
            return None;
        }
        if pwd.pw_dir.is_null() {
            return None;
        }

        let dir = CStr::from_ptr(pwd.pw_dir).to_string_lossy().to_string();
        if dir.trim().is_empty() {
            return None;
        }
        Some(PathBuf::from(dir))
    }
}

#[cfg(not(unix))]
fn home_dir_for_uid(_uid: u32) -> Option<PathBuf> {
    None
}
