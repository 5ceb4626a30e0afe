use std::ffi::OsString;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use std::process::Command;

use launchpad_core::LaunchError;

#[cfg(unix)]
pub const UNIX_ELEVATION_PROGRAM: &str = "sudo";

pub fn is_elevated() -> bool {
    platform::is_elevated()
}

/// Asks the OS to start this program again, elevated, with the current arguments plus
/// `extra_args`. Returns as soon as the request is issued (on Unix, after sudo has
/// validated credentials); the caller is expected to exit right away. Nothing links the
/// two processes afterwards.
pub fn relaunch_elevated(extra_args: &[OsString]) -> Result<(), LaunchError> {
    let current_exe = std::env::current_exe().map_err(|err| {
        LaunchError::ElevationRequestFailed(format!(
            "failed to resolve current executable: {err}"
        ))
    })?;
    let cwd = std::env::current_dir().map_err(|err| {
        LaunchError::ElevationRequestFailed(format!(
            "failed to resolve working directory: {err}"
        ))
    })?;
    let args = build_relaunch_args(std::env::args_os().skip(1), extra_args);
    platform::request_elevated_launch(&current_exe, &args, &cwd)
}

pub fn build_relaunch_args<I>(current: I, extra_args: &[OsString]) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    current
        .into_iter()
        .chain(extra_args.iter().cloned())
        .collect()
}

const QUOTE: u16 = b'"' as u16;
const BACKSLASH: u16 = b'\\' as u16;
const SPACE: u16 = b' ' as u16;
const TAB: u16 = b'\t' as u16;
const NEWLINE: u16 = b'\n' as u16;

/// Quotes one UTF-16 argument so `CommandLineToArgvW` splits it back unchanged. Works on
/// raw code units, so arguments that are not valid Unicode are forwarded as-is.
pub fn quote_windows_arg(arg: &[u16]) -> Vec<u16> {
    let needs_quotes =
        arg.is_empty() || arg.iter().any(|unit| matches!(*unit, SPACE | TAB | NEWLINE | QUOTE));
    if !needs_quotes {
        return arg.to_vec();
    }

    let mut quoted = Vec::with_capacity(arg.len() + 2);
    quoted.push(QUOTE);
    let mut backslashes = 0_usize;
    for &unit in arg {
        match unit {
            BACKSLASH => backslashes += 1,
            QUOTE => {
                quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes * 2 + 1));
                quoted.push(QUOTE);
                backslashes = 0;
            }
            _ => {
                quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes));
                quoted.push(unit);
                backslashes = 0;
            }
        }
    }
    quoted.extend(std::iter::repeat(BACKSLASH).take(backslashes * 2));
    quoted.push(QUOTE);
    quoted
}

pub fn join_windows_args<A: AsRef<[u16]>>(args: &[A]) -> Vec<u16> {
    let mut joined = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            joined.push(SPACE);
        }
        joined.extend(quote_windows_arg(arg.as_ref()));
    }
    joined
}

/// Validates (and caches) sudo credentials while this process still owns the terminal.
#[cfg(unix)]
pub fn build_unix_credential_check() -> Command {
    let mut command = Command::new(UNIX_ELEVATION_PROGRAM);
    command.arg("-v");
    command
}

/// The relaunched copy outlives this process, so it must never prompt: `-n` makes sudo
/// fail instead of reading a terminal it no longer controls.
#[cfg(unix)]
pub fn build_unix_elevation_command(exe: &Path, args: &[OsString], cwd: &Path) -> Command {
    let mut command = Command::new(UNIX_ELEVATION_PROGRAM);
    command.arg("-n").arg("--").arg(exe).args(args).current_dir(cwd);
    command
}

#[cfg(windows)]
mod platform {
    use std::ffi::{c_void, OsStr, OsString};
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use launchpad_core::LaunchError;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
    use windows_sys::Win32::UI::Shell::ShellExecuteW;
    use windows_sys::Win32::UI::WindowsAndMessaging::SW_HIDE;

    use super::join_windows_args;

    fn wide(value: &OsStr) -> Vec<u16> {
        value.encode_wide().chain(std::iter::once(0)).collect()
    }

    pub(super) fn is_elevated() -> bool {
        unsafe {
            let mut token: HANDLE = std::ptr::null_mut();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
                return false;
            }

            let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
            let mut returned = 0_u32;
            let ok = GetTokenInformation(
                token,
                TokenElevation,
                &mut elevation as *mut TOKEN_ELEVATION as *mut c_void,
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            );
            CloseHandle(token);
            ok != 0 && elevation.TokenIsElevated != 0
        }
    }

    pub(super) fn request_elevated_launch(
        exe: &Path,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<(), LaunchError> {
        let verb = wide(OsStr::new("runas"));
        let file = wide(exe.as_os_str());
        let units = args
            .iter()
            .map(|arg| arg.encode_wide().collect::<Vec<u16>>())
            .collect::<Vec<_>>();
        let mut parameters = join_windows_args(&units);
        parameters.push(0);
        let directory = wide(cwd.as_os_str());

        let instance = unsafe {
            ShellExecuteW(
                std::ptr::null_mut(),
                verb.as_ptr(),
                file.as_ptr(),
                parameters.as_ptr(),
                directory.as_ptr(),
                SW_HIDE,
            )
        };

        // Values above 32 mean the request was accepted.
        let code = instance as isize;
        if code > 32 {
            return Ok(());
        }
        Err(LaunchError::ElevationRequestFailed(format!(
            "ShellExecuteW(runas) returned {code} for {}",
            exe.display()
        )))
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::OsString;
    use std::path::Path;

    use launchpad_core::LaunchError;

    use super::{build_unix_credential_check, build_unix_elevation_command, UNIX_ELEVATION_PROGRAM};

    pub(super) fn is_elevated() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    pub(super) fn request_elevated_launch(
        exe: &Path,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<(), LaunchError> {
        let status = build_unix_credential_check().status().map_err(|err| {
            LaunchError::ElevationRequestFailed(format!(
                "failed to start {UNIX_ELEVATION_PROGRAM}: {err}"
            ))
        })?;
        if !status.success() {
            return Err(LaunchError::ElevationRequestFailed(format!(
                "{UNIX_ELEVATION_PROGRAM} -v was refused ({status})"
            )));
        }

        build_unix_elevation_command(exe, args, cwd)
            .spawn()
            .map(|_child| ())
            .map_err(|err| {
                LaunchError::ElevationRequestFailed(format!(
                    "failed to start {UNIX_ELEVATION_PROGRAM}: {err}"
                ))
            })
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    use std::ffi::OsString;
    use std::path::Path;

    use launchpad_core::LaunchError;

    pub(super) fn is_elevated() -> bool {
        false
    }

    pub(super) fn request_elevated_launch(
        _exe: &Path,
        _args: &[OsString],
        _cwd: &Path,
    ) -> Result<(), LaunchError> {
        Err(LaunchError::ElevationRequestFailed(
            "privilege elevation is not supported on this platform".to_string(),
        ))
    }
}
