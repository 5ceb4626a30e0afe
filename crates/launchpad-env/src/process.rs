use std::io;
use std::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub(crate) fn hide_console_window(command: &mut Command) {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    let _ = command;
}

/// Blocks until the child exits. There is no timeout.
pub(crate) fn wait_for_exit_code(command: &mut Command) -> io::Result<Option<i32>> {
    command.status().map(|status| status.code())
}
