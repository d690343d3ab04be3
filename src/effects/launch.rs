use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::effects::{EffectError, Launcher};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_with_default_handler(&self, path: &Path) -> Result<(), EffectError> {
        let (program, args) = opener_command(path);
        debug!(program, path = %path.display(), "opening file");
        let status = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| spawn_error(program, source))?;
        if status.success() {
            Ok(())
        } else {
            Err(EffectError::Failed {
                program: program.to_string(),
                status: status.to_string(),
            })
        }
    }

    fn run_and_wait(&self, command: &str) -> Result<Option<i32>, EffectError> {
        let (program, args) = shell_command(command);
        debug!(program, command, "running command");
        let status = Command::new(program)
            .args(&args)
            .status()
            .map_err(|source| spawn_error(program, source))?;
        Ok(status.code())
    }
}

fn spawn_error(program: &str, source: io::Error) -> EffectError {
    EffectError::Spawn {
        program: program.to_string(),
        source,
    }
}

/// Platform command that hands `path` to its default application.
pub fn opener_command(path: &Path) -> (&'static str, Vec<OsString>) {
    let file = path.as_os_str().to_os_string();
    if cfg!(windows) {
        (
            "cmd",
            vec![
                OsString::from("/C"),
                OsString::from("start"),
                OsString::from(""),
                file,
            ],
        )
    } else if cfg!(target_os = "macos") {
        ("open", vec![file])
    } else {
        ("xdg-open", vec![file])
    }
}

/// Platform shell invocation for a free-form command line.
pub fn shell_command(command: &str) -> (&'static str, Vec<OsString>) {
    if cfg!(windows) {
        ("cmd", vec![OsString::from("/C"), OsString::from(command)])
    } else {
        ("sh", vec![OsString::from("-c"), OsString::from(command)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_command_passes_line_verbatim() {
        let (_, args) = shell_command("echo 'a b' && true");
        assert_eq!(args.last(), Some(&OsString::from("echo 'a b' && true")));
    }

    #[test]
    fn opener_ends_with_target_path() {
        let (program, args) = opener_command(Path::new("notes.txt"));
        assert!(!program.is_empty());
        assert_eq!(args.last(), Some(&OsString::from("notes.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn run_and_wait_reports_exit_code() {
        let launcher = SystemLauncher;
        assert_eq!(launcher.run_and_wait("true").expect("runs"), Some(0));
        assert_eq!(launcher.run_and_wait("exit 7").expect("runs"), Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn run_and_wait_reports_signal_as_no_code() {
        let launcher = SystemLauncher;
        assert_eq!(launcher.run_and_wait("kill -9 $$").expect("runs"), None);
    }
}
