use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Exit status used when the countdown is interrupted.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

type Release = Box<dyn FnOnce() + Send>;

/// Cleanup that runs at most once, whoever gets there first.
pub struct ReleaseHook {
    action: Mutex<Option<Release>>,
}

impl ReleaseHook {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Runs the cleanup if it has not run yet. Returns whether it ran.
    pub fn release(&self) -> bool {
        let action = match self.action.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

/// Holds the fine timer resolution and, optionally, a sleep inhibitor for
/// the lifetime of the countdown.
pub struct PowerGuard {
    hook: Arc<ReleaseHook>,
}

impl PowerGuard {
    pub fn acquire(no_sleep: bool) -> Self {
        let timer = TimerResolution::raise();
        let inhibitor = if no_sleep { SleepInhibitor::start() } else { None };
        debug!(no_sleep, inhibited = inhibitor.is_some(), "power guard acquired");

        let hook = ReleaseHook::new(move || {
            if let Some(inhibitor) = inhibitor {
                inhibitor.stop();
            }
            timer.restore();
            debug!("power guard released");
        });
        Self {
            hook: Arc::new(hook),
        }
    }

    /// Releases the guard and exits with status 130 on Ctrl-C.
    pub fn release_on_interrupt(&self) -> Result<()> {
        let hook = Arc::clone(&self.hook);
        ctrlc::set_handler(move || {
            hook.release();
            println!();
            std::process::exit(INTERRUPTED_EXIT_CODE);
        })
        .context("failed to install Ctrl-C handler")
    }
}

impl Drop for PowerGuard {
    fn drop(&mut self) {
        self.hook.release();
    }
}

struct TimerResolution {
    #[cfg_attr(not(windows), allow(dead_code))]
    raised: bool,
}

impl TimerResolution {
    #[cfg(windows)]
    fn raise() -> Self {
        use windows_sys::Win32::Media::timeBeginPeriod;

        // SAFETY: plain system call without pointer arguments.
        let raised = unsafe { timeBeginPeriod(1) } == 0;
        Self { raised }
    }

    #[cfg(not(windows))]
    fn raise() -> Self {
        Self { raised: false }
    }

    #[cfg(windows)]
    fn restore(self) {
        use windows_sys::Win32::Media::timeEndPeriod;

        if self.raised {
            // SAFETY: paired with the successful timeBeginPeriod in `raise`.
            unsafe { timeEndPeriod(1) };
        }
    }

    #[cfg(not(windows))]
    fn restore(self) {}
}

enum SleepInhibitor {
    #[cfg_attr(windows, allow(dead_code))]
    Process(Child),
    #[cfg(windows)]
    ExecutionState,
}

impl SleepInhibitor {
    #[cfg(windows)]
    fn start() -> Option<Self> {
        use windows_sys::Win32::System::Power::{
            ES_CONTINUOUS, ES_DISPLAY_REQUIRED, ES_SYSTEM_REQUIRED, SetThreadExecutionState,
        };

        // SAFETY: plain system call without pointer arguments.
        let previous = unsafe {
            SetThreadExecutionState(ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_DISPLAY_REQUIRED)
        };
        if previous == 0 {
            warn!("unable to prevent system sleep");
            return None;
        }
        Some(Self::ExecutionState)
    }

    #[cfg(not(windows))]
    fn start() -> Option<Self> {
        let (program, args) = inhibitor_command(std::process::id());
        match Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => Some(Self::Process(child)),
            Err(err) => {
                warn!("unable to prevent system sleep ({program}: {err})");
                None
            }
        }
    }

    fn stop(self) {
        match self {
            Self::Process(mut child) => {
                if let Err(err) = child.kill() {
                    debug!("sleep inhibitor already gone: {err}");
                }
                let _ = child.wait();
            }
            #[cfg(windows)]
            Self::ExecutionState => {
                use windows_sys::Win32::System::Power::{ES_CONTINUOUS, SetThreadExecutionState};

                // SAFETY: plain system call without pointer arguments.
                unsafe { SetThreadExecutionState(ES_CONTINUOUS) };
            }
        }
    }
}

/// Inhibitor process that also ends on its own once `pid` is gone.
#[cfg_attr(windows, allow(dead_code))]
fn inhibitor_command(pid: u32) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("caffeinate", vec!["-di".into(), "-w".into(), pid.to_string()])
    } else {
        (
            "systemd-inhibit",
            vec![
                "--what=idle:sleep".into(),
                "--who=timeup".into(),
                "--why=Countdown running".into(),
                "--mode=block".into(),
                "tail".into(),
                format!("--pid={pid}"),
                "-f".into(),
                "/dev/null".into(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn release_hook_runs_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let hook = ReleaseHook::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hook.release());
        assert!(!hook.release());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_releases_run_cleanup_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let hook = Arc::new(ReleaseHook::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let handles = (0..8)
            .map(|_| {
                let hook = Arc::clone(&hook);
                thread::spawn(move || hook.release())
            })
            .collect::<Vec<_>>();
        let ran = handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .filter(|ran| *ran)
            .count();

        assert_eq!(ran, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_without_sleep_suppression_releases_on_drop() {
        let guard = PowerGuard::acquire(false);
        let hook = Arc::clone(&guard.hook);
        drop(guard);
        assert!(!hook.release());
    }

    #[test]
    fn inhibitor_watches_own_process() {
        let (program, args) = inhibitor_command(4242);
        assert!(!program.is_empty());
        assert!(args.iter().any(|arg| arg.contains("4242")));
    }
}
