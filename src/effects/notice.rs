use notify_rust::Notification;
#[cfg(all(unix, not(target_os = "macos")))]
use notify_rust::{Timeout, Urgency};

use crate::effects::{EffectError, Notifier};

pub const APP_NAME: &str = "timeup";

/// Desktop notification through the platform notification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn show_notice(&self, title: &str, message: &str) -> Result<(), EffectError> {
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(title)
            .body(message)
            .icon("alarm-clock");

        #[cfg(all(unix, not(target_os = "macos")))]
        notification
            .urgency(Urgency::Critical)
            .timeout(Timeout::Never);

        notification
            .show()
            .map(|_| ())
            .map_err(|err| EffectError::Notice(err.to_string()))
    }
}
