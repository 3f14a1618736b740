use crate::{
    action::{is_key_name, Action},
    error::Error,
};
use std::time::Duration;
use tracing::{info, warn};

pub(crate) trait Dispatch {
    fn key_down(&mut self, key: &str) -> Result<(), Error>;

    fn key_up(&mut self, key: &str) -> Result<(), Error>;

    /// Hold every key of `actions` in order, then release them in reverse.
    ///
    /// Every key that went down is released, even when a press or a release
    /// fails. The first failure is returned.
    fn dispatch(&mut self, actions: &[Action]) -> Result<(), Error> {
        let keys = actions.iter().flat_map(Action::keys).collect::<Vec<_>>();

        let mut result = Ok(());
        let mut pressed = 0;
        for key in &keys {
            if let Err(e) = self.key_down(key) {
                result = Err(e);
                break;
            }
            pressed += 1;
        }

        for key in keys[..pressed].iter().rev() {
            if let Err(e) = self.key_up(key) {
                warn!(key = *key, error = %e, "failed releasing key");
                result = result.and(Err(e));
            }
        }
        result
    }
}

/// Logs key events instead of injecting them, pausing after each one the
/// way an injector paces itself.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DryRun {
    pause: Duration,
}

impl DryRun {
    pub(crate) fn new(pause: Duration) -> Self {
        Self { pause }
    }

    fn emit(&self, event: &'static str, key: &str) -> Result<(), Error> {
        if !is_key_name(key) {
            return Err(Error::InvalidKey(key.to_owned()));
        }
        info!(event, key, "dispatch");
        if !self.pause.is_zero() {
            std::thread::sleep(self.pause);
        }
        Ok(())
    }
}

impl Dispatch for DryRun {
    fn key_down(&mut self, key: &str) -> Result<(), Error> {
        self.emit("key_down", key)
    }

    fn key_up(&mut self, key: &str) -> Result<(), Error> {
        self.emit("key_up", key)
    }
}
