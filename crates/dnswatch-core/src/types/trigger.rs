use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy deciding when a record's verdict is worth a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyTrigger {
    /// New verdict differs from the previous one
    Changed,
    /// New verdict is dead
    #[serde(alias = "latestDown")]
    LatestDown,
    /// New verdict is alive
    #[serde(alias = "latestUp")]
    LatestUp,
}

impl NotifyTrigger {
    /// Returns true if this policy fires for the given change
    #[must_use]
    pub const fn fires(self, change: AliveChange) -> bool {
        match self {
            Self::Changed => change.previous != change.current,
            Self::LatestDown => !change.current,
            Self::LatestUp => change.current,
        }
    }

    /// Policy name as written in configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::LatestDown => "latest-down",
            Self::LatestUp => "latest-up",
        }
    }
}

impl fmt::Display for NotifyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Previous and new published alive value of one evaluation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliveChange {
    /// Value replaced by this cycle
    pub previous: bool,
    /// Value written by this cycle
    pub current: bool,
}

impl AliveChange {
    /// Returns true if the value flipped
    #[must_use]
    pub const fn changed(self) -> bool {
        self.previous != self.current
    }
}

/// Returns true if any of `triggers` fires for `change`.
///
/// An empty trigger list never fires.
#[must_use]
pub fn should_notify(triggers: &[NotifyTrigger], change: AliveChange) -> bool {
    triggers.iter().any(|trigger| trigger.fires(change))
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn change(previous: bool, current: bool) -> AliveChange {
        AliveChange { previous, current }
    }

    #[test]
    fn test_changed() {
        assert!(NotifyTrigger::Changed.fires(change(true, false)));
        assert!(NotifyTrigger::Changed.fires(change(false, true)));
        assert!(!NotifyTrigger::Changed.fires(change(false, false)));
        assert!(!NotifyTrigger::Changed.fires(change(true, true)));
    }

    #[test]
    fn test_latest_down() {
        assert!(NotifyTrigger::LatestDown.fires(change(true, false)));
        assert!(NotifyTrigger::LatestDown.fires(change(false, false)));
        assert!(!NotifyTrigger::LatestDown.fires(change(false, true)));
        assert!(!NotifyTrigger::LatestDown.fires(change(true, true)));
    }

    #[test]
    fn test_latest_up() {
        assert!(NotifyTrigger::LatestUp.fires(change(false, true)));
        assert!(NotifyTrigger::LatestUp.fires(change(true, true)));
        assert!(!NotifyTrigger::LatestUp.fires(change(true, false)));
        assert!(!NotifyTrigger::LatestUp.fires(change(false, false)));
    }

    #[test]
    fn test_trigger_lists() {
        assert!(!should_notify(&[], change(true, false)));
        let both = [NotifyTrigger::LatestUp, NotifyTrigger::Changed];
        assert!(should_notify(&both, change(true, false)));
        assert!(should_notify(&both, change(true, true)));
        assert!(!should_notify(&both, change(false, false)));
    }

    #[test]
    fn test_trigger_names() {
        let parsed: Vec<NotifyTrigger> =
            serde_json::from_str(r#"["changed", "latest-down", "latestUp"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                NotifyTrigger::Changed,
                NotifyTrigger::LatestDown,
                NotifyTrigger::LatestUp
            ]
        );
        assert!(serde_json::from_str::<NotifyTrigger>(r#""sometimes""#).is_err());
    }
}
