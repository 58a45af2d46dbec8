use super::types::MonitorStatus;

/// Incident-relevant edge between two consecutive statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Entered `down` from anything else
    Opened,
    /// Left `down` for `up`
    Closed,
}

/// Classify the status change produced by a probe.
///
/// Only the up/down edge matters. `pending` and `maintenance` never close an
/// incident, so a freshly created or resumed monitor coming up is silent,
/// while coming up `down` opens one.
pub fn classify(previous: MonitorStatus, new: MonitorStatus) -> Transition {
    match (previous, new) {
        (MonitorStatus::Down, MonitorStatus::Down) => Transition::None,
        (_, MonitorStatus::Down) => Transition::Opened,
        (MonitorStatus::Down, MonitorStatus::Up) => Transition::Closed,
        _ => Transition::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MonitorStatus::*;

    #[test]
    fn test_opened_only_when_entering_down() {
        assert_eq!(classify(Up, Down), Transition::Opened);
        assert_eq!(classify(Pending, Down), Transition::Opened);
        assert_eq!(classify(Maintenance, Down), Transition::Opened);
        assert_eq!(classify(Down, Down), Transition::None);
    }

    #[test]
    fn test_closed_only_from_down_to_up() {
        assert_eq!(classify(Down, Up), Transition::Closed);
        assert_eq!(classify(Pending, Up), Transition::None);
        assert_eq!(classify(Maintenance, Up), Transition::None);
        assert_eq!(classify(Up, Up), Transition::None);
    }

    #[test]
    fn test_non_probe_targets_never_transition() {
        for previous in [Up, Down, Pending, Paused, Maintenance] {
            assert_eq!(classify(previous, Maintenance), Transition::None);
            assert_eq!(classify(previous, Pending), Transition::None);
        }
    }
}
