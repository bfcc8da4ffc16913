use std::fmt;

use tokio::sync::watch;

/// Lifecycle of a push channel.
///
/// `Init -> Connecting -> Open -> {Closed | Error}`. Leaving `Error` is
/// always a fresh `Connecting`, either requested by the owner or scheduled
/// by a backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Init,
    Connecting,
    Open,
    Closed,
    Error,
}

impl ChannelState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Move to `next` unless the owner already closed the channel.
pub(crate) fn advance(state: &watch::Sender<ChannelState>, next: ChannelState) -> bool {
    state.send_if_modified(|current| {
        if *current == ChannelState::Closed || *current == next {
            return false;
        }
        *current = next;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_and_error_are_terminal() {
        let terminal: Vec<_> = [
            ChannelState::Init,
            ChannelState::Connecting,
            ChannelState::Open,
            ChannelState::Closed,
            ChannelState::Error,
        ]
        .into_iter()
        .filter(|s| s.is_terminal())
        .collect();
        assert_eq!(terminal, vec![ChannelState::Closed, ChannelState::Error]);
    }

    #[test]
    fn advance_never_leaves_closed() {
        let (tx, _rx) = watch::channel(ChannelState::Open);
        assert!(advance(&tx, ChannelState::Error));
        assert!(!advance(&tx, ChannelState::Error));
        tx.send_replace(ChannelState::Closed);
        assert!(!advance(&tx, ChannelState::Error));
        assert_eq!(*tx.borrow(), ChannelState::Closed);
    }
}
