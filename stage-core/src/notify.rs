//! User-visible outcome notifications for store writes.

use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Failure(String),
}

impl Notice {
    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failure(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Failure(m) => m,
        }
    }
}

/// Sink for notices. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log only.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(m) => tracing::info!(notice = %m, "success"),
            Notice::Failure(m) => tracing::warn!(notice = %m, "failure"),
        }
    }
}

/// Forwards notices to whoever holds the receiving end.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("notice dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_delivers_in_order() {
        let (n, mut rx) = ChannelNotifier::new();
        n.notify(Notice::Success("saved".into()));
        n.notify(Notice::Failure("offline".into()));
        assert_eq!(rx.try_recv().unwrap(), Notice::Success("saved".into()));
        let second = rx.try_recv().unwrap();
        assert!(second.is_failure());
        assert_eq!(second.message(), "offline");
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (n, rx) = ChannelNotifier::new();
        drop(rx);
        n.notify(Notice::Success("nobody listening".into()));
    }
}
