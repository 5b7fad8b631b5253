// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for pending change tracking.

#[cfg(test)]
mod tests {
    use crate::pending::*;
    use crate::provider::memory::MemoryProvider;
    use std::sync::Arc;
    use std::time::Duration;

    fn poller(provider: Arc<MemoryProvider>, capacity: usize) -> (PendingChanges, ChangePoller) {
        let (queue, receiver) = pending_queue(capacity);
        let poller = ChangePoller::new(
            provider,
            receiver,
            queue.clone(),
            Duration::from_millis(10),
        );
        (queue, poller)
    }

    #[test]
    fn test_overflow_drops_without_blocking() {
        let (queue, _receiver) = pending_queue(2);

        assert!(queue.offer("C1".to_string()));
        assert!(queue.offer("C2".to_string()));
        assert!(!queue.offer("C3".to_string()), "third ID exceeds capacity");
        assert!(!queue.offer("C4".to_string()));
    }

    #[test]
    fn test_offer_after_receiver_dropped() {
        let (queue, receiver) = pending_queue(2);
        drop(receiver);
        assert!(!queue.offer("C1".to_string()));
    }

    #[tokio::test]
    async fn test_poll_empty_queue_is_idle() {
        let provider = Arc::new(MemoryProvider::new());
        let (_queue, mut poller) = poller(provider, 4);
        assert_eq!(poller.poll_once().await, PollOutcome::Idle);
    }

    #[tokio::test]
    async fn test_pending_change_is_requeued_until_terminal() {
        let provider = Arc::new(MemoryProvider::new());
        provider.script_status("C7", &["PENDING", "PENDING", "INSYNC"]);
        let (queue, mut poller) = poller(provider.clone(), 4);

        assert!(queue.offer("C7".to_string()));

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::StillPending("C7".to_string())
        );
        assert_eq!(
            poller.poll_once().await,
            PollOutcome::StillPending("C7".to_string())
        );
        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Completed {
                change_id: "C7".to_string(),
                status: "INSYNC".to_string()
            }
        );
        assert_eq!(poller.poll_once().await, PollOutcome::Idle);
    }

    #[tokio::test]
    async fn test_status_error_discards_change() {
        let provider = Arc::new(MemoryProvider::new());
        let (queue, mut poller) = poller(provider, 4);

        assert!(queue.offer("unknown".to_string()));
        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Failed("unknown".to_string())
        );
        assert_eq!(poller.poll_once().await, PollOutcome::Idle);
    }
}
