//! Integration tests for pulse and recurring triggers.
//!
//! Every test runs on a paused clock, so sleeps advance virtual time and the
//! timing assertions do not depend on scheduler load.

use hearth::{Error, Pulse, Recurring, Trigger};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};

mod pulse_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let (tx, rx) = oneshot::channel();
        let started = Instant::now();
        let _pulse = Pulse::new(Duration::from_millis(10), move || async move {
            let _ = tx.send(Instant::now());
            Ok(())
        })
        .unwrap();

        let fired_at = rx.await.unwrap();
        assert!(fired_at.duration_since(started) >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_within_the_window_prevents_firing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pulse = Pulse::new(Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        sleep(Duration::from_millis(10)).await;
        pulse.close();
        sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!pulse.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        drop(
            Pulse::new(Duration::from_millis(20), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap(),
        );
        sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

mod recurring_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stops_re_arming_after_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let trigger = Recurring::new(Duration::from_millis(10), move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call >= 2 {
                    Err(Error::internal("tick failed"))
                } else {
                    Ok(())
                }
            }
        })
        .unwrap();

        sleep(Duration::from_millis(250)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!trigger.is_running());
        // Closing after the trigger stopped itself is still fine
        trigger.close();
    }

    #[tokio::test(start_paused = true)]
    async fn close_does_not_interrupt_a_running_handler() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);
        let (started_tx, started_rx) = oneshot::channel();
        let mut started_tx = Some(started_tx);

        let trigger = Recurring::new(Duration::from_millis(5), move || {
            let started = started_tx.take();
            let done = Arc::clone(&done);
            async move {
                if let Some(started) = started {
                    let _ = started.send(());
                }
                sleep(Duration::from_millis(40)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

        started_rx.await.unwrap();
        trigger.close();
        assert!(!trigger.is_running());

        sleep(Duration::from_millis(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_fixed_at_construction() {
        let trigger = Recurring::new(Duration::from_millis(250), || async { Ok(()) }).unwrap();
        assert_eq!(trigger.delay(), Duration::from_millis(250));
        assert!(trigger.is_running());
        trigger.close();
    }
}
