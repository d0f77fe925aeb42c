use std::time::Duration;

use tokio::time::sleep;

use super::error::WidgetError;
use super::loader::{FrameLoad, FrameSignal};

/// Race the frame's load signal against `timeout`. Whichever settles first
/// decides the outcome; the loser is dropped, so a late signal goes nowhere.
pub async fn race_load(load: FrameLoad, timeout: Duration) -> Result<(), WidgetError> {
    let receiver = load.into_receiver();
    tokio::select! {
        signal = receiver => match signal {
            Ok(FrameSignal::Loaded) => Ok(()),
            Ok(FrameSignal::Failed(reason)) => Err(WidgetError::LoadFailed(reason)),
            Err(_) => Err(WidgetError::LoadFailed(String::from("frame loader abandoned the load"))),
        },
        _ = sleep(timeout) => Err(WidgetError::LoadTimeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn load_before_timeout_wins() {
        let (tx, load) = FrameLoad::channel();
        tx.send(FrameSignal::Loaded).unwrap();
        race_load(load, Duration::from_secs(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn error_signal_settles_early() {
        let (tx, load) = FrameLoad::channel();
        let start = Instant::now();
        tx.send(FrameSignal::Failed("dns".into())).unwrap();
        let err = race_load(load, Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, WidgetError::LoadFailed(reason) if reason == "dns"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_frame_times_out() {
        let (tx, load) = FrameLoad::channel();
        let start = Instant::now();
        let err = race_load(load, Duration::from_millis(10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, WidgetError::LoadTimeout(t) if t == Duration::from_millis(10_000)));
        assert!(start.elapsed() >= Duration::from_millis(10_000));

        // The race is over; the late signal has no receiver.
        assert!(tx.send(FrameSignal::Loaded).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn signal_arriving_mid_wait_wins() {
        let (tx, load) = FrameLoad::channel();
        let settle = async move {
            sleep(Duration::from_secs(3)).await;
            tx.send(FrameSignal::Loaded).unwrap();
        };
        let (outcome, ()) = tokio::join!(race_load(load, Duration::from_secs(10)), settle);
        outcome.unwrap();
    }

    #[tokio::test]
    async fn dropped_sender_fails_the_load() {
        let (tx, load) = FrameLoad::channel();
        drop(tx);
        let err = race_load(load, Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, WidgetError::LoadFailed(_)));
    }
}
