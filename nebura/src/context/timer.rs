use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(PartialEq)]
enum TimerType {
    Once,
    Repeat,
}

enum TimerMessage {
    Cancel,
    Refresh,
}

/// A timer that delivers its callback by spawning it on the runtime.
/// `once` fires a single time; `repeat` re-arms itself after every fire.
/// `refresh` resets the deadline without cancelling the timer, used to
/// implement hold-timer resets on every message received from a peer.
pub struct Timer {
    tx: UnboundedSender<TimerMessage>,
}

impl Timer {
    pub fn once<F, Fut>(secs: u64, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        Timer::spawn(Duration::from_secs(secs), TimerType::Once, callback)
    }

    pub fn repeat<F, Fut>(secs: u64, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        Timer::spawn(Duration::from_secs(secs), TimerType::Repeat, callback)
    }

    fn spawn<F, Fut>(duration: Duration, typ: TimerType, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(duration);
            interval.reset();
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        callback().await;
                        if typ == TimerType::Once {
                            break;
                        }
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(TimerMessage::Cancel) | None => break,
                            Some(TimerMessage::Refresh) => {
                                interval = tokio::time::interval(duration);
                                interval.reset();
                            }
                        }
                    }
                }
            }
        });
        Timer { tx }
    }

    pub fn refresh(&self) {
        let _ = self.tx.send(TimerMessage::Refresh);
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(TimerMessage::Cancel);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
