use std::future::Future;

use tokio::sync::mpsc::{self, UnboundedSender};

/// A cancellable background task. Dropping the handle, or sending
/// `TaskMessage::Cancel`, stops the underlying future at its next
/// `select!` poll; this is how the reader task and the TCP-connect task
/// are torn down when a peer's driver loop exits.
#[derive(Debug)]
pub struct Task {
    tx: UnboundedSender<TaskMessage>,
}

#[derive(Debug)]
enum TaskMessage {
    Cancel,
}

impl Task {
    pub fn spawn<F, Fut>(cb: F) -> Task
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            tokio::select! {
                _ = cb() => {}
                _ = rx.recv() => {}
            }
        });
        Task { tx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(TaskMessage::Cancel);
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.cancel();
    }
}
