//! Handles for results of deferred reads.
//!
//! A deferred read hands its caller a [`PendingResult`] or a [`DocumentStream`]
//! immediately. Neither yields anything until the operation runs during a
//! flush of the owning tree's queue.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    channel::{mpsc, oneshot},
    stream::Stream,
};

use docmock_core::{
    error::{MockError, MockResult},
    snapshot::DocumentSnapshot,
};

/// A future resolving to the outcome of a deferred operation.
///
/// The future stays pending until the operation is flushed. Use
/// `futures::FutureExt::now_or_never` on `&mut pending` to check without
/// blocking.
#[derive(Debug)]
#[must_use = "a pending result does nothing unless polled or awaited"]
pub struct PendingResult<T> {
    operation: String,
    receiver: oneshot::Receiver<MockResult<T>>,
}

/// Completes a [`PendingResult`] from inside a deferred callback.
#[derive(Debug)]
pub(crate) struct Resolver<T> {
    sender: oneshot::Sender<MockResult<T>>,
}

impl<T> PendingResult<T> {
    pub(crate) fn channel(operation: &str) -> (Resolver<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            Resolver { sender },
            Self { operation: operation.to_string(), receiver },
        )
    }

    /// Returns the name of the operation this result belongs to.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl<T> Resolver<T> {
    pub(crate) fn resolve(self, result: MockResult<T>) {
        // The caller may have dropped the pending result; nothing to deliver then.
        let _ = self.sender.send(result);
    }
}

impl<T> Future for PendingResult<T> {
    type Output = MockResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| match received {
                Ok(result) => result,
                Err(oneshot::Canceled) => Err(MockError::Dropped(this.operation.clone())),
            })
    }
}

/// A finite stream of per-document snapshots produced by a deferred read.
///
/// Items arrive in result order once the read is flushed, after which the
/// stream ends. A failed read yields a single `Err` item and then ends.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct DocumentStream {
    receiver: mpsc::UnboundedReceiver<MockResult<DocumentSnapshot>>,
}

impl DocumentStream {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<MockResult<DocumentSnapshot>>, Self) {
        let (sender, receiver) = mpsc::unbounded();
        (sender, Self { receiver })
    }
}

impl Stream for DocumentStream {
    type Item = MockResult<DocumentSnapshot>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}
