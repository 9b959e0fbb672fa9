//! Push-mode element delivery.
//!
//! One producer task per session drives the source and the pipeline, sending
//! each element into a bounded channel. A full channel suspends the producer
//! before its next read, so a slow consumer throttles how fast the source is
//! read. Closing the receiving side stops the producer at its next suspension
//! point and drops the source.
use core::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::ConvertError, pull::Elements, transport::ByteSource};

/// How a producer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The array closed and every element was sent.
    Completed { delivered: usize },
    /// The consumer closed the channel first.
    Cancelled { delivered: usize },
    /// The stream ended with an error, which was sent as the last item.
    Failed { delivered: usize },
    /// The producer task panicked or was aborted by the runtime.
    Aborted,
}

impl SessionOutcome {
    /// Whether the session ended in failure. Cancellation by the consumer is
    /// not a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Aborted)
    }

    /// Elements sent before the session ended, if the task ran to an end.
    #[must_use]
    pub fn delivered(&self) -> Option<usize> {
        match *self {
            Self::Completed { delivered } | Self::Cancelled { delivered } | Self::Failed { delivered } => {
                Some(delivered)
            }
            Self::Aborted => None,
        }
    }
}

/// Consuming end of a push-mode element stream.
///
/// Items arrive in source order. A failure arrives as a final `Err` item,
/// after which [`ElementReceiver::recv`] returns `None`.
#[derive(Debug)]
pub struct ElementReceiver<T> {
    rx: mpsc::Receiver<Result<T, ConvertError>>,
    task: Option<JoinHandle<SessionOutcome>>,
    cancelled: bool,
}

/// Spawns the producer for `elements` on the current tokio runtime.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub(crate) fn spawn<T, R>(elements: Elements<T, R>, capacity: usize) -> ElementReceiver<T>
where
    T: Send + 'static,
    R: ByteSource + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(produce(elements, tx));
    ElementReceiver {
        rx,
        task: Some(task),
        cancelled: false,
    }
}

async fn produce<T, R>(mut elements: Elements<T, R>, tx: mpsc::Sender<Result<T, ConvertError>>) -> SessionOutcome
where
    T: Send + 'static,
    R: ByteSource,
{
    tracing::debug!("element producer started");
    let mut delivered = 0;
    loop {
        let item = tokio::select! {
            biased;

            () = tx.closed() => {
                tracing::debug!(delivered, "element consumer cancelled");
                return SessionOutcome::Cancelled { delivered };
            }

            item = elements.next_element() => item,
        };

        let Some(item) = item else {
            tracing::debug!(delivered, "element producer completed");
            return SessionOutcome::Completed { delivered };
        };

        let failed = match &item {
            Ok(_) => false,
            Err(err) => {
                tracing::warn!(error = %err, delivered, "element stream failed");
                true
            }
        };

        // Waits for capacity; no further chunk is read meanwhile.
        if tx.send(item).await.is_err() {
            tracing::debug!(delivered, "element consumer cancelled");
            return SessionOutcome::Cancelled { delivered };
        }
        if failed {
            return SessionOutcome::Failed { delivered };
        }
        delivered += 1;
    }
}

impl<T> ElementReceiver<T> {
    /// Receives the next element, or `None` at the end of the stream.
    pub async fn recv(&mut self) -> Option<Result<T, ConvertError>> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Stops the session. Elements already buffered in the channel are
    /// discarded, so nothing is delivered after this call.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancels the session if it is still running and waits for the producer
    /// task to exit.
    ///
    /// A session whose stream was fully consumed reports its real outcome.
    pub async fn shutdown(mut self) -> SessionOutcome {
        self.cancel();
        match self.task.take() {
            Some(task) => task.await.unwrap_or(SessionOutcome::Aborted),
            None => SessionOutcome::Aborted,
        }
    }
}

impl<T> Stream for ElementReceiver<T> {
    type Item = Result<T, ConvertError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
