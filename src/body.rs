// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Response body wrapper that reports when the response has finished

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// How a response body stopped being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEnd {
    /// Every frame was produced
    Completed,
    /// The inner body yielded an error
    Errored,
    /// The body was dropped before its end, e.g. the client went away
    Dropped,
}

/// Wraps a response body and fires a one-shot notification exactly once,
/// on end of stream, on error, or when dropped, whichever comes first.
pub struct CompletionBody {
    inner: Body,
    notify: Option<oneshot::Sender<BodyEnd>>,
}

impl CompletionBody {
    pub fn new(inner: Body) -> (Self, oneshot::Receiver<BodyEnd>) {
        let (tx, rx) = oneshot::channel();
        let body = Self {
            inner,
            notify: Some(tx),
        };
        (body, rx)
    }

    fn finish(&mut self, end: BodyEnd) {
        if let Some(tx) = self.notify.take() {
            // receiver gone means nobody is waiting any more
            let _ = tx.send(end);
        }
    }
}

impl HttpBody for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);

        match &poll {
            Poll::Ready(None) => this.finish(BodyEnd::Completed),
            Poll::Ready(Some(Err(_))) => this.finish(BodyEnd::Errored),
            _ => {}
        }

        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        // hyper may drop an already-exhausted body without polling it to the end
        let end = if self.inner.is_end_stream() {
            BodyEnd::Completed
        } else {
            BodyEnd::Dropped
        };
        self.finish(end);
    }
}
