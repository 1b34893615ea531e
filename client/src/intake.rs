//! Event intake
//!
//! Session callback → endpoint filter → bounded queue → forward worker.
//! The queue drops the newest event when full; the worker never cancels a
//! forward it has started.

use std::sync::Arc;

use hr_common::WebhookEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::filter::EndpointFilter;
use crate::forwarder::{ForwardResult, Forwarder};
use crate::output;
use crate::session::EventCallback;

/// Build the session event callback feeding `queue`.
///
/// Events rejected by `filter` are dropped silently. Accepted events that do
/// not fit in the queue are dropped with a warning.
pub fn event_callback(filter: EndpointFilter, queue: mpsc::Sender<WebhookEvent>) -> EventCallback {
    Arc::new(move |event: WebhookEvent| {
        if !filter.accepts(event.endpoint()) {
            debug!(event_id = %event.id(), endpoint = %event.endpoint(), "Event filtered out");
            return;
        }
        match queue.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event_id = %event.id(), "Event queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event_id = %event.id(), "Event queue closed");
            }
        }
    })
}

/// Forward queued events one at a time until the queue closes.
///
/// Each event is printed, forwarded, and its results handed to
/// `on_results`. Closing the queue lets the event in flight finish.
pub async fn forward_worker<F>(
    mut events: mpsc::Receiver<WebhookEvent>,
    forwarder: Forwarder,
    verbose: bool,
    mut on_results: F,
) where
    F: FnMut(&WebhookEvent, &[ForwardResult]) + Send,
{
    while let Some(event) = events.recv().await {
        output::print_event(&event, verbose);
        if forwarder.endpoints().is_empty() {
            continue;
        }
        let results = forwarder.forward_event(&event).await;
        on_results(&event, &results);
    }
    debug!("Forward worker stopped");
}
