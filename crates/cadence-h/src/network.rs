//! Request accounting for one page, fed by CDP network events. Unlike the
//! `performance` resource timeline it has no buffer limit and it sees
//! requests that are still in flight.

use crate::cdp::CdpResult;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum NetworkEvent {
    Started(String),
    Settled(String),
}

#[derive(Debug, Default)]
struct Counters {
    events: usize,
    in_flight: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct NetworkTracker {
    counters: Mutex<Counters>,
}

impl NetworkTracker {
    /// Start tracking requests on `page`. Tracking stops when the page's
    /// event streams end.
    pub async fn attach(page: &Page) -> CdpResult<Arc<Self>> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| format!("Failed to enable network events: {}", e))?;

        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| format!("Failed to subscribe to request events: {}", e))?
            .map(|e| NetworkEvent::Started(e.request_id.inner().clone()));
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| format!("Failed to subscribe to request events: {}", e))?
            .map(|e| NetworkEvent::Settled(e.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| format!("Failed to subscribe to request events: {}", e))?
            .map(|e| NetworkEvent::Settled(e.request_id.inner().clone()));

        let tracker = Arc::new(Self::default());
        let sink = Arc::clone(&tracker);
        let mut events =
            futures::stream::select(started, futures::stream::select(finished, failed)).boxed();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                sink.record(event);
            }
            tracing::debug!("Network event stream ended");
        });
        Ok(tracker)
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: NetworkEvent) {
        let mut counters = self.counters();
        counters.events += 1;
        match event {
            NetworkEvent::Started(id) => {
                counters.in_flight.insert(id);
            }
            NetworkEvent::Settled(id) => {
                counters.in_flight.remove(&id);
            }
        }
    }

    /// Network events seen since tracking started. Grows with every request
    /// start and completion.
    pub fn events(&self) -> usize {
        self.counters().events
    }

    pub fn in_flight(&self) -> usize {
        self.counters().in_flight.len()
    }
}
