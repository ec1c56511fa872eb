// notify.rs
// Broadcast fan-out for "data changed" hints. The channel carries no payload
// beyond the source tag; receivers are expected to re-run their own queries.

use axum::response::sse::Event;
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<String>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Hub { tx }
    }

    /// Fire-and-forget: a send with no subscribers or a lagging receiver only
    /// delays that dashboard's next poll.
    pub fn publish(&self, source: &str) {
        let _ = self.tx.send(format!("{source} data changed"));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Hub::new()
    }
}

/// Adapts a subscription into an SSE event stream, skipping over lag gaps.
pub fn sse_stream(
    rx: broadcast::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    return Some((Ok(Event::default().event("update").data(message)), rx));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hints_reach_subscribers() {
        let hub = Hub::new();
        let mut rx = hub.subscribe();
        hub.publish("Finance");
        assert_eq!(rx.recv().await.unwrap(), "Finance data changed");
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let hub = Hub::new();
        hub.publish("Planning");
    }
}
