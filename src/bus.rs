//! Shared publish/subscribe event bus used to exchange results with other
//! federates.

use std::collections::VecDeque;

use crate::error::BusError;

/// One event received from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub topic: String,
    pub values: Vec<String>,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            values,
        }
    }

    /// Event carrying a single value.
    pub fn single(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(topic, vec![value.into()])
    }
}

/// Abstraction over the shared event bus.
///
/// `publish` is fire-and-forget; `poll` never blocks and returns whatever
/// arrived since the previous poll, possibly nothing.
pub trait EventBus {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError>;

    fn poll(&mut self) -> Vec<BusEvent>;
}

impl<B: EventBus + ?Sized> EventBus for &mut B {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        (**self).publish(topic, payload)
    }

    fn poll(&mut self) -> Vec<BusEvent> {
        (**self).poll()
    }
}

/// In-process bus: records everything published and hands out injected
/// events on the next poll.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBus {
    published: Vec<(String, String)>,
    inbox: VecDeque<BusEvent>,
    closed: bool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an event as if another federate had published it.
    pub fn inject(&mut self, event: BusEvent) {
        self.inbox.push_back(event);
    }

    /// Queues a full day-ahead forecast batch, one event per hour.
    pub fn inject_hourly(&mut self, prefix: &str, values: &[f64]) {
        for (hour, v) in values.iter().enumerate() {
            self.inject(BusEvent::single(format!("{prefix}{hour}"), v.to_string()));
        }
    }

    /// Makes every further publish fail.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    /// Payloads published on `topic`, in order.
    pub fn published_on<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.published
            .iter()
            .filter(move |(t, _)| t == topic)
            .map(|(_, payload)| payload.as_str())
    }
}

impl EventBus for InMemoryBus {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        if topic.is_empty() {
            return Err(BusError::Rejected(topic.to_string()));
        }
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn poll(&mut self) -> Vec<BusEvent> {
        self.inbox.drain(..).collect()
    }
}

/// Formats values for the wire: 4 decimals, each followed by `", "`.
///
/// ```
/// use wpm_cosim::bus::format_values;
///
/// assert_eq!(format_values(&[12.5, 30.0]), "12.5000, 30.0000, ");
/// ```
pub fn format_values(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v:.4}, ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_keeps_trailing_separator() {
        assert_eq!(format_values(&[1.0]), "1.0000, ");
        assert_eq!(format_values(&[0.123456, -2.5]), "0.1235, -2.5000, ");
        assert_eq!(format_values(&[]), "");
    }

    #[test]
    fn poll_drains_inbox() {
        let mut bus = InMemoryBus::new();
        bus.inject(BusEvent::single("a", "1"));
        bus.inject(BusEvent::single("b", "2"));
        let events = bus.poll();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topic, "a");
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn inject_hourly_keys_topics_by_hour() {
        let mut bus = InMemoryBus::new();
        bus.inject_hourly("fc_h", &[1.5, 2.5, 3.5]);
        let topics: Vec<String> = bus.poll().into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["fc_h0", "fc_h1", "fc_h2"]);
    }

    #[test]
    fn closed_bus_rejects_publish() {
        let mut bus = InMemoryBus::new();
        assert!(bus.publish("x", "1").is_ok());
        bus.close();
        assert!(bus.publish("x", "2").is_err());
        assert_eq!(bus.published_on("x").collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn empty_topic_is_rejected() {
        let mut bus = InMemoryBus::new();
        assert!(matches!(bus.publish("", "1"), Err(BusError::Rejected(_))));
        assert!(bus.published().is_empty());
    }
}
