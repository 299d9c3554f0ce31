//! Telemetry Emitter (C2): non-blocking, best-effort publication to the
//! message bus. Never blocks the request path; overflow drops the oldest
//! queued event and logs a WARN (§5).
//!
//! Grounded on the fire-and-forget `FutureProducer`/`dummy()` pattern from
//! the audit-log producer in the wider example pack (`common::audit::producer`):
//! an `Option<FutureProducer>` is `None` when no broker is configured, and
//! emission becomes a silent no-op rather than a startup failure. The
//! bounded drop-oldest queue in front of it is this gateway's own addition,
//! required because `FutureProducer::send` can itself await broker
//! backpressure — something the request path must never observe.

use chrono::Utc;
use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[cfg(feature = "kafka")]
use rdkafka::producer::{FutureProducer, FutureRecord};
#[cfg(feature = "kafka")]
use std::time::Duration;

/// One queued event: a topic and its already-serialized JSON payload.
struct QueuedEvent {
    topic: String,
    payload: Value,
}

/// Fire-and-forget publisher with a bounded in-memory queue (default
/// capacity 10 000, drop-oldest on overflow).
#[derive(Clone)]
pub struct TelemetryEmitter {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    queue: Mutex<VecDeque<QueuedEvent>>,
    capacity: usize,
    notify: Notify,
    #[cfg(feature = "kafka")]
    producer: Option<FutureProducer>,
}

impl TelemetryEmitter {
    /// Builds an emitter and spawns its background drain task. `brokers =
    /// None` produces a no-op publisher (events are queued and dropped,
    /// never sent) rather than failing startup.
    #[cfg(feature = "kafka")]
    pub fn start(brokers: Option<&str>, capacity: usize) -> Self {
        use rdkafka::config::ClientConfig;

        let producer = brokers.map(|b| {
            ClientConfig::new()
                .set("bootstrap.servers", b)
                .set("message.timeout.ms", "5000")
                .create::<FutureProducer>()
                .expect("failed to build Kafka producer")
        });

        let inner = Arc::new(TelemetryInner {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Notify::new(),
            producer,
        });

        let emitter = Self { inner };
        emitter.spawn_drain_task();
        emitter
    }

    #[cfg(not(feature = "kafka"))]
    pub fn start(_brokers: Option<&str>, capacity: usize) -> Self {
        let inner = Arc::new(TelemetryInner {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Notify::new(),
        });
        let emitter = Self { inner };
        emitter.spawn_drain_task();
        emitter
    }

    fn spawn_drain_task(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                inner.notify.notified().await;
                loop {
                    let next = {
                        let mut queue = inner.queue.lock().await;
                        queue.pop_front()
                    };
                    let Some(event) = next else { break };
                    Self::publish(&inner, event).await;
                }
            }
        });
    }

    #[cfg(feature = "kafka")]
    async fn publish(inner: &TelemetryInner, event: QueuedEvent) {
        let Some(producer) = &inner.producer else { return };
        let payload = event.payload.to_string();
        let record = FutureRecord::to(&event.topic).payload(&payload).key(&event.topic);
        if let Err((err, _)) = producer.send(record, Duration::from_secs(1)).await {
            warn!("telemetry publish to '{}' failed: {err}", event.topic);
        }
    }

    #[cfg(not(feature = "kafka"))]
    async fn publish(_inner: &TelemetryInner, _event: QueuedEvent) {}

    /// Enqueues an event without blocking. Never awaits broker I/O on the
    /// caller's task; on queue overflow, drops the oldest queued event and
    /// logs a WARN before pushing the new one.
    pub async fn emit(&self, topic: &str, payload: impl Serialize) {
        let Ok(payload) = serde_json::to_value(payload) else {
            warn!("telemetry event for topic '{topic}' failed to serialize");
            return;
        };
        let mut queue = self.inner.queue.lock().await;
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            warn!("telemetry queue full ({} events), dropping oldest", self.inner.capacity);
        }
        queue.push_back(QueuedEvent {
            topic: topic.to_string(),
            payload,
        });
        drop(queue);
        self.inner.notify.notify_one();
    }
}

/// Access-log event emitted for every request on Telemetry-End (§4.3, §6).
#[derive(Debug, Clone, Serialize)]
pub struct AccessEvent {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub client_ip: String,
    pub error_kind: Option<&'static str>,
    pub timestamp: String,
}

impl AccessEvent {
    pub fn now(
        request_id: String,
        method: String,
        path: String,
        status_code: Option<u16>,
        duration_ms: u64,
        client_ip: String,
        error_kind: Option<&'static str>,
    ) -> Self {
        Self {
            request_id,
            method,
            path,
            status_code,
            duration_ms,
            client_ip,
            error_kind,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Request-start event emitted on Telemetry-Start (order -90, §4.3, §6),
/// before routing or any other filter runs.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStartEvent {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub timestamp: String,
}

impl RequestStartEvent {
    pub fn now(request_id: String, method: String, path: String, client_ip: String) -> Self {
        Self {
            request_id,
            method,
            path,
            client_ip,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Auth policy event topic payload (`events.auth`).
#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub request_id: String,
    pub outcome: &'static str,
    pub subject: Option<String>,
    pub reason: Option<String>,
}

/// Rate-limit policy event topic payload (`events.ratelimit`).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitEvent {
    pub request_id: String,
    pub policy: String,
    pub key: String,
    pub allowed: bool,
    pub remaining: u32,
}

/// Circuit breaker transition event topic payload (`events.circuitbreaker`).
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerEvent {
    pub breaker: String,
    pub from: &'static str,
    pub to: &'static str,
    pub failures: usize,
    pub slow_calls: usize,
    pub successes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_does_not_block_without_broker() {
        let emitter = TelemetryEmitter::start(None, 4);
        for i in 0..10 {
            emitter
                .emit("logs.gateway", serde_json::json!({"i": i}))
                .await;
        }
        // queue overflow past capacity must not panic or deadlock
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
