//! Tracking request data structures.
//!
//! A [`TrackingRequest`] is one raw hit (pageview, event, goal conversion)
//! as received from a client. A [`RequestSet`] is the ordered sequence of
//! hits delivered in a single client call, and a [`QueuedBatch`] is the
//! durable envelope a request set travels in while it sits in the queue.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// One raw tracking hit as received from a client.
///
/// # Example
///
/// ```
/// use track_queue::TrackingRequest;
/// use std::collections::HashMap;
///
/// let mut params = HashMap::new();
/// params.insert("idsite".to_string(), "1".to_string());
/// params.insert("url".to_string(), "https://example.org/pricing".to_string());
///
/// let request = TrackingRequest::new(params);
/// assert_eq!(request.params["idsite"], "1");
/// assert!(request.received_at > 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRequest {
    /// Tracking parameters exactly as sent by the client
    /// (`idsite`, `url`, `action_name`, `e_c`, `idgoal`, ...)
    pub params: HashMap<String, String>,
    /// Client IP the hit was received from
    pub ip: Option<IpAddr>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Server-side receive timestamp (epoch millis)
    pub received_at: i64,
}

impl TrackingRequest {
    /// Create a request from its raw parameter map, stamped with the
    /// current receive time.
    pub fn new(params: HashMap<String, String>) -> Self {
        Self {
            params,
            ip: None,
            user_agent: None,
            received_at: epoch_millis(),
        }
    }

    /// Attach client metadata captured by the transport layer.
    #[must_use]
    pub fn with_client(mut self, ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }
}

/// An ordered set of tracking requests received in one client call.
///
/// Immutable once built: the handler owns it until it is handed to the
/// queue, after which the data lives only in the serialized
/// [`QueuedBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSet {
    requests: Vec<TrackingRequest>,
}

impl RequestSet {
    #[must_use]
    pub fn new(requests: Vec<TrackingRequest>) -> Self {
        Self { requests }
    }

    /// The contained requests, in receive order.
    #[must_use]
    pub fn requests(&self) -> &[TrackingRequest] {
        &self.requests
    }

    /// Number of raw requests in this set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Wire envelope for one queued request set.
///
/// Produced by the queue on enqueue; the insertion sequence number comes
/// from an atomic backend counter, so concurrent workers get unique,
/// monotone values without coordinating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedBatch {
    /// Insertion sequence number
    pub seq: u64,
    /// Enqueue timestamp (epoch millis)
    pub enqueued_at: i64,
    /// The request set this envelope carries
    pub request_set: RequestSet,
}

impl QueuedBatch {
    #[must_use]
    pub fn new(seq: u64, request_set: RequestSet) -> Self {
        Self {
            seq,
            enqueued_at: epoch_millis(),
            request_set,
        }
    }

    /// Serialize for storage in the backend list.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize an envelope popped from the backend list.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Current wall-clock time as epoch millis.
pub(crate) fn epoch_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> TrackingRequest {
        let mut params = HashMap::new();
        params.insert("idsite".to_string(), "1".to_string());
        params.insert("url".to_string(), url.to_string());
        TrackingRequest::new(params)
    }

    #[test]
    fn test_new_request_is_stamped() {
        let r = request("https://example.org/");
        assert!(r.received_at > 0);
        assert!(r.ip.is_none());
        assert!(r.user_agent.is_none());
    }

    #[test]
    fn test_with_client_metadata() {
        let r = request("https://example.org/").with_client(
            Some("203.0.113.7".parse().unwrap()),
            Some("Mozilla/5.0".to_string()),
        );
        assert_eq!(r.ip.unwrap().to_string(), "203.0.113.7");
        assert_eq!(r.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_request_set_preserves_order() {
        let set = RequestSet::new(vec![request("/a"), request("/b"), request("/c")]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.requests()[0].params["url"], "/a");
        assert_eq!(set.requests()[2].params["url"], "/c");
    }

    #[test]
    fn test_empty_request_set() {
        let set = RequestSet::new(vec![]);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_envelope_survives_encode_decode() {
        let set = RequestSet::new(vec![request("/a").with_client(
            Some("2001:db8::1".parse().unwrap()),
            Some("curl/8.0".to_string()),
        )]);
        let batch = QueuedBatch::new(42, set.clone());

        let payload = batch.encode().unwrap();
        let decoded = QueuedBatch::decode(&payload).unwrap();

        assert_eq!(decoded.seq, 42);
        assert_eq!(decoded.request_set, set);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(QueuedBatch::decode(b"not json at all").is_err());
        assert!(QueuedBatch::decode(b"{\"seq\": true}").is_err());
    }
}
