//! In-memory connection that records outbound frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tile_common::Request;
use transport::{Connection, Transport, TransportError};

use crate::fixtures::{failure_frame, success_frame};

/// A [`Connection`] whose open state is set by the test and whose sent
/// frames are recorded instead of written anywhere.
#[derive(Default)]
pub struct MockConnection {
    open: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MockConnection {
    pub fn opened() -> Arc<Self> {
        let conn = Arc::new(Self::default());
        conn.set_open(true);
        conn
    }

    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Every frame sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Sent frames parsed back into requests.
    pub fn sent_requests(&self) -> Vec<Request> {
        self.sent()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    /// Remove and return the frames sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    /// Answer every unanswered frame successfully, with the payload chosen
    /// by `payload`. Returns how many frames were answered.
    pub fn answer_all(
        &self,
        transport: &Transport,
        payload: impl Fn(&Request) -> Option<Value>,
    ) -> usize {
        let frames = self.take_sent();
        for frame in &frames {
            let request: Request = serde_json::from_str(frame).unwrap();
            let response = success_frame(frame, payload(&request)).unwrap();
            transport.handle_message(&response);
        }
        frames.len()
    }

    /// Answer every unanswered frame with a failure.
    pub fn fail_all(&self, transport: &Transport, error: &str) -> usize {
        let frames = self.take_sent();
        for frame in &frames {
            transport.handle_message(&failure_frame(frame, error).unwrap());
        }
        frames.len()
    }
}

impl Connection for MockConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{heatmap_request, BASE_URL};

    #[test]
    fn test_closed_connection_rejects() {
        let conn = MockConnection::closed();
        assert_eq!(
            conn.send("x".to_string()),
            Err(TransportError::NotConnected)
        );
        assert_eq!(conn.sent_count(), 0);
    }

    #[test]
    fn test_answer_all_resolves_transport() {
        let conn = MockConnection::opened();
        let transport = Transport::new(conn.clone(), BASE_URL);
        let _pending = transport.get(heatmap_request(1, 0, 1));

        assert_eq!(conn.sent_requests().len(), 1);
        assert_eq!(transport.in_flight_len(), 1);
        assert_eq!(conn.answer_all(&transport, |_| None), 1);
        assert_eq!(transport.in_flight_len(), 0);
        assert_eq!(conn.sent_count(), 0);
    }
}
