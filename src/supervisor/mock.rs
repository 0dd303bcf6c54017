//! In-memory provider used by the supervisor and API tests.

use async_trait::async_trait;
use hive_core::{
    error::HiveError,
    message::{CredentialState, EventSink, OutgoingImage},
    traits::{Connection, ConnectionProvider},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub(crate) const SUFFIX: &str = "mock.net";

#[derive(Default)]
pub(crate) struct MockConnection {
    pub texts: Mutex<Vec<(String, String)>>,
    pub images: Mutex<Vec<(String, OutgoingImage)>>,
    pub closed: AtomicBool,
    pub fail: bool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&self, destination: &str, text: &str) -> Result<(), HiveError> {
        if self.fail {
            return Err(HiveError::Provider("socket reset".into()));
        }
        self.texts
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(&self, destination: &str, image: &OutgoingImage) -> Result<(), HiveError> {
        if self.fail {
            return Err(HiveError::Provider("upload rejected".into()));
        }
        self.images
            .lock()
            .unwrap()
            .push((destination.to_string(), image.clone()));
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct Open {
    pub session_id: String,
    pub credentials: CredentialState,
    pub sink: EventSink,
    pub connection: Arc<MockConnection>,
}

#[derive(Default)]
pub(crate) struct MockProvider {
    pub opens: Mutex<Vec<Open>>,
    pub failing_sends: bool,
}

impl MockProvider {
    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn sink(&self, n: usize) -> EventSink {
        self.opens.lock().unwrap()[n].sink.clone()
    }

    pub fn connection(&self, n: usize) -> Arc<MockConnection> {
        self.opens.lock().unwrap()[n].connection.clone()
    }

    pub fn credentials(&self, n: usize) -> CredentialState {
        self.opens.lock().unwrap()[n].credentials.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.opens
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.connection.texts.lock().unwrap().len() + o.connection.images.lock().unwrap().len())
            .sum()
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn address_suffix(&self) -> &str {
        SUFFIX
    }

    async fn open(
        &self,
        session_id: &str,
        credentials: CredentialState,
        events: EventSink,
    ) -> Result<Arc<dyn Connection>, HiveError> {
        let connection = Arc::new(MockConnection {
            fail: self.failing_sends,
            ..Default::default()
        });
        self.opens.lock().unwrap().push(Open {
            session_id: session_id.to_string(),
            credentials,
            sink: events,
            connection: connection.clone(),
        });
        Ok(connection)
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
