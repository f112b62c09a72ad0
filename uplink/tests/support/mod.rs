#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use uplink::concurrency::shutdown::ShutdownRx;
use uplink::error::{ErrorKind, UplinkResult};
use uplink::executor::{SyncExecutor, SyncTransport};
use uplink::mechanism::base::Syncer;
use uplink::transport::message::{SyncRequest, SyncResponse};
use uplink::transport::server::SyncService;
use uplink::{bail, uplink_error};

/// Transport double that records every batch it is asked to send.
#[derive(Clone, Default)]
pub struct CountingTransport {
    state: Arc<CountingState>,
}

#[derive(Default)]
struct CountingState {
    calls: Mutex<Vec<Vec<String>>>,
    fail_sends: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<Vec<String>> {
        self.state.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.state.calls.lock().await.len()
    }

    /// Highest number of sends that were ever in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

impl SyncTransport for CountingTransport {
    fn send_points(
        &self,
        data_points: Vec<String>,
    ) -> impl Future<Output = UplinkResult<Vec<u32>>> + Send {
        let state = self.state.clone();

        async move {
            let in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

            // Keep the send in flight long enough for overlapping passes to
            // show up in max_in_flight.
            sleep(Duration::from_millis(25)).await;

            state.in_flight.fetch_sub(1, Ordering::SeqCst);

            if state.fail_sends.load(Ordering::SeqCst) {
                return Err(uplink_error!(
                    ErrorKind::TransportError,
                    "The test transport rejected the batch"
                ));
            }

            state.calls.lock().await.push(data_points);

            Ok(Vec::new())
        }
    }
}

/// Executor over a temporary spool file, backed by [`CountingTransport`].
pub struct TestExecutor {
    pub executor: Arc<SyncExecutor<CountingTransport>>,
    pub transport: CountingTransport,
    pub spool_file: PathBuf,
    // Keeps the spool directory alive for the duration of the test.
    _spool_dir: TempDir,
}

pub async fn spawn_test_executor() -> TestExecutor {
    let spool_dir = tempfile::tempdir().expect("failed to create the spool directory");
    let spool_file = spool_dir.path().join("metrics.out");
    let transport = CountingTransport::new();

    let executor = SyncExecutor::new(transport.clone(), spool_file.clone(), None)
        .await
        .expect("failed to create the sync executor");

    TestExecutor {
        executor: Arc::new(executor),
        transport,
        spool_file,
        _spool_dir: spool_dir,
    }
}

/// Writes data points to a spool file, one per line.
pub async fn write_spool(path: &Path, points: &[&str]) {
    let mut contents = points.join("\n");
    if !points.is_empty() {
        contents.push('\n');
    }

    tokio::fs::write(path, contents)
        .await
        .expect("failed to write the spool file");
}

pub async fn read_spool(path: &Path) -> String {
    tokio::fs::read_to_string(path)
        .await
        .expect("failed to read the spool file")
}

/// Polls the transport until it has recorded at least `expected` sends.
///
/// The budget is generous because paused-clock tests burn virtual time much
/// faster than the wall clock.
pub async fn wait_for_call_count(
    transport: &CountingTransport,
    expected: usize,
    budget: Duration,
) {
    timeout(budget, async {
        while transport.call_count().await < expected {
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("the transport never reached {expected} sends"));
}

/// Behavior of a [`MockSyncer`] wait.
pub enum MockBehavior {
    /// Report a sync event after each delay.
    FireEvery(Duration),
    /// Fail the first wait immediately.
    FailSync,
    /// Panic on the first wait.
    PanicOnSync,
    /// Never report an event, wait for shutdown.
    Idle,
}

/// Scripted mechanism for orchestration tests.
pub struct MockSyncer {
    name: &'static str,
    behavior: MockBehavior,
    fail_close: bool,
    closed: Arc<AtomicBool>,
}

impl MockSyncer {
    pub fn new(name: &'static str, behavior: MockBehavior) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let syncer = Self {
            name,
            behavior,
            fail_close: false,
            closed: closed.clone(),
        };

        (syncer, closed)
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl Syncer for MockSyncer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn sync(&mut self, shutdown: &ShutdownRx) -> UplinkResult<()> {
        match self.behavior {
            MockBehavior::FireEvery(period) => {
                tokio::select! {
                    _ = sleep(period) => Ok(()),
                    _ = shutdown.wait_for_shutdown() => Ok(()),
                }
            }
            MockBehavior::FailSync => {
                bail!(
                    ErrorKind::MechanismError,
                    "The test mechanism failed to wait for an event"
                );
            }
            MockBehavior::PanicOnSync => panic!("the test mechanism panicked"),
            MockBehavior::Idle => {
                shutdown.wait_for_shutdown().await;
                Ok(())
            }
        }
    }

    async fn close(&mut self, _deadline: Instant) -> UplinkResult<()> {
        self.closed.store(true, Ordering::SeqCst);

        if self.fail_close {
            bail!(
                ErrorKind::MechanismError,
                "The test mechanism failed to close"
            );
        }

        Ok(())
    }
}

/// Sync service double that records batches and scripts its response.
#[derive(Default)]
pub struct RecordingService {
    requests: Mutex<Vec<Vec<String>>>,
    failed: Vec<u32>,
    delay: Option<Duration>,
}

impl RecordingService {
    pub fn with_failed(mut self, failed: Vec<u32>) -> Self {
        self.failed = failed;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl SyncService for RecordingService {
    async fn sync(&self, request: SyncRequest) -> SyncResponse {
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        self.requests.lock().await.push(request.data_points);

        SyncResponse {
            failed: self.failed.clone(),
        }
    }
}

/// Grabs a free TCP port by binding port 0 and releasing it.
pub fn free_port() -> u16 {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind a probe listener");
    let port = listener
        .local_addr()
        .expect("failed to read the probe address")
        .port();
    drop(listener);

    port
}

/// Posts to a trigger endpoint until its lazily bound listener is up.
pub async fn post_until_reachable(client: &reqwest::Client, url: &str) -> reqwest::Response {
    timeout(Duration::from_secs(5), async {
        loop {
            match client.post(url).send().await {
                Ok(response) => return response,
                Err(_) => sleep(Duration::from_millis(25)).await,
            }
        }
    })
    .await
    .expect("the trigger endpoint never became reachable")
}
