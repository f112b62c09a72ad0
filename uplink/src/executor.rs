//! Sync execution between the agent spool file and the sync server.
//!
//! The executor owns the transfer itself: snapshotting the spool file through a staged
//! shell script, truncating it in place so the collector can keep appending, and
//! shipping the snapshot's data points to the server in bounded chunks. Serialization
//! of concurrent sync passes happens here, behind a [`CancellableMutex`], so mechanisms
//! never need to coordinate with each other.

use std::env;
use std::future::Future;
use std::io;
use std::mem;
use std::path::PathBuf;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::concurrency::mutex::CancellableMutex;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, UplinkResult};
use crate::transport::client::TransportClient;
use crate::{bail, uplink_error};

static COPY_AND_TRUNCATE_SCRIPT: &str = include_str!("../embed/copy-and-truncate.sh");

/// Transport used by [`SyncExecutor`] to deliver data points to the server.
///
/// Abstracting the transport keeps sync execution testable without a running server.
pub trait SyncTransport: Send + Sync + 'static {
    /// Delivers one batch of data points and returns the indices the server rejected.
    fn send_points(
        &self,
        data_points: Vec<String>,
    ) -> impl Future<Output = UplinkResult<Vec<u32>>> + Send;
}

impl SyncTransport for TransportClient {
    fn send_points(
        &self,
        data_points: Vec<String>,
    ) -> impl Future<Output = UplinkResult<Vec<u32>>> + Send {
        self.send(data_points)
    }
}

/// Executor that performs sync passes between the spool file and the sync server.
///
/// Construction stages the embedded copy-and-truncate script in the system temporary
/// directory, where it lives for the lifetime of the executor. Every sync pass invokes
/// the staged script to atomically snapshot and truncate the spool file, then ships
/// the snapshot contents through the transport.
pub struct SyncExecutor<T> {
    transport: T,
    spool_file: PathBuf,
    max_points_per_sync: Option<usize>,
    script_path: PathBuf,
    mutex: CancellableMutex,
}

impl<T> SyncExecutor<T>
where
    T: SyncTransport,
{
    /// Creates an executor and stages its snapshot script.
    pub async fn new(
        transport: T,
        spool_file: PathBuf,
        max_points_per_sync: Option<usize>,
    ) -> UplinkResult<Self> {
        if max_points_per_sync == Some(0) {
            bail!(
                ErrorKind::ConfigError,
                "The maximum number of points per sync must be greater than zero"
            );
        }

        let script_path = env::temp_dir().join(format!("copy-and-truncate-{}.sh", Uuid::new_v4()));
        fs::write(&script_path, COPY_AND_TRUNCATE_SCRIPT)
            .await
            .map_err(|err| {
                uplink_error!(
                    ErrorKind::IoError,
                    "Failed to stage the copy-and-truncate script",
                    detail = format!("path: {}", script_path.display()),
                    source: err
                )
            })?;

        Ok(Self {
            transport,
            spool_file,
            max_points_per_sync,
            script_path,
            mutex: CancellableMutex::default(),
        })
    }

    /// Performs one sync pass against the spool file.
    ///
    /// At most one pass runs at a time: concurrent callers queue behind the lock holder,
    /// and a caller whose wait is cut short by shutdown returns without error, performing
    /// no work. A missing spool file is also a clean no-op since the collector may not
    /// have written anything yet.
    pub async fn do_sync(&self, shutdown: &ShutdownRx) -> UplinkResult<()> {
        let Some(_guard) = self.mutex.lock(shutdown).await else {
            debug!("skipping sync pass, shutdown won the wait for the lock");
            return Ok(());
        };

        let Some(snapshot_path) = self.snapshot_spool().await? else {
            debug!(
                spool_file = %self.spool_file.display(),
                "skipping sync pass, the spool file does not exist yet"
            );
            return Ok(());
        };

        let contents = fs::read_to_string(&snapshot_path).await.map_err(|err| {
            uplink_error!(
                ErrorKind::ExecutorError,
                "Failed to read the spool snapshot",
                detail = format!("snapshot: {}", snapshot_path.display()),
                source: err
            )
        })?;

        // The snapshot has served its purpose once read. The data points now live only
        // in memory, so a failure past this point loses them.
        if let Err(err) = fs::remove_file(&snapshot_path).await {
            warn!(
                snapshot = %snapshot_path.display(),
                error = %err,
                "failed to remove the spool snapshot"
            );
        }

        let data_points = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.to_string())
            .collect::<Vec<_>>();

        if data_points.is_empty() {
            debug!("skipping sync pass, the spool snapshot contains no data points");
            return Ok(());
        }

        self.send_in_chunks(data_points).await
    }

    /// Releases executor resources.
    ///
    /// Removal of the staged script is best effort, a leftover file in the temporary
    /// directory is only worth a log line.
    pub async fn close(&self) {
        if let Err(err) = fs::remove_file(&self.script_path).await {
            warn!(
                script = %self.script_path.display(),
                error = %err,
                "failed to remove the staged copy-and-truncate script"
            );
        }
    }

    /// Runs the staged script to snapshot and truncate the spool file.
    ///
    /// Returns the snapshot path, or [`None`] when the spool file does not exist.
    async fn snapshot_spool(&self) -> UplinkResult<Option<PathBuf>> {
        match fs::metadata(&self.spool_file).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(uplink_error!(
                    ErrorKind::ExecutorError,
                    "Failed to inspect the spool file",
                    detail = format!("spool_file: {}", self.spool_file.display()),
                    source: err
                ));
            }
        }

        let output = Command::new("sh")
            .arg(&self.script_path)
            .arg(&self.spool_file)
            .output()
            .await
            .map_err(|err| {
                uplink_error!(
                    ErrorKind::ExecutorError,
                    "Failed to run the copy-and-truncate script",
                    source: err
                )
            })?;

        if !output.status.success() {
            return Err(uplink_error!(
                ErrorKind::ExecutorError,
                "The copy-and-truncate script failed",
                detail = String::from_utf8_lossy(&output.stderr).trim().to_string()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let snapshot_path = stdout.trim();
        if snapshot_path.is_empty() {
            bail!(
                ErrorKind::ExecutorError,
                "The copy-and-truncate script did not report a snapshot path"
            );
        }

        Ok(Some(PathBuf::from(snapshot_path)))
    }

    /// Sends data points to the server, splitting them into bounded chunks.
    ///
    /// Indices rejected by the server are reported relative to each chunk, so they are
    /// offset back into positions within the full batch before logging.
    async fn send_in_chunks(&self, mut data_points: Vec<String>) -> UplinkResult<()> {
        let chunk_size = self.max_points_per_sync.unwrap_or(data_points.len());
        let mut offset: u64 = 0;

        while !data_points.is_empty() {
            let remainder = if chunk_size < data_points.len() {
                data_points.split_off(chunk_size)
            } else {
                Vec::new()
            };
            let chunk = mem::replace(&mut data_points, remainder);
            let chunk_len = chunk.len() as u64;

            let failed = self.transport.send_points(chunk).await.map_err(|err| {
                uplink_error!(
                    ErrorKind::ExecutorError,
                    "Failed to send data points to the sync server",
                    source: err
                )
            })?;

            if !failed.is_empty() {
                let positions = failed
                    .iter()
                    .map(|index| u64::from(*index) + offset)
                    .collect::<Vec<_>>();
                warn!(
                    positions = ?positions,
                    "the sync server rejected data points"
                );
            }

            offset += chunk_len;
        }

        Ok(())
    }
}
