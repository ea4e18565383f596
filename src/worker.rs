//! Optional query offload for very large scenes
//!
//! [`QueryWorker`] runs spatial queries on a dedicated thread against a
//! cloned, read-only snapshot of the index, so the host render loop never
//! blocks on a worst-case query. The snapshot discipline makes concurrent
//! mutation impossible by construction: the live index stays with its single
//! owner, and the worker only ever sees copies installed between cycles.
//!
//! Requests and responses carry monotonically increasing correlation ids;
//! responses for superseded requests are discarded. A query that exceeds the
//! configured deadline returns [`QueryOutcome::TimedOut`] and the caller
//! falls back to treating the full known set as visible for that frame —
//! graceful degradation, never a crash.

use crate::annotation::AnnotationId;
use crate::quadtree::SpatialIndex;
use crate::{Result, SceneError};

use geo::Rect;
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Command {
    Query { request_id: u64, region: Rect<f64> },
    InstallSnapshot(Box<SpatialIndex>),
    Shutdown,
}

struct Response {
    request_id: u64,
    ids: HashSet<AnnotationId>,
}

/// Result of a deadline-bounded offloaded query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The worker answered within the deadline
    Complete(HashSet<AnnotationId>),
    /// Deadline exceeded; treat the full known set as visible this frame
    TimedOut,
}

/// Handle to the query offload thread
pub struct QueryWorker {
    commands: Sender<Command>,
    responses: Receiver<Response>,
    next_request_id: u64,
    deadline: Duration,
    handle: Option<JoinHandle<()>>,
}

impl QueryWorker {
    /// Spawn a worker owning the given index snapshot
    pub fn spawn(snapshot: SpatialIndex, deadline: Duration) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = std::thread::Builder::new()
            .name("annotation-query".into())
            .spawn(move || worker_loop(snapshot, command_rx, response_tx))?;

        Ok(Self {
            commands: command_tx,
            responses: response_rx,
            next_request_id: 0,
            deadline,
            handle: Some(handle),
        })
    }

    /// Replace the worker's snapshot with a copy of the given index
    ///
    /// Called between update cycles, after the live index mutated.
    pub fn install_snapshot(&self, index: &SpatialIndex) -> Result<()> {
        self.commands
            .send(Command::InstallSnapshot(Box::new(index.clone())))
            .map_err(|_| SceneError::WorkerDisconnected)
    }

    /// Run a region query against the snapshot, bounded by the deadline
    ///
    /// Stale responses from abandoned earlier requests are drained and
    /// discarded by correlation id.
    pub fn query_deadline(&mut self, region: Rect<f64>) -> Result<QueryOutcome> {
        self.next_request_id += 1;
        let request_id = self.next_request_id;

        self.commands
            .send(Command::Query { request_id, region })
            .map_err(|_| SceneError::WorkerDisconnected)?;

        let deadline_at = Instant::now() + self.deadline;
        loop {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(QueryOutcome::TimedOut);
            }
            match self.responses.recv_timeout(remaining) {
                Ok(response) if response.request_id == request_id => {
                    return Ok(QueryOutcome::Complete(response.ids));
                }
                Ok(stale) => {
                    tracing::trace!(
                        request_id = stale.request_id,
                        "discarding stale query response"
                    );
                }
                Err(RecvTimeoutError::Timeout) => return Ok(QueryOutcome::TimedOut),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SceneError::WorkerDisconnected);
                }
            }
        }
    }

    /// Test seam: a worker wired to explicit channels, with no thread behind
    /// them
    #[cfg(test)]
    fn with_channels(
        commands: Sender<Command>,
        responses: Receiver<Response>,
        deadline: Duration,
    ) -> Self {
        Self {
            commands,
            responses,
            next_request_id: 0,
            deadline,
            handle: None,
        }
    }
}

impl Drop for QueryWorker {
    fn drop(&mut self) {
        // The worker also exits when the channel closes; Shutdown just makes
        // it prompt
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    mut index: SpatialIndex,
    commands: Receiver<Command>,
    responses: Sender<Response>,
) {
    while let Ok(command) = commands.recv() {
        match command {
            Command::InstallSnapshot(snapshot) => index = *snapshot,
            Command::Query { request_id, region } => {
                let ids = index.query(&region);
                if responses.send(Response { request_id, ids }).is_err() {
                    break;
                }
            }
            Command::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect<f64> {
        Rect::new(Coord { x, y }, Coord { x: x + w, y: y + h })
    }

    fn populated_index() -> SpatialIndex {
        let mut index = SpatialIndex::new(rect(0.0, 0.0, 1000.0, 1000.0));
        index.insert("a".into(), rect(10.0, 10.0, 50.0, 50.0));
        index.insert("b".into(), rect(600.0, 600.0, 50.0, 50.0));
        index
    }

    #[test]
    fn test_query_completes() {
        let mut worker =
            QueryWorker::spawn(populated_index(), Duration::from_secs(5)).unwrap();

        match worker.query_deadline(rect(0.0, 0.0, 100.0, 100.0)).unwrap() {
            QueryOutcome::Complete(ids) => {
                assert_eq!(ids.len(), 1);
                assert!(ids.contains("a"));
            }
            QueryOutcome::TimedOut => panic!("query should complete well within the deadline"),
        }
    }

    #[test]
    fn test_install_snapshot_replaces_results() {
        let mut worker =
            QueryWorker::spawn(populated_index(), Duration::from_secs(5)).unwrap();

        let mut updated = populated_index();
        updated.remove("a");
        updated.insert("c".into(), rect(20.0, 20.0, 10.0, 10.0));
        worker.install_snapshot(&updated).unwrap();

        match worker.query_deadline(rect(0.0, 0.0, 100.0, 100.0)).unwrap() {
            QueryOutcome::Complete(ids) => {
                assert!(!ids.contains("a"));
                assert!(ids.contains("c"));
            }
            QueryOutcome::TimedOut => panic!("query should complete well within the deadline"),
        }
    }

    #[test]
    fn test_deadline_fallback() {
        // No thread behind the channels: the response never arrives
        let (command_tx, _command_rx) = mpsc::channel();
        let (_response_tx, response_rx) = mpsc::channel::<Response>();
        let mut worker =
            QueryWorker::with_channels(command_tx, response_rx, Duration::from_millis(10));

        let outcome = worker.query_deadline(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(outcome, QueryOutcome::TimedOut);
    }

    #[test]
    fn test_stale_responses_discarded() {
        let (command_tx, _command_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let mut worker =
            QueryWorker::with_channels(command_tx, response_rx, Duration::from_secs(5));

        // A leftover response from an abandoned request, then the real one
        response_tx
            .send(Response {
                request_id: 0,
                ids: HashSet::from(["stale".to_string()]),
            })
            .unwrap();
        response_tx
            .send(Response {
                request_id: 1,
                ids: HashSet::from(["fresh".to_string()]),
            })
            .unwrap();

        match worker.query_deadline(rect(0.0, 0.0, 10.0, 10.0)).unwrap() {
            QueryOutcome::Complete(ids) => {
                assert!(ids.contains("fresh"));
                assert!(!ids.contains("stale"));
            }
            QueryOutcome::TimedOut => panic!("the fresh response should be delivered in time"),
        }
    }

    #[test]
    fn test_disconnected_worker_errors() {
        let (command_tx, response_rx) = {
            let (command_tx, command_rx) = mpsc::channel();
            let (response_tx, response_rx) = mpsc::channel::<Response>();
            drop(command_rx);
            drop(response_tx);
            (command_tx, response_rx)
        };
        let mut worker =
            QueryWorker::with_channels(command_tx, response_rx, Duration::from_secs(1));

        assert!(matches!(
            worker.query_deadline(rect(0.0, 0.0, 10.0, 10.0)),
            Err(SceneError::WorkerDisconnected)
        ));
    }
}
