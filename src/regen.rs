//! Deferred mesh regeneration.
//!
//! Leaves whose geometry depends on externally-driven, variable-size input
//! split their work into three steps:
//!
//! 1. **Snapshot** (render thread, every frame): capture the current inputs
//!    into an immutable [`Snapshot`] and publish it with [`MeshRegen::post`].
//! 2. **Compare-and-recompute** ([`MeshRegen::process`], any thread): if the
//!    snapshot differs from the one behind the current mesh, tessellate and
//!    publish a [`MeshUpdate`]; otherwise discard it.
//! 3. **Apply** (render thread, next frame): [`MeshRegen::take_update`] and
//!    install the result on the physical node.
//!
//! Each direction is a single-slot, last-write-wins mailbox with one producer
//! and one consumer, so a recomputation that goes stale is simply superseded:
//! its result is overwritten or discarded, never partially applied.
//!
//! [`BackgroundPass`] detaches the recompute step from the tree so a worker
//! thread can drive it while the render thread keeps tree ownership;
//! [`BackgroundWorker`] owns such a thread and loops a pass at a fixed period
//! until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::mesh::TriangleMesh;

/// Immutable capture of the inputs that determine an item's geometry at one
/// point in time.
///
/// Absent or degenerate inputs snapshot as `Empty`, which is "nothing to
/// draw", not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<S> {
    Empty,
    Data(S),
}

/// A computed geometry payload, or the instruction to clear the node.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshUpdate {
    Apply(TriangleMesh),
    Clear,
}

/// Per-item hand-off channel between the render step and the background
/// recompute step.
///
/// Shared as an `Arc` between the owning leaf and any [`BackgroundPass`]
/// collected from the tree.
#[derive(Debug)]
pub struct MeshRegen<S> {
    /// Pending input snapshot, posted by the render step.
    input: Mutex<Option<Snapshot<S>>>,
    /// Pending artifact, posted by the recompute step.
    output: Mutex<Option<MeshUpdate>>,
    /// The snapshot that produced the most recent artifact. Touched only by
    /// the recompute step.
    last: Mutex<Option<Snapshot<S>>>,
}

impl<S: PartialEq> MeshRegen<S> {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(None),
            output: Mutex::new(None),
            last: Mutex::new(None),
        }
    }

    /// Publishes the snapshot for this frame, overwriting any unconsumed one.
    pub fn post(&self, snapshot: Snapshot<S>) {
        *self.input.lock().unwrap() = Some(snapshot);
    }

    /// Runs the compare-and-recompute step.
    ///
    /// Takes the pending snapshot, if any. A snapshot equal to the one behind
    /// the current artifact is discarded without recomputation. A changed
    /// snapshot is tessellated into [`MeshUpdate::Apply`]; `Empty` becomes
    /// [`MeshUpdate::Clear`]. Publishing overwrites any unconsumed update.
    pub fn process<F>(&self, tessellate: F)
    where
        F: FnOnce(&S) -> TriangleMesh,
    {
        let Some(snapshot) = self.input.lock().unwrap().take() else {
            return;
        };

        let mut last = self.last.lock().unwrap();
        if last.as_ref() == Some(&snapshot) {
            return;
        }

        let update = match &snapshot {
            Snapshot::Empty => MeshUpdate::Clear,
            Snapshot::Data(data) => MeshUpdate::Apply(tessellate(data)),
        };
        *last = Some(snapshot);
        *self.output.lock().unwrap() = Some(update);
    }

    /// Consumes the pending update, if any. Called from the render step.
    pub fn take_update(&self) -> Option<MeshUpdate> {
        self.output.lock().unwrap().take()
    }
}

/// One recompute job, bound to a single item's channel.
pub(crate) type RegenJob = Box<dyn Fn() + Send + Sync>;

/// The recompute jobs of every deferred item in a tree, collected so a worker
/// thread can run them without access to the tree itself.
///
/// A pass goes stale when the tree is structurally edited: jobs for removed
/// items keep running harmlessly against their orphaned channels, and new
/// items are not covered. Re-collect after edits.
pub struct BackgroundPass {
    jobs: Vec<RegenJob>,
}

impl BackgroundPass {
    pub(crate) fn new(jobs: Vec<RegenJob>) -> Self {
        Self { jobs }
    }

    /// Runs every job once, in collection order.
    pub fn run(&self) {
        for job in &self.jobs {
            job();
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Owns a worker thread that runs a [`BackgroundPass`] at a fixed period
/// until stopped.
///
/// The thread stops promptly on [`stop`](BackgroundWorker::stop) or drop; a
/// pass in progress finishes first.
pub struct BackgroundWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Spawns the worker thread.
    pub fn spawn(pass: BackgroundPass, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Acquire) {
                pass.run();
                std::thread::park_timeout(period);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the worker and joins its thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
