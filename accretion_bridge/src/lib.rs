// Copyright 2026 the Accretion Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer/consumer frame bridge over `accretion_core`.
//!
//! The core crate is thread-agnostic; this crate supplies the two-thread
//! arrangement it was designed for. A [`RenderThread`] owns the scene (the
//! node store, animation context, and damage accumulator) behind a mutex and
//! runs the frame loop; any number of [`SceneProxy`] handles on producer
//! threads stage changes under the same lock and hand frames off:
//!
//! - [`SceneProxy::sync_and_draw`] blocks until the render thread has run a
//!   full sync, so the producer knows its staged state was promoted before
//!   it records the next frame.
//! - [`SceneProxy::request_frame`] just nudges the render thread to redraw
//!   from committed state (a consumer-only sync), without blocking.
//!
//! While animators are scheduled, the render thread keeps producing frames
//! on its own at a fixed cadence, so animation continues with no producer
//! involvement.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration as StdDuration, Instant};

use accretion_core::animation::{AnimationContext, AnimationListener, AnimatorId};
use accretion_core::clock::FrameClock;
use accretion_core::damage::DamageAccumulator;
use accretion_core::node::{NodeHandle, NodeId, NodeStore, SyncMode, TreeObserver};
use accretion_core::time::FrameTime;
use kurbo::Rect;

/// Cadence of self-driven animation frames when no producer is pushing.
const ANIMATION_FRAME_INTERVAL: StdDuration = StdDuration::from_millis(16);

/// A [`FrameClock`] backed by the process monotonic clock.
#[derive(Clone, Copy, Debug)]
pub struct InstantClock {
    epoch: Instant,
}

impl InstantClock {
    /// Creates a clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for InstantClock {
    fn latest_frame_time(&self) -> FrameTime {
        FrameTime(u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX))
    }
}

/// What the render thread calls once per produced frame.
///
/// Implementations draw the committed tree and react to structural and
/// animation lifecycle events. All methods run on the render thread.
pub trait FramePresenter: Send {
    /// Draw the committed tree; `damage` is the root-space rectangle that
    /// changed since the last presented frame.
    fn present(&mut self, scene: &NodeStore, damage: Rect);

    /// A node lost its last committed parent this frame. Backends drop
    /// cached per-node resources here.
    fn on_node_possibly_detached(&mut self, node: NodeId) {
        let _ = node;
    }

    /// An animator reached a terminal state this frame. Reported exactly
    /// once per animator.
    fn on_animator_finished(&mut self, node: NodeId, animator: AnimatorId) {
        let _ = (node, animator);
    }
}

/// The scene state guarded by the bridge mutex.
#[derive(Debug)]
pub struct Scene {
    /// The node slab; producers stage into it, the frame loop promotes.
    pub store: NodeStore,
    /// Animation scheduling shared by both sides.
    pub ctx: AnimationContext,
    root: Option<NodeHandle>,
    damage: DamageAccumulator,
    running: bool,
    redraw_requested: bool,
    sync_requests: u64,
    sync_completed: u64,
}

impl Scene {
    fn new() -> Self {
        Self {
            store: NodeStore::new(),
            ctx: AnimationContext::new(),
            root: None,
            damage: DamageAccumulator::new(),
            running: true,
            redraw_requested: false,
            sync_requests: 0,
            sync_completed: 0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    scene: Mutex<Scene>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().expect("scene lock poisoned")
    }
}

/// Producer-side handle to the scene. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct SceneProxy {
    shared: Arc<Shared>,
}

impl SceneProxy {
    /// Runs `f` with exclusive access to the scene.
    ///
    /// This is how producers create nodes, stage property and content
    /// changes, and attach animators. Staged changes become visible at the
    /// next full sync.
    pub fn with_scene<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        let mut guard = self.shared.lock();
        f(&mut guard)
    }

    /// Sets the node the frame loop syncs and draws from.
    pub fn set_root(&self, root: Option<NodeHandle>) {
        self.shared.lock().root = root;
    }

    /// Blocks until the render thread has promoted everything staged so far
    /// and drawn a frame from it.
    ///
    /// Returns early if the render thread has shut down.
    pub fn sync_and_draw(&self) {
        let mut guard = self.shared.lock();
        guard.sync_requests += 1;
        let target = guard.sync_requests;
        self.shared.cond.notify_all();
        while guard.sync_completed < target && guard.running {
            guard = self
                .shared
                .cond
                .wait(guard)
                .expect("scene lock poisoned");
        }
    }

    /// Asks the render thread to redraw from committed state, without
    /// promoting anything staged. Never blocks.
    pub fn request_frame(&self) {
        self.shared.lock().redraw_requested = true;
        self.shared.cond.notify_all();
    }
}

/// Owns the frame-loop thread. Dropping without [`shutdown`](Self::shutdown)
/// leaves the thread running until the process exits.
#[derive(Debug)]
pub struct RenderThread {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl RenderThread {
    /// Spawns the frame loop with the given clock and presenter, returning
    /// the thread handle and a producer proxy.
    pub fn spawn<C, P>(clock: C, presenter: P) -> (Self, SceneProxy)
    where
        C: FrameClock + Send + 'static,
        P: FramePresenter + 'static,
    {
        let shared = Arc::new(Shared {
            scene: Mutex::new(Scene::new()),
            cond: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("accretion-render".into())
            .spawn(move || frame_loop(&thread_shared, &clock, presenter))
            .expect("failed to spawn render thread");
        log::info!("render thread started");
        let proxy = SceneProxy {
            shared: Arc::clone(&shared),
        };
        (Self { shared, handle }, proxy)
    }

    /// Stops the frame loop and joins the thread. Any blocked
    /// [`SceneProxy::sync_and_draw`] callers are released.
    pub fn shutdown(self) {
        {
            let mut guard = self.shared.lock();
            guard.running = false;
        }
        self.shared.cond.notify_all();
        if self.handle.join().is_err() {
            log::error!("render thread panicked during shutdown");
        }
    }
}

/// Bridges [`FramePresenter`] to the core's [`TreeObserver`].
struct DetachRelay<'a, P: FramePresenter>(&'a mut P);

impl<P: FramePresenter> TreeObserver for DetachRelay<'_, P> {
    fn on_node_possibly_detached(&mut self, node: NodeId) {
        self.0.on_node_possibly_detached(node);
    }
}

/// Bridges [`FramePresenter`] to the core's [`AnimationListener`].
struct FinishRelay<'a, P: FramePresenter>(&'a mut P);

impl<P: FramePresenter> AnimationListener for FinishRelay<'_, P> {
    fn on_animator_finished(&mut self, node: NodeId, animator: AnimatorId) {
        self.0.on_animator_finished(node, animator);
    }
}

fn frame_loop<C: FrameClock, P: FramePresenter>(shared: &Shared, clock: &C, mut presenter: P) {
    let mut guard = shared.lock();
    loop {
        if !guard.running {
            break;
        }

        let mode = if guard.sync_completed < guard.sync_requests {
            SyncMode::Full
        } else if guard.redraw_requested {
            SyncMode::ConsumerOnly
        } else if guard.ctx.has_animations() {
            // Self-paced animation frame: sleep out the interval, then run a
            // consumer-only frame unless a producer request arrived first.
            let (g, res) = shared
                .cond
                .wait_timeout(guard, ANIMATION_FRAME_INTERVAL)
                .expect("scene lock poisoned");
            guard = g;
            if !res.timed_out() || !guard.running {
                continue;
            }
            SyncMode::ConsumerOnly
        } else {
            guard = shared.cond.wait(guard).expect("scene lock poisoned");
            continue;
        };
        let requested = guard.redraw_requested;
        guard.redraw_requested = false;

        let scene = &mut *guard;
        scene.ctx.start_frame(clock);
        if let Some(root) = scene.root.filter(|r| scene.store.is_alive(*r)) {
            let mut observer = DetachRelay(&mut presenter);
            scene
                .store
                .prepare_tree(root, mode, &mut scene.damage, &mut scene.ctx, &mut observer);
        }
        scene.ctx.run_remaining_animations(&mut scene.store);
        let damage = scene.damage.finish();

        log::trace!("frame: mode={mode:?} damage={damage:?}");
        // An explicitly requested redraw presents even with empty damage;
        // the backend may have lost its surface contents.
        if damage.area() > 0.0 || mode == SyncMode::Full || requested {
            presenter.present(&scene.store, damage);
        }
        let mut listener = FinishRelay(&mut presenter);
        scene.ctx.dispatch_finished(&mut listener);

        if mode == SyncMode::Full {
            guard.sync_completed = guard.sync_requests;
        }
        shared.cond.notify_all();
    }
    // Release any producer still blocked in sync_and_draw.
    drop(guard);
    shared.cond.notify_all();
    log::info!("render thread stopped");
}
