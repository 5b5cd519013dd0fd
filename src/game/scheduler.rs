//! Cancellable one-shot and periodic callbacks on the UI thread.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

pub use glib::ControlFlow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

pub trait Scheduler {
    fn once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle;

    /// Runs `task` every `interval` until it returns `ControlFlow::Break`
    /// or the handle is cancelled.
    fn repeat(&self, interval: Duration, task: Box<dyn FnMut() -> ControlFlow>) -> TaskHandle;

    /// No-op for tasks that already ran to completion.
    fn cancel(&self, handle: TaskHandle);
}

/// Dispatches through the global default glib main context, so it must be
/// used from the thread that owns that context.
#[derive(Default)]
pub struct GlibScheduler {
    next_id: Cell<u64>,
    sources: Rc<RefCell<HashMap<u64, glib::SourceId>>>,
}

impl GlibScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources still attached to the main context.
    pub fn pending(&self) -> usize {
        self.sources.borrow().len()
    }

    fn next_handle(&self) -> TaskHandle {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        TaskHandle(id)
    }
}

impl Scheduler for GlibScheduler {
    fn once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        let handle = self.next_handle();
        let sources = Rc::clone(&self.sources);
        let source = glib::timeout_add_local_once(delay, move || {
            // The source is gone once this returns; removing it later would panic.
            sources.borrow_mut().remove(&handle.0);
            task();
        });
        self.sources.borrow_mut().insert(handle.0, source);
        handle
    }

    fn repeat(&self, interval: Duration, mut task: Box<dyn FnMut() -> ControlFlow>) -> TaskHandle {
        let handle = self.next_handle();
        let sources = Rc::clone(&self.sources);
        let source = glib::timeout_add_local(interval, move || {
            let flow = task();
            if matches!(flow, ControlFlow::Break) {
                sources.borrow_mut().remove(&handle.0);
            }
            flow
        });
        self.sources.borrow_mut().insert(handle.0, source);
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        let source = self.sources.borrow_mut().remove(&handle.0);
        if let Some(source) = source {
            source.remove();
        }
    }
}

enum TaskKind {
    Once(Box<dyn FnOnce()>),
    Repeat {
        interval: Duration,
        task: Box<dyn FnMut() -> ControlFlow>,
    },
}

struct Scheduled {
    due: Duration,
    kind: TaskKind,
}

/// Virtual clock that only moves when `advance` is called. Tasks due at the
/// same instant run in the order they were scheduled.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    tasks: RefCell<BTreeMap<u64, Scheduled>>,
    running: Cell<Option<u64>>,
    running_cancelled: Cell<bool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let next = {
                let tasks = self.tasks.borrow();
                tasks
                    .iter()
                    .filter(|(_, scheduled)| scheduled.due <= target)
                    .min_by_key(|(id, scheduled)| (scheduled.due, **id))
                    .map(|(id, _)| *id)
            };
            let Some(id) = next else {
                break;
            };
            let Some(Scheduled { due, kind }) = self.tasks.borrow_mut().remove(&id) else {
                break;
            };

            self.now.set(due);
            self.running.set(Some(id));
            self.running_cancelled.set(false);
            match kind {
                TaskKind::Once(task) => task(),
                TaskKind::Repeat { interval, mut task } => {
                    let flow = task();
                    if matches!(flow, ControlFlow::Continue) && !self.running_cancelled.get() {
                        self.tasks.borrow_mut().insert(
                            id,
                            Scheduled {
                                due: due + interval,
                                kind: TaskKind::Repeat { interval, task },
                            },
                        );
                    }
                }
            }
            self.running.set(None);
        }
        self.now.set(target);
    }

    fn schedule(&self, delay: Duration, kind: TaskKind) -> TaskHandle {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        self.tasks.borrow_mut().insert(
            id,
            Scheduled {
                due: self.now.get() + delay,
                kind,
            },
        );
        TaskHandle(id)
    }
}

impl Scheduler for ManualScheduler {
    fn once(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskHandle {
        self.schedule(delay, TaskKind::Once(task))
    }

    fn repeat(&self, interval: Duration, task: Box<dyn FnMut() -> ControlFlow>) -> TaskHandle {
        let interval = interval.max(Duration::from_millis(1));
        self.schedule(interval, TaskKind::Repeat { interval, task })
    }

    fn cancel(&self, handle: TaskHandle) {
        let removed = self.tasks.borrow_mut().remove(&handle.0).is_some();
        if !removed && self.running.get() == Some(handle.0) {
            self.running_cancelled.set(true);
        }
    }
}

/// Runs `f` owning the global default main context, which is where
/// `glib::timeout_add_local*` attaches its sources. Test threads take
/// turns so only one of them iterates the context at a time.
#[cfg(test)]
pub(crate) fn with_main_context<R>(f: impl FnOnce(&glib::MainContext) -> R) -> R {
    use std::sync::Mutex;

    static MAIN_CONTEXT_LOCK: Mutex<()> = Mutex::new(());
    let _guard = MAIN_CONTEXT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let ctx = glib::MainContext::default();
    ctx.with_thread_default(|| f(&ctx))
        .expect("default main context owned by another thread")
}

/// Iterates `ctx` until `done` holds, giving up after `limit`.
#[cfg(test)]
pub(crate) fn spin_until(
    ctx: &glib::MainContext,
    limit: Duration,
    mut done: impl FnMut() -> bool,
) -> bool {
    let started = std::time::Instant::now();
    while !done() {
        if started.elapsed() > limit {
            return false;
        }
        if !ctx.iteration(false) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    true
}
