use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use super::scheduler::{ControlFlow, Scheduler, TaskHandle};

pub fn format_mm_ss(total_secs: u32) -> String {
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// Elapsed-seconds counter advanced by a periodic tick. The tick is
/// cancelled on `stop`, on restart and when the timer is dropped.
pub struct GameTimer {
    scheduler: Rc<dyn Scheduler>,
    interval: Duration,
    elapsed: Rc<Cell<u32>>,
    handle: Option<TaskHandle>,
}

impl GameTimer {
    pub fn new(scheduler: Rc<dyn Scheduler>, interval: Duration) -> Self {
        GameTimer {
            scheduler,
            interval,
            elapsed: Rc::new(Cell::new(0)),
            handle: None,
        }
    }

    pub fn start(&mut self, reset_elapsed: bool, mut on_tick: impl FnMut(u32) + 'static) {
        self.stop();
        if reset_elapsed {
            self.elapsed.set(0);
        }

        let elapsed = Rc::clone(&self.elapsed);
        let handle = self.scheduler.repeat(
            self.interval,
            Box::new(move || {
                let secs = elapsed.get().saturating_add(1);
                elapsed.set(secs);
                on_tick(secs);
                ControlFlow::Continue
            }),
        );
        self.handle = Some(handle);
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn reset(&mut self) {
        self.stop();
        self.elapsed.set(0);
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed.get()
    }
}

impl Drop for GameTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
