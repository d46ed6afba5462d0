// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simulator Loop
//!
//! Fixed-step run loop over a coordinator, with listener events and a
//! cooperative interrupt flag. The flag is checked between steps only;
//! a step in flight always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use nefsim_model::{Network, SimulationError, StructuralError};

use crate::coordinator::StepCoordinator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorEventKind {
    Started,
    StepTaken,
    Finished,
}

/// Progress notification, `progress` in `[0, 1]` over the requested run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorEvent {
    pub progress: f32,
    pub kind: SimulatorEventKind,
}

pub trait SimulatorListener: Send {
    fn on_event(&mut self, event: &SimulatorEvent);
}

pub struct Simulator {
    coordinator: StepCoordinator,
    listeners: Vec<Box<dyn SimulatorListener>>,
    interrupt: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(coordinator: StepCoordinator) -> Self {
        Self {
            coordinator,
            listeners: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn SimulatorListener>) {
        self.listeners.push(listener);
    }

    /// Flag another thread can set to stop the run at the next step
    /// boundary.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn coordinator(&self) -> &StepCoordinator {
        &self.coordinator
    }

    fn emit(&mut self, kind: SimulatorEventKind, progress: f32) {
        let event = SimulatorEvent { progress, kind };
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    /// Run `[start, end]` in steps of `dt`, the final step clipped to `end`.
    pub fn run(
        &mut self,
        network: &mut Network,
        start: f32,
        end: f32,
        dt: f32,
    ) -> Result<(), SimulationError> {
        if !(dt > 0.0) {
            return Err(StructuralError::InvalidTimeStep(dt).into());
        }
        self.interrupt.store(false, Ordering::SeqCst);
        self.emit(SimulatorEventKind::Started, 0.0);

        let span = (end - start).max(f32::MIN_POSITIVE);
        let mut t = start;
        while t < end {
            if self.interrupt.load(Ordering::SeqCst) {
                info!(time = t, "run interrupted");
                break;
            }
            let step_end = (t + dt).min(end);
            self.coordinator.step(network, t, step_end)?;
            t = step_end;
            self.emit(SimulatorEventKind::StepTaken, (t - start) / span);
        }

        self.emit(SimulatorEventKind::Finished, (t - start) / span);
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), SimulationError> {
        self.coordinator.close()
    }
}
