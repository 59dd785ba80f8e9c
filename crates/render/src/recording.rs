//! In-memory backend that records what a GPU backend would do.
//!
//! Used by tests and by the headless CLI to trace frames without a device.

use crate::error::RenderError;
use crate::pipeline::{FrameInputs, FramePhase, Pass, PassExecutor, draw_pass_geometry};
use crate::scene::{DrawKind, DrawSink, InstanceDraw};
use crate::target::{Completeness, DeviceLimits, RenderDevice, TargetSpec};
use serde::Serialize;
use std::collections::HashMap;

/// Device that hands out sequential ids instead of GPU textures.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    limits: DeviceLimits,
    next_id: u32,
    allocated: Vec<String>,
    incomplete: HashMap<String, String>,
}

impl RecordingDevice {
    pub fn new(limits: DeviceLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Make the completeness check fail for targets with this label.
    pub fn fail_completeness(&mut self, label: impl Into<String>, reason: impl Into<String>) {
        self.incomplete.insert(label.into(), reason.into());
    }

    /// Labels of every allocation, in order.
    pub fn allocations(&self) -> &[String] {
        &self.allocated
    }
}

impl RenderDevice for RecordingDevice {
    type Target = u32;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn allocate_target(&mut self, spec: &TargetSpec) -> Result<u32, RenderError> {
        let id = self.next_id;
        self.next_id += 1;
        self.allocated.push(spec.label.clone());
        Ok(id)
    }

    fn check_complete(&self, _target: &u32, spec: &TargetSpec) -> Completeness {
        match self.incomplete.get(&spec.label) {
            Some(reason) => Completeness::Incomplete(reason.clone()),
            None => Completeness::Complete,
        }
    }
}

/// One recorded backend operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceEvent {
    BeginPass { frame: u64, phase: FramePhase },
    Draw {
        phase: FramePhase,
        kind: DrawKind,
        slot: usize,
        mesh: u32,
    },
    EndPass { frame: u64, phase: FramePhase },
    Present { frame: u64 },
}

/// Executor that appends every operation to a trace.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    events: Vec<TraceEvent>,
    bound: Option<FramePhase>,
    fail_at: Option<FramePhase>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a device failure when `phase` begins.
    pub fn fail_at(mut self, phase: FramePhase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Phases that began, in order.
    pub fn phases(&self) -> Vec<FramePhase> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::BeginPass { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    pub fn draws_in(&self, phase: FramePhase) -> Vec<(DrawKind, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Draw {
                    phase: p,
                    kind,
                    slot,
                    ..
                } if *p == phase => Some((*kind, *slot)),
                _ => None,
            })
            .collect()
    }
}

struct TraceSink<'a> {
    phase: FramePhase,
    events: &'a mut Vec<TraceEvent>,
}

impl DrawSink for TraceSink<'_> {
    fn draw(&mut self, draw: &InstanceDraw) {
        self.events.push(TraceEvent::Draw {
            phase: self.phase,
            kind: draw.kind,
            slot: draw.slot,
            mesh: draw.mesh.0,
        });
    }
}

impl PassExecutor for RecordingExecutor {
    fn begin_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<(), RenderError> {
        if let Some(open) = self.bound {
            return Err(RenderError::Device(format!(
                "{} began while {open} is still bound",
                pass.phase
            )));
        }
        if self.fail_at == Some(pass.phase) {
            return Err(RenderError::Device(format!(
                "simulated device loss in {}",
                pass.phase
            )));
        }
        self.bound = Some(pass.phase);
        self.events.push(TraceEvent::BeginPass {
            frame: frame.frame_index,
            phase: pass.phase,
        });
        Ok(())
    }

    fn run_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<u32, RenderError> {
        let mut sink = TraceSink {
            phase: pass.phase,
            events: &mut self.events,
        };
        Ok(draw_pass_geometry(pass, frame, &mut sink))
    }

    fn end_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<(), RenderError> {
        self.bound = None;
        self.events.push(TraceEvent::EndPass {
            frame: frame.frame_index,
            phase: pass.phase,
        });
        if pass.phase == FramePhase::Present {
            self.events.push(TraceEvent::Present {
                frame: frame.frame_index,
            });
        }
        Ok(())
    }
}
