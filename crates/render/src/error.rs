use crate::pipeline::FramePhase;
use crate::target::TargetHandle;

/// Errors from target allocation, pipeline construction and frame execution.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A render target failed validation or the device's completeness check.
    #[error("render target '{label}' incomplete: {reason}")]
    Resource { label: String, reason: String },

    #[error("pipeline configuration error: {0}")]
    Pipeline(String),

    /// A pass ran out of phase order or read a target nothing had written
    /// yet this frame.
    #[error("pass order violation in {phase:?}: {reason}")]
    OrderViolation { phase: FramePhase, reason: String },

    #[error("unknown render target {0}")]
    UnknownTarget(TargetHandle),

    #[error("device error: {0}")]
    Device(String),
}

impl RenderError {
    pub fn resource(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            label: label.into(),
            reason: reason.into(),
        }
    }
}
