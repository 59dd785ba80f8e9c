//! Offscreen render targets: specs, validation and ownership.
//!
//! # Invariants
//! - A handle is only ever returned for a target that passed both spec
//!   validation and the device's completeness check.
//! - Handles from before [`RenderTargetManager::release_all`] never resolve
//!   again.

use crate::error::RenderError;
use crate::pipeline::PassSet;
use glint_common::Extent2d;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One kind of attachment a target can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    Depth,
    Stencil,
}

/// Attachment set of a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attachments {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl Attachments {
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
        stencil: false,
    };
    pub const DEPTH: Self = Self {
        color: false,
        depth: true,
        stencil: false,
    };
    pub const COLOR_DEPTH_STENCIL: Self = Self {
        color: true,
        depth: true,
        stencil: true,
    };

    pub fn is_empty(&self) -> bool {
        !(self.color || self.depth || self.stencil)
    }

    pub fn contains(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Color => self.color,
            AttachmentKind::Depth => self.depth,
            AttachmentKind::Stencil => self.stencil,
        }
    }
}

/// Color attachment format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    Rgba8UnormSrgb,
    /// Linear HDR, tone mapped by the post pass.
    #[default]
    Rgba16Float,
}

/// Concrete texture format of a single attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentFormat {
    Rgba8UnormSrgb,
    Rgba16Float,
    Depth32Float,
    Depth24PlusStencil8,
}

impl From<ColorFormat> for AttachmentFormat {
    fn from(format: ColorFormat) -> Self {
        match format {
            ColorFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            ColorFormat::Rgba16Float => Self::Rgba16Float,
        }
    }
}

/// What the device can allocate.
///
/// Sample support is a bitmask per format. The mask holds each supported
/// count as its own bit (1, 2, 4, 8...), so a mask of `0b0101` means 1 and 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_texture_dimension_2d: u32,
    sample_counts: BTreeMap<AttachmentFormat, u32>,
}

impl DeviceLimits {
    pub fn new(max_texture_dimension_2d: u32) -> Self {
        Self {
            max_texture_dimension_2d,
            sample_counts: BTreeMap::new(),
        }
    }

    /// Baseline every backend guarantees: 1 and 4 samples on all formats.
    pub fn baseline(max_texture_dimension_2d: u32) -> Self {
        let mut limits = Self::new(max_texture_dimension_2d);
        for format in [
            AttachmentFormat::Rgba8UnormSrgb,
            AttachmentFormat::Rgba16Float,
            AttachmentFormat::Depth32Float,
            AttachmentFormat::Depth24PlusStencil8,
        ] {
            limits.allow_samples(format, &[1, 4]);
        }
        limits
    }

    pub fn allow_samples(&mut self, format: AttachmentFormat, counts: &[u32]) -> &mut Self {
        let mask = self.sample_counts.entry(format).or_insert(0);
        for &count in counts {
            if count.is_power_of_two() && count < 32 {
                *mask |= count;
            }
        }
        self
    }

    pub fn supports_samples(&self, format: AttachmentFormat, count: u32) -> bool {
        count.is_power_of_two()
            && self
                .sample_counts
                .get(&format)
                .is_some_and(|mask| mask & count != 0)
    }

    /// Highest sample count supported by every listed format, capped at
    /// `wanted`.
    pub fn best_sample_count(&self, formats: &[AttachmentFormat], wanted: u32) -> u32 {
        let mut count = wanted.max(1).next_power_of_two();
        if count > wanted.max(1) {
            count /= 2;
        }
        while count > 1 {
            if formats.iter().all(|f| self.supports_samples(*f, count)) {
                return count;
            }
            count /= 2;
        }
        1
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::baseline(2048)
    }
}

/// Everything needed to allocate a render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub label: String,
    pub extent: Extent2d,
    pub sample_count: u32,
    pub attachments: Attachments,
    pub color_format: ColorFormat,
    /// Whether a later pass samples this target as a texture.
    pub sampled: bool,
}

impl TargetSpec {
    /// Depth-only square shadow map.
    pub fn shadow(size: u32) -> Self {
        Self {
            label: "shadow-map".into(),
            extent: Extent2d::square(size),
            sample_count: 1,
            attachments: Attachments::DEPTH,
            color_format: ColorFormat::default(),
            sampled: true,
        }
    }

    /// Scene color target with depth and stencil, rendered with `samples`.
    pub fn multisample_color(extent: Extent2d, samples: u32, format: ColorFormat) -> Self {
        Self {
            label: "scene-msaa".into(),
            extent,
            sample_count: samples,
            attachments: Attachments::COLOR_DEPTH_STENCIL,
            color_format: format,
            sampled: false,
        }
    }

    /// Single-sample color texture the multisampled scene resolves into.
    pub fn resolve(extent: Extent2d, format: ColorFormat) -> Self {
        Self {
            label: "scene-resolve".into(),
            extent,
            sample_count: 1,
            attachments: Attachments::COLOR,
            color_format: format,
            sampled: true,
        }
    }

    /// Single-sample scene target sampled directly by the post pass.
    pub fn scene_color(extent: Extent2d, format: ColorFormat) -> Self {
        Self {
            label: "scene-color".into(),
            extent,
            sample_count: 1,
            attachments: Attachments::COLOR_DEPTH_STENCIL,
            color_format: format,
            sampled: true,
        }
    }

    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    /// Depth format implied by the attachment set.
    pub fn depth_format(&self) -> Option<AttachmentFormat> {
        match (self.attachments.depth, self.attachments.stencil) {
            (true, true) => Some(AttachmentFormat::Depth24PlusStencil8),
            (true, false) => Some(AttachmentFormat::Depth32Float),
            _ => None,
        }
    }

    pub fn attachment_formats(&self) -> Vec<AttachmentFormat> {
        let mut formats = Vec::with_capacity(2);
        if self.attachments.color {
            formats.push(self.color_format.into());
        }
        formats.extend(self.depth_format());
        formats
    }

    /// Check the spec against device limits. The error is the reason text.
    pub fn validate(&self, limits: &DeviceLimits) -> Result<(), String> {
        if self.extent.is_empty() {
            return Err(format!("zero resolution {}", self.extent));
        }
        if self.extent.max_dimension() > limits.max_texture_dimension_2d {
            return Err(format!(
                "resolution {} exceeds device maximum {}",
                self.extent, limits.max_texture_dimension_2d
            ));
        }
        if self.attachments.is_empty() {
            return Err("no attachments".into());
        }
        if self.attachments.stencil && !self.attachments.depth {
            return Err("stencil attachment requires depth".into());
        }
        if !self.sample_count.is_power_of_two() {
            return Err(format!(
                "sample count {} is not a power of two",
                self.sample_count
            ));
        }
        for format in self.attachment_formats() {
            if !limits.supports_samples(format, self.sample_count) {
                return Err(format!(
                    "{format:?} does not support {} samples",
                    self.sample_count
                ));
            }
        }
        if self.sampled && self.is_multisampled() {
            return Err("multisampled targets cannot be sampled directly".into());
        }
        Ok(())
    }
}

/// Stable identifier for a target owned by a [`RenderTargetManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Verdict of a device's completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete(String),
}

/// The graphics device seam used for target allocation.
pub trait RenderDevice {
    /// Backend representation of an allocated target.
    type Target;

    fn limits(&self) -> &DeviceLimits;

    fn allocate_target(&mut self, spec: &TargetSpec) -> Result<Self::Target, RenderError>;

    fn check_complete(&self, target: &Self::Target, spec: &TargetSpec) -> Completeness;
}

struct Entry<T> {
    spec: TargetSpec,
    target: T,
}

/// Owns every offscreen target and its backend attachments.
pub struct RenderTargetManager<T> {
    entries: Vec<Entry<T>>,
    generation: u32,
}

impl<T> RenderTargetManager<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            generation: 0,
        }
    }

    /// Validate, allocate and completeness-check a target.
    pub fn create_target<D>(
        &mut self,
        device: &mut D,
        spec: TargetSpec,
    ) -> Result<TargetHandle, RenderError>
    where
        D: RenderDevice<Target = T>,
    {
        spec.validate(device.limits())
            .map_err(|reason| RenderError::resource(&spec.label, reason))?;

        let target = device.allocate_target(&spec)?;
        if let Completeness::Incomplete(reason) = device.check_complete(&target, &spec) {
            tracing::error!("target '{}' incomplete: {reason}", spec.label);
            return Err(RenderError::resource(&spec.label, reason));
        }

        let handle = TargetHandle {
            index: self.entries.len() as u32,
            generation: self.generation,
        };
        tracing::debug!(
            "created target '{}' {handle} ({}, {} samples, {:?})",
            spec.label,
            spec.extent,
            spec.sample_count,
            spec.attachments
        );
        self.entries.push(Entry { spec, target });
        Ok(handle)
    }

    fn entry(&self, handle: TargetHandle) -> Result<&Entry<T>, RenderError> {
        if handle.generation != self.generation {
            return Err(RenderError::UnknownTarget(handle));
        }
        self.entries
            .get(handle.index as usize)
            .ok_or(RenderError::UnknownTarget(handle))
    }

    pub fn get(&self, handle: TargetHandle) -> Result<&T, RenderError> {
        self.entry(handle).map(|e| &e.target)
    }

    pub fn spec(&self, handle: TargetHandle) -> Result<&TargetSpec, RenderError> {
        self.entry(handle).map(|e| &e.spec)
    }

    pub fn find(&self, label: &str) -> Option<TargetHandle> {
        self.iter()
            .find(|(_, spec, _)| spec.label == label)
            .map(|(handle, _, _)| handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetHandle, &TargetSpec, &T)> {
        let generation = self.generation;
        self.entries.iter().enumerate().map(move |(i, e)| {
            (
                TargetHandle {
                    index: i as u32,
                    generation,
                },
                &e.spec,
                &e.target,
            )
        })
    }

    /// Drop every target. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
        tracing::info!("released {released} render targets");
        released
    }
}

impl<T> Default for RenderTargetManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for the standard set of frame targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetConfig {
    pub extent: Extent2d,
    pub msaa_samples: u32,
    pub shadow_map_size: u32,
    pub color_format: ColorFormat,
}

/// Handles of the targets a [`crate::FramePipeline`] renders through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSet {
    pub shadow: Option<TargetHandle>,
    pub color: TargetHandle,
    pub resolve: Option<TargetHandle>,
}

/// Create shadow, scene color and (when multisampling) resolve targets.
///
/// The shadow map is allocated even when shadows start disabled so the
/// pass can be toggled back on without reallocating.
pub fn create_standard_targets<D: RenderDevice>(
    manager: &mut RenderTargetManager<D::Target>,
    device: &mut D,
    config: &TargetConfig,
    passes: &PassSet,
) -> Result<TargetSet, RenderError> {
    let shadow = manager.create_target(device, TargetSpec::shadow(config.shadow_map_size))?;

    let (color, resolve) = if passes.multisample {
        let color = manager.create_target(
            device,
            TargetSpec::multisample_color(config.extent, config.msaa_samples, config.color_format),
        )?;
        let resolve = manager.create_target(
            device,
            TargetSpec::resolve(config.extent, config.color_format),
        )?;
        (color, Some(resolve))
    } else {
        let color = manager.create_target(
            device,
            TargetSpec::scene_color(config.extent, config.color_format),
        )?;
        (color, None)
    };

    tracing::info!(
        "created {} render targets at {} ({} samples)",
        manager.len(),
        config.extent,
        if passes.multisample {
            config.msaa_samples
        } else {
            1
        }
    );
    Ok(TargetSet {
        shadow: Some(shadow),
        color,
        resolve,
    })
}
