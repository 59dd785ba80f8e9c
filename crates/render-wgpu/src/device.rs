//! Render target allocation on a wgpu device.

use crate::setup::GpuContext;
use glint_render::{
    AttachmentFormat, Completeness, DeviceLimits, RenderDevice, RenderError, TargetSpec,
};

const ALL_FORMATS: [AttachmentFormat; 4] = [
    AttachmentFormat::Rgba8UnormSrgb,
    AttachmentFormat::Rgba16Float,
    AttachmentFormat::Depth32Float,
    AttachmentFormat::Depth24PlusStencil8,
];

pub fn texture_format(format: AttachmentFormat) -> wgpu::TextureFormat {
    match format {
        AttachmentFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        AttachmentFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        AttachmentFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        AttachmentFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

/// Query what the device can allocate. Without adapter-specific format
/// features only the guaranteed 1x and 4x are usable.
pub(crate) fn device_limits(adapter: &wgpu::Adapter, device: &wgpu::Device) -> DeviceLimits {
    let mut limits = DeviceLimits::new(device.limits().max_texture_dimension_2d);
    let adapter_specific = device
        .features()
        .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
    for format in ALL_FORMATS {
        let counts = if adapter_specific {
            adapter
                .get_texture_format_features(texture_format(format))
                .flags
                .supported_sample_counts()
        } else {
            vec![1, 4]
        };
        tracing::debug!("{format:?} sample counts: {counts:?}");
        limits.allow_samples(format, &counts);
    }
    limits
}

/// A texture plus its default view.
#[derive(Debug)]
pub struct Attachment {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// GPU side of a render target.
#[derive(Debug)]
pub struct GpuTarget {
    pub color: Option<Attachment>,
    pub depth: Option<Attachment>,
    /// Validation error captured while allocating.
    error: Option<String>,
}

impl GpuTarget {
    pub(crate) fn color_view(&self, label: &str) -> Result<&wgpu::TextureView, RenderError> {
        self.color
            .as_ref()
            .map(|a| &a.view)
            .ok_or_else(|| RenderError::resource(label, "no color attachment"))
    }

    pub(crate) fn depth_view(&self, label: &str) -> Result<&wgpu::TextureView, RenderError> {
        self.depth
            .as_ref()
            .map(|a| &a.view)
            .ok_or_else(|| RenderError::resource(label, "no depth attachment"))
    }
}

fn create_attachment(
    device: &wgpu::Device,
    spec: &TargetSpec,
    format: AttachmentFormat,
    suffix: &str,
) -> Attachment {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
    if spec.sampled {
        usage |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    let label = format!("{}_{suffix}", spec.label);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&label),
        size: wgpu::Extent3d {
            width: spec.extent.width,
            height: spec.extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: spec.sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(format),
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Attachment { texture, view }
}

fn check_attachment(
    attachment: Option<&Attachment>,
    expected: Option<AttachmentFormat>,
    spec: &TargetSpec,
) -> Result<(), String> {
    match (attachment, expected) {
        (None, None) => Ok(()),
        (Some(_), None) => Err("unexpected attachment".into()),
        (None, Some(format)) => Err(format!("missing {format:?} attachment")),
        (Some(a), Some(format)) => {
            let texture = &a.texture;
            if texture.format() != texture_format(format) {
                return Err(format!("attachment is {:?}, not {format:?}", texture.format()));
            }
            if texture.width() != spec.extent.width || texture.height() != spec.extent.height {
                return Err(format!(
                    "attachment is {}x{}, not {}",
                    texture.width(),
                    texture.height(),
                    spec.extent
                ));
            }
            if texture.sample_count() != spec.sample_count {
                return Err(format!(
                    "attachment has {} samples, not {}",
                    texture.sample_count(),
                    spec.sample_count
                ));
            }
            Ok(())
        }
    }
}

impl RenderDevice for GpuContext {
    type Target = GpuTarget;

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn allocate_target(&mut self, spec: &TargetSpec) -> Result<GpuTarget, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let color = spec
            .attachments
            .color
            .then(|| create_attachment(&self.device, spec, spec.color_format.into(), "color"));
        let depth = spec
            .depth_format()
            .map(|format| create_attachment(&self.device, spec, format, "depth"));
        let error = pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string());

        Ok(GpuTarget {
            color,
            depth,
            error,
        })
    }

    fn check_complete(&self, target: &GpuTarget, spec: &TargetSpec) -> Completeness {
        if let Some(error) = &target.error {
            return Completeness::Incomplete(error.clone());
        }
        let expected_color = spec.attachments.color.then(|| spec.color_format.into());
        let result = check_attachment(target.color.as_ref(), expected_color, spec)
            .and_then(|()| check_attachment(target.depth.as_ref(), spec.depth_format(), spec));
        match result {
            Ok(()) => Completeness::Complete,
            Err(reason) => Completeness::Incomplete(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_map_one_to_one() {
        let mapped: Vec<_> = ALL_FORMATS.iter().map(|f| texture_format(*f)).collect();
        for (i, a) in mapped.iter().enumerate() {
            for b in &mapped[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(texture_format(AttachmentFormat::Depth24PlusStencil8).has_stencil_aspect());
        assert!(!texture_format(AttachmentFormat::Depth32Float).has_stencil_aspect());
    }
}
