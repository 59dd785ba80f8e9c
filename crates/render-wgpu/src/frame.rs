//! Per-frame command encoding: one render pass per pipeline phase.

use crate::device::GpuTarget;
use crate::renderer::{SceneRenderer, SceneResources};
use crate::setup::GpuContext;
use crate::uniforms::{FrameUniforms, INSTANCE_STRIDE, InstanceSlot, InstanceUniform};
use glint_render::{
    ClearPolicy, DrawKind, DrawSink, DrawSource, FrameInputs, FramePhase, InstanceDraw, MeshId,
    Pass, PassExecutor, RenderError, RenderTargetManager, ShaderRef, TargetRef,
    draw_pass_geometry,
};

fn to_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

fn color_ops(clear: ClearPolicy) -> wgpu::Operations<wgpu::Color> {
    let load = match clear {
        ClearPolicy::Color(color) | ClearPolicy::All { color, .. } => {
            wgpu::LoadOp::Clear(to_color(color))
        }
        ClearPolicy::Load | ClearPolicy::Depth(_) => wgpu::LoadOp::Load,
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}

fn depth_ops(clear: ClearPolicy) -> wgpu::Operations<f32> {
    let load = match clear {
        ClearPolicy::Depth(depth) | ClearPolicy::All { depth, .. } => wgpu::LoadOp::Clear(depth),
        ClearPolicy::Load | ClearPolicy::Color(_) => wgpu::LoadOp::Load,
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}

fn stencil_ops(clear: ClearPolicy) -> wgpu::Operations<u32> {
    let load = match clear {
        ClearPolicy::All { stencil, .. } => wgpu::LoadOp::Clear(stencil),
        _ => wgpu::LoadOp::Load,
    };
    wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
    }
}

fn offscreen<'t>(
    manager: &'t RenderTargetManager<GpuTarget>,
    target: TargetRef,
    phase: FramePhase,
) -> Result<(&'t GpuTarget, &'t str), RenderError> {
    match target {
        TargetRef::Offscreen(handle) => {
            let spec = manager.spec(handle)?;
            Ok((manager.get(handle)?, spec.label.as_str()))
        }
        TargetRef::Surface => Err(RenderError::Pipeline(format!(
            "{phase} pass cannot use the surface as an offscreen target"
        ))),
    }
}

/// A frame being encoded. Passes record into one command encoder which is
/// submitted, then presented, when the Present phase ends.
pub struct WgpuFrame<'a> {
    // Declared before the encoder so an open pass is dropped first.
    pass: Option<wgpu::RenderPass<'static>>,
    encoder: Option<wgpu::CommandEncoder>,
    surface: Option<wgpu::SurfaceTexture>,
    surface_view: wgpu::TextureView,
    gpu: &'a GpuContext,
    renderer: &'a mut SceneRenderer,
    targets: &'a RenderTargetManager<GpuTarget>,
    uniforms_written: bool,
}

impl<'a> WgpuFrame<'a> {
    pub(crate) fn new(
        gpu: &'a GpuContext,
        renderer: &'a mut SceneRenderer,
        targets: &'a RenderTargetManager<GpuTarget>,
        surface: wgpu::SurfaceTexture,
    ) -> Self {
        let surface_view = surface
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        Self {
            pass: None,
            encoder: Some(encoder),
            surface: Some(surface),
            surface_view,
            gpu,
            renderer,
            targets,
            uniforms_written: false,
        }
    }

    /// Whether the frame was submitted and handed to the display.
    pub fn presented(&self) -> bool {
        self.surface.is_none()
    }

    fn submit(&mut self) -> Result<(), RenderError> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| RenderError::Device("frame already submitted".into()))?;
        let surface = self
            .surface
            .take()
            .ok_or_else(|| RenderError::Device("frame already presented".into()))?;
        // Queue writes land before the submitted commands execute.
        self.renderer.upload_instances(&self.gpu.queue);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        surface.present();
        Ok(())
    }
}

impl PassExecutor for WgpuFrame<'_> {
    fn begin_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<(), RenderError> {
        if self.pass.is_some() {
            return Err(RenderError::Device(format!(
                "{} began while another pass is open",
                pass.phase
            )));
        }
        if !self.uniforms_written {
            self.renderer
                .write_frame_uniforms(&self.gpu.queue, &FrameUniforms::new(frame));
            self.uniforms_written = true;
        }
        let targets = self.targets;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| RenderError::Device("frame already submitted".into()))?;
        let label = format!("{}_pass", pass.phase);

        let render_pass = match pass.phase {
            FramePhase::Shadow => {
                let (target, name) = offscreen(targets, pass.target, pass.phase)?;
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&label),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: target.depth_view(name)?,
                        depth_ops: Some(depth_ops(pass.clear)),
                        stencil_ops: None,
                    }),
                    ..Default::default()
                })
            }
            FramePhase::Color => {
                let (target, name) = offscreen(targets, pass.target, pass.phase)?;
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target.color_view(name)?,
                        resolve_target: None,
                        ops: color_ops(pass.clear),
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: target.depth_view(name)?,
                        depth_ops: Some(depth_ops(pass.clear)),
                        stencil_ops: Some(stencil_ops(pass.clear)),
                    }),
                    ..Default::default()
                })
            }
            FramePhase::Resolve => {
                let source = pass.reads.first().copied().ok_or_else(|| {
                    RenderError::Pipeline("resolve pass has no source target".into())
                })?;
                let (source, source_name) = offscreen(targets, source, pass.phase)?;
                let (target, name) = offscreen(targets, pass.target, pass.phase)?;
                // An empty pass over the multisampled image resolves it on store.
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: source.color_view(source_name)?,
                        resolve_target: Some(target.color_view(name)?),
                        ops: color_ops(pass.clear),
                    })],
                    ..Default::default()
                })
            }
            FramePhase::Post => {
                if pass.target != TargetRef::Surface {
                    return Err(RenderError::Pipeline("post pass must target the surface".into()));
                }
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.surface_view,
                        resolve_target: None,
                        ops: color_ops(pass.clear),
                    })],
                    ..Default::default()
                })
            }
            // Nothing to bind; end_pass submits.
            FramePhase::Present => return Ok(()),
        };
        self.pass = Some(render_pass.forget_lifetime());
        Ok(())
    }

    fn run_pass(&mut self, pass: &Pass, frame: &FrameInputs<'_>) -> Result<u32, RenderError> {
        let resources = &self.renderer.resources;
        match pass.draw {
            DrawSource::SceneDepth | DrawSource::Scene { .. } => {
                let render_pass = self.pass.as_mut().ok_or_else(|| {
                    RenderError::Device(format!("{} has no open pass", pass.phase))
                })?;
                let mut sink = GpuDrawSink {
                    pass: render_pass,
                    resources,
                    staging: &mut self.renderer.staging,
                    bound_kind: None,
                    bound_mesh: None,
                    issued: 0,
                };
                draw_pass_geometry(pass, frame, &mut sink);
                Ok(sink.issued)
            }
            DrawSource::FullscreenTriangle => {
                let expected = TargetRef::Offscreen(resources.post_source);
                if !pass.reads.contains(&expected) {
                    return Err(RenderError::Pipeline(format!(
                        "post pass reads {:?}, renderer samples {expected:?}",
                        pass.reads
                    )));
                }
                let pipeline = match pass.shader {
                    ShaderRef::Post => &resources.post_pipeline,
                    ShaderRef::Passthrough => &resources.passthrough_pipeline,
                    other => {
                        return Err(RenderError::Pipeline(format!(
                            "{other:?} cannot draw a full-screen triangle"
                        )));
                    }
                };
                let render_pass = self.pass.as_mut().ok_or_else(|| {
                    RenderError::Device(format!("{} has no open pass", pass.phase))
                })?;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &resources.post_bind_group, &[]);
                render_pass.draw(0..3, 0..1);
                Ok(1)
            }
            DrawSource::Resolve | DrawSource::Nothing => Ok(0),
        }
    }

    fn end_pass(&mut self, pass: &Pass, _frame: &FrameInputs<'_>) -> Result<(), RenderError> {
        // Dropping the pass ends it on the encoder.
        drop(self.pass.take());
        if pass.phase == FramePhase::Present {
            self.submit()?;
        }
        Ok(())
    }
}

/// Turns scene draws into indexed draw calls, one uniform slot each.
struct GpuDrawSink<'p> {
    pass: &'p mut wgpu::RenderPass<'static>,
    resources: &'p SceneResources,
    staging: &'p mut Vec<InstanceSlot>,
    bound_kind: Option<DrawKind>,
    bound_mesh: Option<MeshId>,
    issued: u32,
}

impl GpuDrawSink<'_> {
    fn bind_kind(&mut self, kind: DrawKind) {
        let res = self.resources;
        match kind {
            DrawKind::DepthOnly => {
                self.pass.set_pipeline(&res.shadow_pipeline);
                self.pass.set_bind_group(0, &res.shadow_bind_group, &[]);
            }
            DrawKind::Lit => {
                self.pass.set_pipeline(&res.lit_pipeline);
                self.pass.set_bind_group(0, &res.frame_bind_group, &[]);
            }
            DrawKind::Outline => {
                self.pass.set_pipeline(&res.outline_pipeline);
                self.pass.set_bind_group(0, &res.frame_bind_group, &[]);
            }
        }
        self.bound_kind = Some(kind);
        self.bound_mesh = None;
    }
}

impl DrawSink for GpuDrawSink<'_> {
    fn draw(&mut self, draw: &InstanceDraw) {
        let res = self.resources;
        let slot = self.staging.len();
        if slot >= res.instance_capacity {
            tracing::warn!(
                "draw slot {slot} exceeds capacity {}, skipping",
                res.instance_capacity
            );
            return;
        }
        let Some(mesh) = res.meshes.get(draw.mesh.0 as usize) else {
            tracing::warn!("mesh {} not uploaded, skipping", draw.mesh.0);
            return;
        };
        self.staging
            .push(InstanceUniform::new(draw, res.outline_color).into());

        if self.bound_kind != Some(draw.kind) {
            self.bind_kind(draw.kind);
        }
        let offset = (slot as u64 * INSTANCE_STRIDE) as u32;
        if draw.kind == DrawKind::DepthOnly {
            self.pass
                .set_bind_group(1, &res.instance_bind_group, &[offset]);
        } else {
            if self.bound_mesh != Some(draw.mesh) {
                self.pass.set_bind_group(1, &mesh.material, &[]);
            }
            self.pass
                .set_bind_group(2, &res.instance_bind_group, &[offset]);
            self.pass.set_stencil_reference(u32::from(draw.outline));
        }
        self.bound_mesh = Some(draw.mesh);

        self.pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.pass
            .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        self.issued += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_policies_map_to_load_ops() {
        let all = ClearPolicy::All {
            color: [0.1, 0.15, 0.15, 1.0],
            depth: 1.0,
            stencil: 0,
        };
        assert!(matches!(color_ops(all).load, wgpu::LoadOp::Clear(c) if (c.g - 0.15).abs() < 1e-6));
        assert!(matches!(depth_ops(all).load, wgpu::LoadOp::Clear(d) if d == 1.0));
        assert!(matches!(stencil_ops(all).load, wgpu::LoadOp::Clear(0)));

        assert!(matches!(color_ops(ClearPolicy::Load).load, wgpu::LoadOp::Load));
        assert!(matches!(color_ops(ClearPolicy::Depth(1.0)).load, wgpu::LoadOp::Load));
        assert!(matches!(depth_ops(ClearPolicy::Depth(0.5)).load, wgpu::LoadOp::Clear(d) if d == 0.5));
        assert!(matches!(stencil_ops(ClearPolicy::Depth(1.0)).load, wgpu::LoadOp::Load));
    }
}
