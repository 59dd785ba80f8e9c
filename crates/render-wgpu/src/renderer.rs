//! GPU resources for the scene: pipelines, meshes, materials and uniforms.

use crate::device::{GpuTarget, texture_format};
use crate::frame::WgpuFrame;
use crate::setup::{GpuContext, SetupError};
use crate::shaders;
use crate::uniforms::{
    FrameUniforms, INSTANCE_STRIDE, InstanceSlot, InstanceUniform, PostUniforms, ShadowUniforms,
};
use glint_assets::{AssetError, MeshData, ShaderSource, SubMesh, TextureData, Vertex};
use glint_render::{
    AttachmentFormat, MeshId, RenderError, RenderTargetManager, SceneDrawList, TargetHandle,
    TargetSet,
};
use wgpu::util::DeviceExt;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
const POSITION_ATTRIBUTE: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

fn vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// Diffuse, specular and emission maps for one material.
#[derive(Debug, Clone)]
pub struct MaterialTextures {
    pub diffuse: TextureData,
    pub specular: TextureData,
    pub emission: TextureData,
}

impl MaterialTextures {
    /// Flat grey surface with no emission.
    pub fn plain() -> Self {
        Self {
            diffuse: TextureData::solid("plain_diffuse", [200, 200, 200, 255]),
            specular: TextureData::solid("plain_specular", [128, 128, 128, 255]),
            emission: TextureData::solid("plain_emission", [0, 0, 0, 255]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub mesh: SubMesh,
    /// `None` uses the scene's default material.
    pub textures: Option<MaterialTextures>,
}

/// CPU-side inputs to [`SceneRenderer::new`]. Mesh `i` is [`MeshId`] `i`;
/// the cube is always mesh 0.
#[derive(Debug, Clone)]
pub struct SceneAssets {
    /// Replaces the built-in scene shader. Must define `vs_main`, `fs_main`
    /// and `fs_outline` against the same bind group layout.
    pub scene_shader: Option<ShaderSource>,
    pub default_material: MaterialTextures,
    pub meshes: Vec<MeshAsset>,
}

impl SceneAssets {
    pub fn new(default_material: MaterialTextures) -> Self {
        Self {
            scene_shader: None,
            default_material,
            meshes: vec![MeshAsset {
                mesh: MeshData::cube().merged(),
                textures: None,
            }],
        }
    }

    pub fn add_mesh(&mut self, asset: MeshAsset) -> MeshId {
        self.meshes.push(asset);
        MeshId(self.meshes.len() as u32 - 1)
    }
}

impl Default for SceneAssets {
    fn default() -> Self {
        Self::new(MaterialTextures::plain())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    pub exposure: f32,
    pub gamma: f32,
    pub outline_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
            outline_color: [0.04, 0.28, 0.26, 1.0],
        }
    }
}

pub(crate) struct GpuMesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
    pub(crate) material: wgpu::BindGroup,
}

/// Everything the passes bind. Immutable once built.
pub(crate) struct SceneResources {
    pub(crate) lit_pipeline: wgpu::RenderPipeline,
    pub(crate) outline_pipeline: wgpu::RenderPipeline,
    pub(crate) shadow_pipeline: wgpu::RenderPipeline,
    pub(crate) post_pipeline: wgpu::RenderPipeline,
    pub(crate) passthrough_pipeline: wgpu::RenderPipeline,
    pub(crate) frame_buffer: wgpu::Buffer,
    pub(crate) shadow_buffer: wgpu::Buffer,
    pub(crate) instance_buffer: wgpu::Buffer,
    pub(crate) frame_bind_group: wgpu::BindGroup,
    pub(crate) shadow_bind_group: wgpu::BindGroup,
    pub(crate) instance_bind_group: wgpu::BindGroup,
    pub(crate) post_bind_group: wgpu::BindGroup,
    pub(crate) meshes: Vec<GpuMesh>,
    pub(crate) instance_capacity: usize,
    /// Target the post pass samples: the resolve target, or the
    /// single-sample scene color when multisampling is off.
    pub(crate) post_source: TargetHandle,
    pub(crate) outline_color: [f32; 4],
}

/// Draws the scene through the frame pipeline's passes.
pub struct SceneRenderer {
    pub(crate) resources: SceneResources,
    /// Per-draw uniforms for the frame being encoded, uploaded on submit.
    pub(crate) staging: Vec<InstanceSlot>,
}

fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, AssetError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(AssetError::ShaderCompile {
            label: label.to_string(),
            message: error.to_string(),
        }),
        None => {
            tracing::debug!("compiled shader '{label}'");
            Ok(module)
        }
    }
}

fn upload_texture(
    gpu: &GpuContext,
    data: &TextureData,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let texture = gpu.device.create_texture_with_data(
        &gpu.queue,
        &wgpu::TextureDescriptor {
            label: Some(&data.label),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.pixels,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    material: wgpu::BindGroupLayout,
    instance: wgpu::BindGroupLayout,
    shadow: wgpu::BindGroupLayout,
    post: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_layout"),
            entries: &[
                uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    std::mem::size_of::<FrameUniforms>(),
                    false,
                ),
                texture_entry(1, wgpu::TextureSampleType::Depth),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let color = wgpu::TextureSampleType::Float { filterable: true };
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                texture_entry(0, color),
                texture_entry(1, color),
                texture_entry(2, color),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let instance = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("instance_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                std::mem::size_of::<InstanceUniform>(),
                true,
            )],
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX,
                std::mem::size_of::<ShadowUniforms>(),
                false,
            )],
        });
        let post = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_layout"),
            entries: &[
                texture_entry(0, color),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(
                    2,
                    wgpu::ShaderStages::FRAGMENT,
                    std::mem::size_of::<PostUniforms>(),
                    false,
                ),
            ],
        });
        Self {
            frame,
            material,
            instance,
            shadow,
            post,
        }
    }
}

/// Formats and sample count of the scene color target.
struct ColorTargetFormat {
    color: wgpu::TextureFormat,
    depth: wgpu::TextureFormat,
    samples: u32,
}

fn stencil_face(compare: wgpu::CompareFunction, pass_op: wgpu::StencilOperation) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    }
}

fn build_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    target: &ColorTargetFormat,
    outline: bool,
) -> wgpu::RenderPipeline {
    // Lit geometry stamps 1 (outlined) or 0 into the stencil buffer; the
    // enlarged outline copy only lands where the stamp is missing.
    let (fragment, face, write_mask, depth_write, depth_compare) = if outline {
        (
            "fs_outline",
            stencil_face(wgpu::CompareFunction::NotEqual, wgpu::StencilOperation::Keep),
            0x00,
            false,
            wgpu::CompareFunction::Always,
        )
    } else {
        (
            "fs_main",
            stencil_face(wgpu::CompareFunction::Always, wgpu::StencilOperation::Replace),
            0xFF,
            true,
            wgpu::CompareFunction::Less,
        )
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if outline { "outline_pipeline" } else { "lit_pipeline" }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout(&VERTEX_ATTRIBUTES)],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.color,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: target.depth,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: 0xFF,
                write_mask,
            },
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: target.samples,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    })
}

fn build_shadow_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shadow_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_shadow"),
            compilation_options: Default::default(),
            buffers: &[vertex_layout(&POSITION_ATTRIBUTE)],
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: texture_format(AttachmentFormat::Depth32Float),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn build_post_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    fragment: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn material_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    textures: &MaterialTextures,
    label: &str,
) -> wgpu::BindGroup {
    let diffuse = upload_texture(gpu, &textures.diffuse, wgpu::TextureFormat::Rgba8UnormSrgb);
    let specular = upload_texture(gpu, &textures.specular, wgpu::TextureFormat::Rgba8Unorm);
    let emission = upload_texture(gpu, &textures.emission, wgpu::TextureFormat::Rgba8UnormSrgb);
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&diffuse),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&specular),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&emission),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Stand-in for the shadow map when no shadow target exists. Never
/// sampled: the frame uniforms mark shadows disabled.
fn shadow_placeholder(device: &wgpu::Device) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(AttachmentFormat::Depth32Float),
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_mesh(
    gpu: &GpuContext,
    mesh: &SubMesh,
    material: wgpu::BindGroup,
) -> Result<GpuMesh, RenderError> {
    if mesh.indices.is_empty() {
        return Err(RenderError::resource(&mesh.name, "mesh has no triangles"));
    }
    let vertex_buffer = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_vertices", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
    let index_buffer = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_indices", mesh.name)),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
    Ok(GpuMesh {
        vertex_buffer,
        index_buffer,
        index_count: mesh.indices.len() as u32,
        material,
    })
}

impl SceneRenderer {
    /// Upload `assets`, compile shaders and build pipelines against the
    /// targets in `targets`.
    ///
    /// Every mesh referenced by `scene` must be present in `assets`.
    pub fn new(
        gpu: &GpuContext,
        assets: &SceneAssets,
        scene: &SceneDrawList,
        manager: &RenderTargetManager<GpuTarget>,
        targets: &TargetSet,
        settings: RendererSettings,
    ) -> Result<Self, SetupError> {
        let device = &gpu.device;

        let referenced = scene
            .instances()
            .iter()
            .chain(std::iter::once(scene.floor()))
            .map(|i| i.mesh);
        for mesh in referenced {
            if mesh.0 as usize >= assets.meshes.len() {
                return Err(RenderError::Pipeline(format!(
                    "scene references mesh {} but only {} are loaded",
                    mesh.0,
                    assets.meshes.len()
                ))
                .into());
            }
        }

        let scene_module = match &assets.scene_shader {
            Some(custom) => compile_shader(device, &custom.label, &custom.module_source())?,
            None => compile_shader(device, "scene_shader", shaders::SCENE_SHADER)?,
        };
        let shadow_module = compile_shader(device, "shadow_shader", shaders::SHADOW_SHADER)?;
        let post_module = compile_shader(device, "post_shader", shaders::POST_SHADER)?;

        let color_spec = manager.spec(targets.color)?;
        let color_target = ColorTargetFormat {
            color: texture_format(color_spec.color_format.into()),
            depth: color_spec
                .depth_format()
                .map(texture_format)
                .ok_or_else(|| RenderError::resource(&color_spec.label, "no depth attachment"))?,
            samples: color_spec.sample_count,
        };
        let post_source = targets.resolve.unwrap_or(targets.color);

        let layouts = Layouts::new(device);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.material, &layouts.instance],
            push_constant_ranges: &[],
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&layouts.shadow, &layouts.instance],
            push_constant_ranges: &[],
        });
        let post_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post_pipeline_layout"),
            bind_group_layouts: &[&layouts.post],
            push_constant_ranges: &[],
        });
        let lit_pipeline = build_scene_pipeline(device, &scene_layout, &scene_module, &color_target, false);
        let outline_pipeline =
            build_scene_pipeline(device, &scene_layout, &scene_module, &color_target, true);
        let shadow_pipeline = build_shadow_pipeline(device, &shadow_layout, &shadow_module);
        let surface_format = gpu.surface_format();
        let post_pipeline =
            build_post_pipeline(device, &post_layout, &post_module, surface_format, "fs_post");
        let passthrough_pipeline =
            build_post_pipeline(device, &post_layout, &post_module, surface_format, "fs_passthrough");
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Pipeline(error.to_string()).into());
        }

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow_uniforms"),
            size: std::mem::size_of::<ShadowUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // Lit, depth-only and outline draws each take a slot.
        let instance_capacity = 3 * (scene.len() + 1);
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_uniforms"),
            size: instance_capacity as u64 * INSTANCE_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let post_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("post_uniforms"),
            contents: bytemuck::bytes_of(&PostUniforms::new(
                settings.exposure,
                settings.gamma,
                surface_format.is_srgb(),
            )),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let post_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("post_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut placeholder = None;
        let shadow_view: &wgpu::TextureView = match targets.shadow {
            Some(handle) => {
                let label = &manager.spec(handle)?.label;
                manager.get(handle)?.depth_view(label)?
            }
            None => placeholder.insert(shadow_placeholder(device)),
        };

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &layouts.shadow,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: shadow_buffer.as_entire_binding(),
            }],
        });
        let instance_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("instance_bind_group"),
            layout: &layouts.instance,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &instance_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<InstanceUniform>() as u64),
                }),
            }],
        });
        let post_label = &manager.spec(post_source)?.label;
        let post_view = manager.get(post_source)?.color_view(post_label)?;
        let post_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post_bind_group"),
            layout: &layouts.post,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(post_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&post_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: post_buffer.as_entire_binding(),
                },
            ],
        });

        let mut meshes = Vec::with_capacity(assets.meshes.len());
        for (i, asset) in assets.meshes.iter().enumerate() {
            let textures = asset.textures.as_ref().unwrap_or(&assets.default_material);
            let material = material_bind_group(
                gpu,
                &layouts.material,
                &material_sampler,
                textures,
                &format!("material_{i}"),
            );
            meshes.push(upload_mesh(gpu, &asset.mesh, material)?);
            tracing::debug!(
                "uploaded mesh {i} '{}': {} vertices, {} indices",
                asset.mesh.name,
                asset.mesh.vertices.len(),
                asset.mesh.indices.len()
            );
        }

        tracing::info!(
            "scene renderer ready: {} meshes, {} draw slots, {}x MSAA, post samples {post_source}",
            meshes.len(),
            instance_capacity,
            color_target.samples
        );

        Ok(Self {
            resources: SceneResources {
                lit_pipeline,
                outline_pipeline,
                shadow_pipeline,
                post_pipeline,
                passthrough_pipeline,
                frame_buffer,
                shadow_buffer,
                instance_buffer,
                frame_bind_group,
                shadow_bind_group,
                instance_bind_group,
                post_bind_group,
                meshes,
                instance_capacity,
                post_source,
                outline_color: settings.outline_color,
            },
            staging: Vec::with_capacity(instance_capacity),
        })
    }

    /// Acquire the next swapchain image and start encoding a frame.
    /// `Ok(None)` means the frame should be skipped.
    pub fn begin_frame<'a>(
        &'a mut self,
        gpu: &'a GpuContext,
        manager: &'a RenderTargetManager<GpuTarget>,
    ) -> Result<Option<WgpuFrame<'a>>, RenderError> {
        let Some(surface) = gpu.acquire_frame()? else {
            return Ok(None);
        };
        Ok(Some(WgpuFrame::new(gpu, self, manager, surface)))
    }

    pub fn mesh_count(&self) -> usize {
        self.resources.meshes.len()
    }

    pub fn instance_capacity(&self) -> usize {
        self.resources.instance_capacity
    }

    pub(crate) fn write_frame_uniforms(&mut self, queue: &wgpu::Queue, frame: &FrameUniforms) {
        self.staging.clear();
        queue.write_buffer(&self.resources.frame_buffer, 0, bytemuck::bytes_of(frame));
        let shadow = ShadowUniforms {
            light_view_proj: frame.light_view_proj,
        };
        queue.write_buffer(&self.resources.shadow_buffer, 0, bytemuck::bytes_of(&shadow));
    }

    pub(crate) fn upload_instances(&self, queue: &wgpu::Queue) {
        if !self.staging.is_empty() {
            queue.write_buffer(
                &self.resources.instance_buffer,
                0,
                bytemuck::cast_slice(&self.staging),
            );
        }
    }
}
