/// Phong lighting with a directional light, four point lights and a
/// camera spot light; the directional light is shadowed through a
/// comparison sampler. `fs_outline` draws a flat color for stencil outlines.
pub const SCENE_SHADER: &str = r#"
struct DirLight {
    direction: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
};

struct PointLight {
    position: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    attenuation: vec4<f32>,
};

struct SpotLight {
    position: vec4<f32>,
    direction: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    attenuation: vec4<f32>,
    cutoff: vec4<f32>,
};

struct Frame {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    view_pos: vec4<f32>,
    dir_light: DirLight,
    points: array<PointLight, 4>,
    spot: SpotLight,
    // x: shadows enabled, y: time, z: shadow bias
    params: vec4<f32>,
};

struct Instance {
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
    color: vec4<f32>,
    // x: shininess, y: emissive, z: emission strength
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var shadow_map: texture_depth_2d;
@group(0) @binding(2) var shadow_sampler: sampler_comparison;

@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(1) @binding(1) var specular_map: texture_2d<f32>;
@group(1) @binding(2) var emission_map: texture_2d<f32>;
@group(1) @binding(3) var material_sampler: sampler;

@group(2) @binding(0) var<uniform> instance: Instance;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world = instance.model * vec4<f32>(vertex.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_pos = world.xyz;
    out.normal = (instance.normal * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.uv = vertex.uv;
    return out;
}

fn specular_term(light_dir: vec3<f32>, normal: vec3<f32>, view_dir: vec3<f32>, shininess: f32) -> f32 {
    let reflect_dir = reflect(-light_dir, normal);
    return pow(max(dot(view_dir, reflect_dir), 0.0), shininess);
}

fn attenuation(coeffs: vec4<f32>, distance: f32) -> f32 {
    return 1.0 / (coeffs.x + coeffs.y * distance + coeffs.z * distance * distance);
}

fn shadow_amount(world_pos: vec3<f32>, normal: vec3<f32>, light_dir: vec3<f32>) -> f32 {
    if (frame.params.x < 0.5) {
        return 0.0;
    }
    let light_space = frame.light_view_proj * vec4<f32>(world_pos, 1.0);
    let ndc = light_space.xyz / light_space.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 0.0;
    }
    let bias = max(frame.params.z * (1.0 - dot(normal, light_dir)), frame.params.z * 0.1);
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var lit = 0.0;
    for (var x = -1; x <= 1; x++) {
        for (var y = -1; y <= 1; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z - bias);
        }
    }
    return 1.0 - lit / 9.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let diffuse_color = textureSample(diffuse_map, material_sampler, in.uv).rgb;
    let specular_color = textureSample(specular_map, material_sampler, in.uv).rgb;
    let emission_color = textureSample(emission_map, material_sampler, in.uv).rgb;

    if (instance.params.y > 0.5) {
        return instance.color;
    }

    let normal = normalize(in.normal);
    let view_dir = normalize(frame.view_pos.xyz - in.world_pos);
    let shininess = max(instance.params.x, 1.0);

    // Directional, shadowed.
    let dir = frame.dir_light;
    let dir_to_light = normalize(-dir.direction.xyz);
    let shadow = shadow_amount(in.world_pos, normal, dir_to_light);
    var color = dir.ambient.rgb * diffuse_color
        + (1.0 - shadow) * (
            dir.diffuse.rgb * max(dot(normal, dir_to_light), 0.0) * diffuse_color
            + dir.specular.rgb * specular_term(dir_to_light, normal, view_dir, shininess) * specular_color
        );

    for (var i = 0u; i < 4u; i++) {
        let light = frame.points[i];
        let to_light = light.position.xyz - in.world_pos;
        let light_dir = normalize(to_light);
        let falloff = attenuation(light.attenuation, length(to_light));
        color += falloff * (
            light.ambient.rgb * diffuse_color
            + light.diffuse.rgb * max(dot(normal, light_dir), 0.0) * diffuse_color
            + light.specular.rgb * specular_term(light_dir, normal, view_dir, shininess) * specular_color
        );
    }

    let spot = frame.spot;
    let to_spot = spot.position.xyz - in.world_pos;
    let spot_dir = normalize(to_spot);
    let theta = dot(spot_dir, normalize(-spot.direction.xyz));
    let epsilon = spot.cutoff.x - spot.cutoff.y;
    let intensity = clamp((theta - spot.cutoff.y) / epsilon, 0.0, 1.0);
    let spot_falloff = attenuation(spot.attenuation, length(to_spot));
    color += spot_falloff * (
        spot.ambient.rgb * diffuse_color
        + intensity * spot.diffuse.rgb * max(dot(normal, spot_dir), 0.0) * diffuse_color
        + intensity * spot.specular.rgb * specular_term(spot_dir, normal, view_dir, shininess) * specular_color
    );

    // Emission only where the specular map is dark.
    let specular_luma = dot(specular_color, vec3<f32>(0.299, 0.587, 0.114));
    color += select(vec3<f32>(0.0), emission_color * instance.params.z, specular_luma < 0.05);

    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_outline(in: VertexOutput) -> @location(0) vec4<f32> {
    return instance.color;
}
"#;

/// Depth-only pass from the directional light.
pub const SHADOW_SHADER: &str = r#"
struct Shadow {
    light_view_proj: mat4x4<f32>,
};

struct Instance {
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
    color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> shadow: Shadow;
@group(1) @binding(0) var<uniform> instance: Instance;

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return shadow.light_view_proj * instance.model * vec4<f32>(position, 1.0);
}
"#;

/// Full-screen triangle sampling the resolved scene. `fs_post` tone maps
/// and applies gamma when the surface does not; `fs_passthrough` copies.
pub const POST_SHADER: &str = r#"
struct Post {
    // x: exposure, y: gamma, z: apply gamma
    params: vec4<f32>,
};

@group(0) @binding(0) var scene_texture: texture_2d<f32>;
@group(0) @binding(1) var scene_sampler: sampler;
@group(0) @binding(2) var<uniform> post: Post;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_post(in: VertexOutput) -> @location(0) vec4<f32> {
    let hdr = textureSample(scene_texture, scene_sampler, in.uv).rgb;
    let mapped = vec3<f32>(1.0) - exp(-hdr * post.params.x);
    let corrected = pow(mapped, vec3<f32>(1.0 / post.params.y));
    return vec4<f32>(select(mapped, corrected, post.params.z > 0.5), 1.0);
}

@fragment
fn fs_passthrough(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(scene_texture, scene_sampler, in.uv).rgb;
    return vec4<f32>(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;
