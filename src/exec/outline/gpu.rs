//! GPU outline path: Jump Flooding Algorithm over storage textures.
//!
//! Pass schedule per direction (outer = foreground seeds, inner =
//! background seeds):
//!
//! 1. seed — RG32F seed map, sentinel `(-1, -1)` where the predicate fails
//! 2. flood ×N — `N = ⌈log₂(max(W, H))⌉`, step `2^(N-1-i)`, ping-pong
//! 3. distance — R32F Euclidean distance (effectively infinite without seed)
//!
//! followed by one composite pass and a readback. Pipelines are built once
//! per device and reused across runs; all textures and uniform buffers are
//! released on every exit path.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::errors::ExecError;
use crate::exec::ExecutionContext;
use crate::gpu::{GpuContext, bitmap_to_texture, texture_to_bitmap};

use super::OutlineParams;

const WORKGROUP: u32 = 8;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SeedUniforms {
    invert: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FloodUniforms {
    step: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CompositeUniforms {
    color: [f32; 4],
    thickness: f32,
    position_value: f32,
    threshold: f32,
    opacity: f32,
}

/// Compute pipelines for the four outline kernels, valid for one device.
pub(super) struct OutlinePipelines {
    context_id: u64,
    seed_layout: wgpu::BindGroupLayout,
    seed: wgpu::ComputePipeline,
    flood_layout: wgpu::BindGroupLayout,
    flood: wgpu::ComputePipeline,
    distance_layout: wgpu::BindGroupLayout,
    distance: wgpu::ComputePipeline,
    composite_layout: wgpu::BindGroupLayout,
    composite: wgpu::ComputePipeline,
}

impl OutlinePipelines {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let (seed_layout, seed) = compute_pipeline(
            device,
            "Outline Seed",
            include_str!("../shaders/outline_seed.wgsl"),
            &[
                sampled_texture_entry(0),
                storage_texture_entry(1, wgpu::TextureFormat::Rg32Float),
                uniform_entry(2),
            ],
        );
        let (flood_layout, flood) = compute_pipeline(
            device,
            "Outline Flood",
            include_str!("../shaders/outline_flood.wgsl"),
            &[
                sampled_texture_entry(0),
                storage_texture_entry(1, wgpu::TextureFormat::Rg32Float),
                uniform_entry(2),
            ],
        );
        let (distance_layout, distance) = compute_pipeline(
            device,
            "Outline Distance",
            include_str!("../shaders/outline_distance.wgsl"),
            &[
                sampled_texture_entry(0),
                storage_texture_entry(1, wgpu::TextureFormat::R32Float),
            ],
        );
        let (composite_layout, composite) = compute_pipeline(
            device,
            "Outline Composite",
            include_str!("../shaders/outline_composite.wgsl"),
            &[
                sampled_texture_entry(0),
                sampled_texture_entry(1),
                sampled_texture_entry(2),
                storage_texture_entry(3, wgpu::TextureFormat::Rgba8Unorm),
                uniform_entry(4),
            ],
        );

        Self {
            context_id: gpu.id(),
            seed_layout,
            seed,
            flood_layout,
            flood,
            distance_layout,
            distance,
            composite_layout,
            composite,
        }
    }
}

/// Working textures for one invocation. Destroyed on drop so that every
/// exit path — success, failure, abort — releases GPU memory.
struct OutlineTextures {
    src: wgpu::Texture,
    seed_a: wgpu::Texture,
    seed_b: wgpu::Texture,
    dist_outer: wgpu::Texture,
    dist_inner: wgpu::Texture,
    output: wgpu::Texture,
}

impl OutlineTextures {
    fn new(gpu: &GpuContext, bitmap: &RgbaImage, width: u32, height: u32) -> Self {
        let field = |label, format| {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };

        let output = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Outline Output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        Self {
            src: bitmap_to_texture(gpu, bitmap),
            seed_a: field("Outline Seeds A", wgpu::TextureFormat::Rg32Float),
            seed_b: field("Outline Seeds B", wgpu::TextureFormat::Rg32Float),
            dist_outer: field("Outline Outer Distance", wgpu::TextureFormat::R32Float),
            dist_inner: field("Outline Inner Distance", wgpu::TextureFormat::R32Float),
            output,
        }
    }
}

impl Drop for OutlineTextures {
    fn drop(&mut self) {
        self.src.destroy();
        self.seed_a.destroy();
        self.seed_b.destroy();
        self.dist_outer.destroy();
        self.dist_inner.destroy();
        self.output.destroy();
    }
}

pub(super) fn run(
    cache: &Mutex<Option<OutlinePipelines>>,
    gpu: &GpuContext,
    ctx: &ExecutionContext<'_>,
    bitmap: &RgbaImage,
    params: &OutlineParams,
) -> Result<RgbaImage, ExecError> {
    let (width, height) = bitmap.dimensions();

    let mut guard = cache.lock();
    if guard.as_ref().is_none_or(|p| p.context_id != gpu.id()) {
        *guard = Some(OutlinePipelines::new(gpu));
    }
    let pipelines = guard.as_ref().expect("pipelines were just ensured");

    let textures = OutlineTextures::new(gpu, bitmap, width, height);
    let src_view = textures.src.create_view(&wgpu::TextureViewDescriptor::default());
    let seed_a_view = textures.seed_a.create_view(&wgpu::TextureViewDescriptor::default());
    let seed_b_view = textures.seed_b.create_view(&wgpu::TextureViewDescriptor::default());
    let dist_outer_view = textures
        .dist_outer
        .create_view(&wgpu::TextureViewDescriptor::default());
    let dist_inner_view = textures
        .dist_inner
        .create_view(&wgpu::TextureViewDescriptor::default());
    let out_view = textures
        .output
        .create_view(&wgpu::TextureViewDescriptor::default());
    ctx.progress(0.1);

    let steps = flood_steps(width.max(height));

    // Outer direction: seeds are the foreground.
    run_seed(gpu, pipelines, &src_view, &seed_a_view, 0, width, height);
    ctx.progress(0.2);
    ctx.check_abort()?;
    let outer_seeds = run_flood(
        gpu, pipelines, ctx, &seed_a_view, &seed_b_view, &steps, width, height,
    )?;
    run_distance(gpu, pipelines, outer_seeds, &dist_outer_view, width, height);
    ctx.check_abort()?;

    // Inner direction: seeds are the background.
    run_seed(gpu, pipelines, &src_view, &seed_a_view, 1, width, height);
    let inner_seeds = run_flood(
        gpu, pipelines, ctx, &seed_a_view, &seed_b_view, &steps, width, height,
    )?;
    ctx.progress(0.5);
    run_distance(gpu, pipelines, inner_seeds, &dist_inner_view, width, height);
    ctx.progress(0.8);
    ctx.check_abort()?;

    run_composite(
        gpu,
        pipelines,
        &src_view,
        &dist_outer_view,
        &dist_inner_view,
        &out_view,
        params,
        width,
        height,
    );
    ctx.progress(0.95);
    ctx.check_abort()?;

    let result = texture_to_bitmap(gpu, &textures.output, width, height)?;
    ctx.check_abort()?;
    ctx.progress(1.0);
    Ok(result)
}

/// Step sizes for the flood schedule: `2^(N-1)`, …, 2, 1 with
/// `N = ⌈log₂(max_dim)⌉`. Empty for a 1×1 image.
fn flood_steps(max_dim: u32) -> Vec<i32> {
    if max_dim <= 1 {
        return Vec::new();
    }
    let n = 32 - (max_dim - 1).leading_zeros();
    (0..n).map(|i| 1i32 << (n - 1 - i)).collect()
}

fn run_seed(
    gpu: &GpuContext,
    pipelines: &OutlinePipelines,
    src: &wgpu::TextureView,
    seeds: &wgpu::TextureView,
    invert: u32,
    width: u32,
    height: u32,
) {
    let uniforms = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Outline Seed Uniforms"),
            contents: bytemuck::bytes_of(&SeedUniforms { invert }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Outline Seed BindGroup"),
        layout: &pipelines.seed_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(src),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(seeds),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniforms.as_entire_binding(),
            },
        ],
    });

    dispatch(gpu, &pipelines.seed, &bind_group, "Outline Seed", width, height);
    uniforms.destroy();
}

/// Runs the flood schedule, ping-ponging between the two seed textures.
/// Returns the view holding the final seed map.
fn run_flood<'a>(
    gpu: &GpuContext,
    pipelines: &OutlinePipelines,
    ctx: &ExecutionContext<'_>,
    seed_a: &'a wgpu::TextureView,
    seed_b: &'a wgpu::TextureView,
    steps: &[i32],
    width: u32,
    height: u32,
) -> Result<&'a wgpu::TextureView, ExecError> {
    let mut current = seed_a;
    let mut other = seed_b;

    for &step in steps {
        ctx.check_abort()?;

        let uniforms = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Outline Flood Uniforms"),
                contents: bytemuck::bytes_of(&FloodUniforms { step }),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Outline Flood BindGroup"),
            layout: &pipelines.flood_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(current),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(other),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        });

        dispatch(gpu, &pipelines.flood, &bind_group, "Outline Flood", width, height);
        uniforms.destroy();

        std::mem::swap(&mut current, &mut other);
    }

    Ok(current)
}

fn run_distance(
    gpu: &GpuContext,
    pipelines: &OutlinePipelines,
    seeds: &wgpu::TextureView,
    dist: &wgpu::TextureView,
    width: u32,
    height: u32,
) {
    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Outline Distance BindGroup"),
        layout: &pipelines.distance_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(seeds),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(dist),
            },
        ],
    });

    dispatch(
        gpu,
        &pipelines.distance,
        &bind_group,
        "Outline Distance",
        width,
        height,
    );
}

fn run_composite(
    gpu: &GpuContext,
    pipelines: &OutlinePipelines,
    src: &wgpu::TextureView,
    outer: &wgpu::TextureView,
    inner: &wgpu::TextureView,
    out: &wgpu::TextureView,
    params: &OutlineParams,
    width: u32,
    height: u32,
) {
    let uniforms = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Outline Composite Uniforms"),
            contents: bytemuck::bytes_of(&CompositeUniforms {
                color: params.color,
                thickness: params.thickness,
                position_value: params.position_value,
                threshold: params.threshold,
                opacity: params.opacity,
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Outline Composite BindGroup"),
        layout: &pipelines.composite_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(src),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(outer),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(inner),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(out),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: uniforms.as_entire_binding(),
            },
        ],
    });

    dispatch(
        gpu,
        &pipelines.composite,
        &bind_group,
        "Outline Composite",
        width,
        height,
    );
    uniforms.destroy();
}

fn dispatch(
    gpu: &GpuContext,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    label: &str,
    width: u32,
    height: u32,
) {
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        cpass.set_pipeline(pipeline);
        cpass.set_bind_group(0, bind_group, &[]);
        cpass.dispatch_workgroups(width.div_ceil(WORKGROUP), height.div_ceil(WORKGROUP), 1);
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));
}

// ─── Pipeline construction helpers ────────────────────────────────────────────

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> (wgpu::BindGroupLayout, wgpu::ComputePipeline) {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[Some(&bind_group_layout)],
        immediate_size: 0,
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    (bind_group_layout, pipeline)
}

fn sampled_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
