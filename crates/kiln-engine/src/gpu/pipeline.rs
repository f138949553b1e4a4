use std::collections::HashMap;

use crate::render::{BlendPreset, ShaderId};

use super::vertex::{Globals, SpriteVertex};

const PRELUDE_WGSL: &str = include_str!("shaders/prelude.wgsl");
const SPRITE_FS_WGSL: &str = include_str!("shaders/sprite.wgsl");

const fn component(src: wgpu::BlendFactor, dst: wgpu::BlendFactor) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: wgpu::BlendOperation::Add,
    }
}

/// Fixed-function blending for a preset; `None` writes the source unblended.
pub fn blend_state(preset: BlendPreset) -> Option<wgpu::BlendState> {
    use wgpu::BlendFactor as F;
    match preset {
        BlendPreset::Normal => Some(wgpu::BlendState {
            color: component(F::SrcAlpha, F::OneMinusSrcAlpha),
            alpha: component(F::One, F::OneMinusSrcAlpha),
        }),
        BlendPreset::AlphaBlend => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        BlendPreset::Additive => Some(wgpu::BlendState {
            color: component(F::SrcAlpha, F::One),
            alpha: component(F::SrcAlpha, F::One),
        }),
        BlendPreset::Opaque => None,
        BlendPreset::Multiply => Some(wgpu::BlendState {
            color: component(F::Dst, F::Zero),
            alpha: wgpu::BlendComponent::REPLACE,
        }),
        BlendPreset::Cutout => Some(wgpu::BlendState {
            color: component(F::Zero, F::OneMinusSrcAlpha),
            alpha: component(F::Zero, F::OneMinusSrcAlpha),
        }),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    preset: BlendPreset,
    shader: Option<ShaderId>,
}

/// Sprite pipelines for one target format, built on first use per
/// (blend preset, shader) pair.
pub struct SpritePipelines {
    format: wgpu::TextureFormat,
    globals_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    default_module: wgpu::ShaderModule,
    custom: HashMap<ShaderId, wgpu::ShaderModule>,
    cache: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl SpritePipelines {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln sprite globals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Globals>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln sprite texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln sprite pipeline layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            immediate_size: 0,
        });

        // Pixel art: point sampling, clamped.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let default_module = compile(device, "kiln sprite shader", SPRITE_FS_WGSL);

        Self {
            format,
            globals_layout,
            texture_layout,
            layout,
            sampler,
            default_module,
            custom: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Compiles a custom fragment stage. `fragment_wgsl` must define
    /// `fs_main(in: VsOut) -> @location(0) vec4<f32>` and may read
    /// `globals.params`, `sprite_tex` and `sprite_smp`.
    pub fn add_shader(&mut self, device: &wgpu::Device, id: ShaderId, label: &str, fragment_wgsl: &str) {
        let module = compile(device, label, fragment_wgsl);
        self.custom.insert(id, module);
        self.cache.retain(|key, _| key.shader != Some(id));
    }

    pub fn has_shader(&self, id: ShaderId) -> bool {
        self.custom.contains_key(&id)
    }

    /// Pipeline for the preset and shader. Unknown shaders fall back to the
    /// default fragment stage.
    pub fn get(&mut self, device: &wgpu::Device, preset: BlendPreset, shader: Option<ShaderId>) -> &wgpu::RenderPipeline {
        let shader = shader.filter(|id| self.custom.contains_key(id));
        let key = PipelineKey { preset, shader };
        if !self.cache.contains_key(&key) {
            let module = shader
                .and_then(|id| self.custom.get(&id))
                .unwrap_or(&self.default_module);
            let pipeline = build_pipeline(device, &self.layout, module, self.format, preset);
            log::debug!("built sprite pipeline {preset:?} shader={shader:?}");
            self.cache.insert(key, pipeline);
        }
        &self.cache[&key]
    }

    pub fn globals_bind_group(&self, device: &wgpu::Device, buffer: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln sprite globals"),
            layout: &self.globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub fn texture_bind_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln sprite texture"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

fn compile(device: &wgpu::Device, label: &str, fragment_wgsl: &str) -> wgpu::ShaderModule {
    let source = format!("{PRELUDE_WGSL}\n{fragment_wgsl}");
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    preset: BlendPreset,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kiln sprite pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[SpriteVertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: blend_state(preset),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::BlendFactor as F;

    #[test]
    fn opaque_replaces() {
        assert_eq!(blend_state(BlendPreset::Opaque), None);
    }

    #[test]
    fn straight_alpha_keeps_destination_alpha_term() {
        let s = blend_state(BlendPreset::Normal).unwrap();
        assert_eq!(s.color.src_factor, F::SrcAlpha);
        assert_eq!(s.alpha.src_factor, F::One);
        assert_eq!(s.alpha.dst_factor, F::OneMinusSrcAlpha);
    }

    #[test]
    fn custom_composites() {
        let multiply = blend_state(BlendPreset::Multiply).unwrap();
        assert_eq!((multiply.color.src_factor, multiply.color.dst_factor), (F::Dst, F::Zero));

        let cutout = blend_state(BlendPreset::Cutout).unwrap();
        for c in [cutout.color, cutout.alpha] {
            assert_eq!((c.src_factor, c.dst_factor), (F::Zero, F::OneMinusSrcAlpha));
        }
    }

    #[test]
    fn every_preset_has_a_mapping() {
        let blended = BlendPreset::ALL.iter().filter(|p| blend_state(**p).is_some()).count();
        assert_eq!(blended, BlendPreset::ALL.len() - 1);
    }
}
