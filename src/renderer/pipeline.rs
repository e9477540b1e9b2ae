use anyhow::{anyhow, Context, Result};
use gfx_hal::{format as f, pass::Subpass, prelude::*, pso, Backend};
use std::io::Cursor;
use std::iter;
use std::mem::{self, ManuallyDrop};
use std::ops::Range;
use std::ptr;

use crate::ledger::{Kind, Ledger};
use crate::scene::Shaders;

const ENTRY_NAME: &str = "main";

/// A linked vertex/fragment program together with its vertex input layout.
pub struct Pipeline<'a, B: Backend> {
    device: &'a B::Device,
    ledger: &'a Ledger,
    pub pipeline: ManuallyDrop<B::GraphicsPipeline>,
    pub pipeline_layout: ManuallyDrop<B::PipelineLayout>,
}

impl<'a, B: Backend> Pipeline<'a, B> {
    pub fn new<T>(
        device: &'a B::Device,
        shaders: Shaders,
        render_pass: &B::RenderPass,
        ledger: &'a Ledger,
    ) -> Result<Self> {
        let pipeline_layout = unsafe {
            device.create_pipeline_layout(
                iter::empty::<B::DescriptorSetLayout>(),
                iter::empty::<(pso::ShaderStageFlags, Range<u32>)>(),
            )
        }
        .map_err(|err| anyhow!("can't create pipeline layout: {:?}", err))?;
        ledger.created(Kind::PipelineLayout);

        let linked = Self::link::<T>(device, shaders, render_pass, &pipeline_layout, ledger);
        let graphic_pipeline = match linked {
            Ok(pipeline) => pipeline,
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout) };
                ledger.destroyed(Kind::PipelineLayout);
                return Err(err);
            }
        };
        ledger.created(Kind::Pipeline);

        Ok(Pipeline {
            device,
            ledger,
            pipeline: ManuallyDrop::new(graphic_pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
        })
    }

    fn link<T>(
        device: &B::Device,
        shaders: Shaders,
        render_pass: &B::RenderPass,
        pipeline_layout: &B::PipelineLayout,
        ledger: &Ledger,
    ) -> Result<B::GraphicsPipeline> {
        let vs_module =
            Self::load_spirv(device, shaders.vertex, ledger).context("vertex shader")?;
        let fs_module = match Self::load_spirv(device, shaders.fragment, ledger) {
            Ok(module) => module,
            Err(err) => {
                unsafe { device.destroy_shader_module(vs_module) };
                ledger.destroyed(Kind::ShaderModule);
                return Err(err.context("fragment shader"));
            }
        };

        let graphic_pipeline = {
            let (vs_entry, fs_entry) = (
                pso::EntryPoint {
                    entry: ENTRY_NAME,
                    module: &vs_module,
                    specialization: pso::Specialization::default(),
                },
                pso::EntryPoint {
                    entry: ENTRY_NAME,
                    module: &fs_module,
                    specialization: pso::Specialization::default(),
                },
            );

            let shader_entries = pso::GraphicsShaderSet {
                vertex: vs_entry,
                hull: None,
                domain: None,
                geometry: None,
                fragment: Some(fs_entry),
            };

            let subpass = Subpass {
                index: 0,
                main_pass: render_pass,
            };

            let mut pipeline_desc = pso::GraphicsPipelineDesc::new(
                shader_entries,
                pso::Primitive::TriangleList,
                pso::Rasterizer::FILL,
                pipeline_layout,
                subpass,
            );
            pipeline_desc.blender.targets.push(pso::ColorBlendDesc {
                mask: pso::ColorMask::ALL,
                blend: Some(pso::BlendState::ALPHA),
            });

            pipeline_desc.vertex_buffers.push(pso::VertexBufferDesc {
                binding: 0,
                stride: mem::size_of::<T>() as u32,
                rate: pso::VertexInputRate::Vertex,
            });

            // position: 3 x f32 at slot 0
            pipeline_desc.attributes.push(pso::AttributeDesc {
                location: 0,
                binding: 0,
                element: pso::Element {
                    format: f::Format::Rgb32Sfloat,
                    offset: 0,
                },
            });

            unsafe { device.create_graphics_pipeline(&pipeline_desc, None) }
        };

        // The stages are no longer needed once linking has been attempted.
        unsafe {
            device.destroy_shader_module(vs_module);
            device.destroy_shader_module(fs_module);
        }
        ledger.destroyed(Kind::ShaderModule);
        ledger.destroyed(Kind::ShaderModule);

        graphic_pipeline.map_err(|err| anyhow!("can't link shader program: {:?}", err))
    }

    fn load_spirv(device: &B::Device, bytes: &[u8], ledger: &Ledger) -> Result<B::ShaderModule> {
        let spirv = pso::read_spirv(Cursor::new(bytes)).context("invalid SPIR-V")?;
        let module = unsafe { device.create_shader_module(&spirv) }
            .map_err(|err| anyhow!("can't compile shader: {:?}", err))?;
        ledger.created(Kind::ShaderModule);
        Ok(module)
    }
}

impl<'a, B: Backend> Drop for Pipeline<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_graphics_pipeline(ManuallyDrop::into_inner(ptr::read(&self.pipeline)));
            self.device
                .destroy_pipeline_layout(ManuallyDrop::into_inner(ptr::read(
                    &self.pipeline_layout,
                )));
        }
        self.ledger.destroyed(Kind::Pipeline);
        self.ledger.destroyed(Kind::PipelineLayout);
    }
}
