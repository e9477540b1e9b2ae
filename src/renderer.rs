use anyhow::{anyhow, Result};
use gfx_hal::{
    adapter, buffer as b, command, format as f, image as i, pass, pool,
    prelude::*,
    queue::{family::QueueFamilyId, Submission},
    window, Backend,
};
use log::{debug, info, warn};

use std::borrow::Borrow;
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

mod buffer;
mod memory;
mod pipeline;
mod swapchain;

use crate::frame::FramePlan;
use crate::ledger::{Kind, Ledger};
use crate::scene::{Variant, Vertex, TRIANGLE};
use buffer::Buffer;
use memory::Memory;
use pipeline::Pipeline;
use swapchain::Swapchain;

const FRAMES_IN_FLIGHT: usize = 2;

/// The uploaded vertices and the program that draws them.
struct Triangle<'a, B: Backend> {
    memory: Memory<'a, B, Vertex>,
    pipeline: Pipeline<'a, B>,
}

pub struct Renderer<'a, B: Backend> {
    frame: usize,
    device: &'a B::Device,
    ledger: &'a Ledger,
    command_buffers: Vec<B::CommandBuffer>,
    framebuffers: Vec<Option<B::Framebuffer>>,
    submission_complete_semaphores: Vec<B::Semaphore>,
    submission_complete_fences: Vec<B::Fence>,
    command_pool: ManuallyDrop<B::CommandPool>,
    triangle: ManuallyDrop<Option<Triangle<'a, B>>>,
    swapchain: ManuallyDrop<Swapchain<'a, B>>,
    render_pass: ManuallyDrop<B::RenderPass>,
}

impl<'a, B> Renderer<'a, B>
where
    B: Backend,
{
    pub fn new(
        surface: &'a mut B::Surface,
        adapter: &'a adapter::Adapter<B>,
        device: &'a B::Device,
        family: QueueFamilyId,
        init_dims: window::Extent2D,
        variant: Variant,
        ledger: &'a Ledger,
    ) -> Result<Self> {
        let memory_types = adapter.physical_device.memory_properties().memory_types;
        let limits = adapter.physical_device.limits();

        let swapchain = Swapchain::new(device, surface, adapter, init_dims)?;
        let render_pass = Self::create_render_pass(device, swapchain.format, ledger)?;
        let command_pool = match Self::create_command_pool(device, family, ledger) {
            Ok(command_pool) => command_pool,
            Err(err) => {
                unsafe { device.destroy_render_pass(ManuallyDrop::into_inner(render_pass)) };
                ledger.destroyed(Kind::RenderPass);
                return Err(err);
            }
        };

        // An early return below drops `renderer`, releasing whatever it holds so far.
        let mut renderer = Renderer {
            device,
            ledger,
            submission_complete_semaphores: Vec::with_capacity(FRAMES_IN_FLIGHT),
            submission_complete_fences: Vec::with_capacity(FRAMES_IN_FLIGHT),
            command_pool: ManuallyDrop::new(command_pool),
            triangle: ManuallyDrop::new(None),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass,
            command_buffers: Vec::with_capacity(FRAMES_IN_FLIGHT),
            framebuffers: (0..FRAMES_IN_FLIGHT).map(|_| None).collect(),
            frame: 0,
        };

        if let Some(shaders) = variant.shaders() {
            let vertex_buffer = Buffer::new(device, &TRIANGLE, &limits, ledger)?;
            let memory = Memory::new(vertex_buffer, &memory_types)?;
            let pipeline =
                Pipeline::new::<Vertex>(device, shaders, &*renderer.render_pass, ledger)?;
            info!("uploaded {} vertices", TRIANGLE.len());
            *renderer.triangle = Some(Triangle { memory, pipeline });
        }

        for _ in 0..FRAMES_IN_FLIGHT {
            let command_buffer =
                unsafe { renderer.command_pool.allocate_one(command::Level::Primary) };
            renderer.command_buffers.push(command_buffer);
        }
        fill_slots(&mut renderer.submission_complete_semaphores, FRAMES_IN_FLIGHT, || {
            Self::create_semaphore(device, ledger)
        })?;
        fill_slots(&mut renderer.submission_complete_fences, FRAMES_IN_FLIGHT, || {
            Self::create_fence(device, ledger)
        })?;

        Ok(renderer)
    }

    /// Records, submits and presents one frame following `plan`.
    pub fn render(&mut self, queue: &mut B::CommandQueue, plan: &FramePlan) {
        let surface_image = unsafe {
            match self.swapchain.surface.acquire_image(!0) {
                Ok((image, _)) => image,
                Err(err) => {
                    warn!("can't acquire swapchain image: {:?}", err);
                    self.swapchain.recreate();
                    return;
                }
            }
        };

        let frame_idx = self.frame % FRAMES_IN_FLIGHT;

        let fence = &self.submission_complete_fences[frame_idx];
        if let Err(err) = unsafe { self.device.wait_for_fence(fence, !0) } {
            warn!("can't wait for fence: {:?}", err);
            return;
        }

        // The slot's previous submission has finished, so its framebuffer is free.
        if let Some(framebuffer) = self.framebuffers[frame_idx].take() {
            unsafe { self.device.destroy_framebuffer(framebuffer) };
            self.ledger.destroyed(Kind::Framebuffer);
        }

        let framebuffer = unsafe {
            self.device.create_framebuffer(
                &self.render_pass,
                iter::once(surface_image.borrow()),
                i::Extent {
                    width: self.swapchain.dims.width,
                    height: self.swapchain.dims.height,
                    depth: 1,
                },
            )
        };
        let framebuffer = match framebuffer {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                warn!("can't create framebuffer: {:?}", err);
                return;
            }
        };
        self.ledger.created(Kind::Framebuffer);

        if let Err(err) = unsafe { self.device.reset_fence(fence) } {
            warn!("can't reset fence: {:?}", err);
            self.framebuffers[frame_idx] = Some(framebuffer);
            return;
        }

        let triangle = if plan.draws().is_empty() {
            None
        } else {
            self.triangle.as_ref()
        };

        let cmd_buffer = &mut self.command_buffers[frame_idx];
        unsafe {
            cmd_buffer.reset(false);
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);
            cmd_buffer.set_viewports(0, &[self.swapchain.viewport.clone()]);
            cmd_buffer.set_scissors(0, &[self.swapchain.viewport.rect]);
            if let Some(triangle) = triangle {
                cmd_buffer.bind_graphics_pipeline(&triangle.pipeline.pipeline);
                cmd_buffer.bind_vertex_buffers(
                    0,
                    iter::once((&*triangle.memory.buffer.buf, b::SubRange::WHOLE)),
                );
            }
            cmd_buffer.begin_render_pass(
                &self.render_pass,
                &framebuffer,
                self.swapchain.viewport.rect,
                &[command::ClearValue {
                    color: command::ClearColor {
                        float32: plan.clear_color(),
                    },
                }],
                command::SubpassContents::Inline,
            );
            if triangle.is_some() {
                for draw in plan.draws() {
                    cmd_buffer.draw(draw.vertices.clone(), draw.instances.clone());
                }
            }
            cmd_buffer.end_render_pass();
            cmd_buffer.finish();

            let submission = Submission {
                command_buffers: iter::once(&*cmd_buffer),
                wait_semaphores: None,
                signal_semaphores: iter::once(&self.submission_complete_semaphores[frame_idx]),
            };

            queue.submit(
                submission,
                Some(&self.submission_complete_fences[frame_idx]),
            );

            let result = queue.present_surface(
                &mut self.swapchain.surface,
                surface_image,
                Some(&self.submission_complete_semaphores[frame_idx]),
            );

            if let Err(err) = result {
                warn!("can't present: {:?}", err);
                self.swapchain.recreate();
            }
        }

        self.framebuffers[frame_idx] = Some(framebuffer);
        self.frame += 1;
    }

    fn create_render_pass(
        device: &B::Device,
        format: f::Format,
        ledger: &Ledger,
    ) -> Result<ManuallyDrop<B::RenderPass>> {
        let attachment = pass::Attachment {
            format: Some(format),
            samples: 1,
            ops: pass::AttachmentOps::new(
                pass::AttachmentLoadOp::Clear,
                pass::AttachmentStoreOp::Store,
            ),
            stencil_ops: pass::AttachmentOps::DONT_CARE,
            layouts: i::Layout::Undefined..i::Layout::Present,
        };

        let subpass = pass::SubpassDesc {
            colors: &[(0, i::Layout::ColorAttachmentOptimal)],
            depth_stencil: None,
            inputs: &[],
            resolves: &[],
            preserves: &[],
        };

        let render_pass = unsafe { device.create_render_pass(&[attachment], &[subpass], &[]) }
            .map_err(|err| anyhow!("can't create render pass: {:?}", err))?;
        ledger.created(Kind::RenderPass);
        Ok(ManuallyDrop::new(render_pass))
    }

    fn create_command_pool(
        device: &B::Device,
        family: QueueFamilyId,
        ledger: &Ledger,
    ) -> Result<B::CommandPool> {
        let command_pool = unsafe {
            device.create_command_pool(family, pool::CommandPoolCreateFlags::RESET_INDIVIDUAL)
        }
        .map_err(|err| anyhow!("can't create command pool: {:?}", err))?;
        ledger.created(Kind::CommandPool);
        Ok(command_pool)
    }

    fn create_semaphore(device: &B::Device, ledger: &Ledger) -> Result<B::Semaphore> {
        let semaphore = device
            .create_semaphore()
            .map_err(|err| anyhow!("can't create semaphore: {:?}", err))?;
        ledger.created(Kind::Semaphore);
        Ok(semaphore)
    }

    fn create_fence(device: &B::Device, ledger: &Ledger) -> Result<B::Fence> {
        // Signalled, so the first wait on each slot returns immediately.
        let fence = device
            .create_fence(true)
            .map_err(|err| anyhow!("can't create fence: {:?}", err))?;
        ledger.created(Kind::Fence);
        Ok(fence)
    }
}

/// Pushes `count` objects into `slots`, stopping at the first failure. Objects
/// created before the failure stay in `slots` so their owner can release them.
fn fill_slots<T, F>(slots: &mut Vec<T>, count: usize, mut create: F) -> Result<()>
where
    F: FnMut() -> Result<T>,
{
    for _ in 0..count {
        slots.push(create()?);
    }
    Ok(())
}

impl<'a, B: Backend> Drop for Renderer<'a, B> {
    fn drop(&mut self) {
        let device = self.device;
        let ledger = self.ledger;
        if let Err(err) = device.wait_idle() {
            warn!("device did not go idle: {:?}", err);
        }
        unsafe {
            ManuallyDrop::drop(&mut self.triangle);
            for framebuffer in self.framebuffers.drain(..).flatten() {
                device.destroy_framebuffer(framebuffer);
                ledger.destroyed(Kind::Framebuffer);
            }

            self.command_pool.free(self.command_buffers.drain(..));
            device.destroy_command_pool(ManuallyDrop::into_inner(ptr::read(&self.command_pool)));
            ledger.destroyed(Kind::CommandPool);

            for s in self.submission_complete_semaphores.drain(..) {
                device.destroy_semaphore(s);
                ledger.destroyed(Kind::Semaphore);
            }

            for f in self.submission_complete_fences.drain(..) {
                device.destroy_fence(f);
                ledger.destroyed(Kind::Fence);
            }

            device.destroy_render_pass(ManuallyDrop::into_inner(ptr::read(&self.render_pass)));
            ledger.destroyed(Kind::RenderPass);
            ManuallyDrop::drop(&mut self.swapchain);
        }
        debug!("renderer released after {} frames", self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_slots_creates_one_per_frame() {
        let mut slots = Vec::new();
        let mut next = 0;
        fill_slots(&mut slots, FRAMES_IN_FLIGHT, || {
            next += 1;
            Ok(next)
        })
        .unwrap();
        assert_eq!(slots, vec![1, 2]);
    }

    #[test]
    fn failed_slot_keeps_earlier_objects() {
        let ledger = Ledger::new();
        let mut slots = Vec::new();
        let mut calls = 0;
        let result = fill_slots(&mut slots, FRAMES_IN_FLIGHT, || {
            calls += 1;
            if calls == 2 {
                return Err(anyhow!("out of memory"));
            }
            ledger.created(Kind::Fence);
            Ok(calls)
        });
        assert!(result.is_err());
        assert_eq!(slots, vec![1]);

        // The owner releases exactly what was created.
        for _ in slots.drain(..) {
            ledger.destroyed(Kind::Fence);
        }
        assert!(ledger.is_balanced());
    }
}
