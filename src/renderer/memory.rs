use anyhow::{anyhow, Context, Result};
use gfx_hal::{adapter::MemoryType, memory as m, prelude::*, Backend, MemoryTypeId};
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

use super::buffer::Buffer;
use crate::ledger::Kind;

/// Host-visible memory bound to a buffer, filled once with the buffer's content.
pub struct Memory<'a, B: Backend, T> {
    pub buffer: ManuallyDrop<Buffer<'a, B, T>>,
    memory: ManuallyDrop<B::Memory>,
}

impl<'a, B: Backend, T> Memory<'a, B, T> {
    pub fn new(mut buffer: Buffer<'a, B, T>, memory_types: &[MemoryType]) -> Result<Self> {
        let memory = Self::allocate_gpu_memory(&mut buffer, memory_types)?;
        Ok(Memory {
            buffer: ManuallyDrop::new(buffer),
            memory,
        })
    }

    fn allocate_gpu_memory(
        buffer: &mut Buffer<'a, B, T>,
        memory_types: &[MemoryType],
    ) -> Result<ManuallyDrop<B::Memory>> {
        let device = buffer.device;
        let buffer_req = unsafe { device.get_buffer_requirements(&buffer.buf) };
        let upload_type = Self::upload_type(memory_types, &buffer_req)
            .context("no CPU-visible memory type for the vertex buffer")?;

        let memory = unsafe { device.allocate_memory(upload_type, buffer_req.size) }
            .map_err(|err| anyhow!("can't allocate vertex memory: {:?}", err))?;
        buffer.ledger.created(Kind::Memory);

        if let Err(err) = unsafe { Self::upload(device, &memory, buffer) } {
            unsafe { device.free_memory(memory) };
            buffer.ledger.destroyed(Kind::Memory);
            return Err(err);
        }
        Ok(ManuallyDrop::new(memory))
    }

    unsafe fn upload(
        device: &B::Device,
        memory: &B::Memory,
        buffer: &mut Buffer<'a, B, T>,
    ) -> Result<()> {
        device
            .bind_buffer_memory(memory, 0, &mut buffer.buf)
            .map_err(|err| anyhow!("can't bind vertex memory: {:?}", err))?;
        let mapping = device
            .map_memory(memory, m::Segment::ALL)
            .map_err(|err| anyhow!("can't map vertex memory: {:?}", err))?;
        ptr::copy_nonoverlapping(
            buffer.content.as_ptr() as *const u8,
            mapping,
            buffer.len as usize,
        );
        let flushed = device.flush_mapped_memory_ranges(iter::once((memory, m::Segment::ALL)));
        device.unmap_memory(memory);
        flushed.map_err(|err| anyhow!("can't flush vertex memory: {:?}", err))
    }

    fn upload_type(
        properties: &[MemoryType],
        buffer_req: &m::Requirements,
    ) -> Option<MemoryTypeId> {
        properties
            .iter()
            .enumerate()
            .position(|(id, mem_type)| {
                buffer_req.type_mask & (1 << id) != 0
                    && mem_type.properties.contains(m::Properties::CPU_VISIBLE)
            })
            .map(MemoryTypeId::from)
    }
}

impl<'a, B: Backend, T> Drop for Memory<'a, B, T> {
    fn drop(&mut self) {
        let device = self.buffer.device;
        let ledger = self.buffer.ledger;
        unsafe {
            ManuallyDrop::drop(&mut self.buffer);
            device.free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)));
        }
        ledger.destroyed(Kind::Memory);
    }
}
