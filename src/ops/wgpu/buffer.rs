//! Device buffer lifecycle.
//!
//! Inputs are created already filled (one upload per buffer). Outputs are
//! created empty and read back through a staging buffer once a launch has
//! completed. Buffers are released when dropped.

use core::cell::Cell;
use core::mem::size_of_val;
use std::sync::mpsc;

use bytemuck::Pod;
use tracing::debug;
use wgpu::util::DeviceExt;

use super::GpuContext;
use super::launch::Launched;
use super::signature::{Access, ElementType};
use crate::error::{HarnessError, Result};

/// Host types that can live in a device buffer.
pub trait DeviceElement: Pod {
    /// Element type recorded on the buffer.
    const ELEMENT: ElementType;
}

impl DeviceElement for i64 {
    const ELEMENT: ElementType = ElementType::I64;
}

impl DeviceElement for u8 {
    const ELEMENT: ElementType = ElementType::U8;
}

/// Device-resident memory mirroring a host region.
#[derive(Debug)]
pub struct DeviceBuffer {
    raw: wgpu::Buffer,
    label: String,
    access: Access,
    element: ElementType,
    len: usize,
}

impl DeviceBuffer {
    /// Debug label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Access intent.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Element type.
    #[must_use]
    pub const fn element(&self) -> ElementType {
        self.element
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True for a buffer with no elements; never produced by [`BufferManager`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical size in bytes (`len × element width`).
    #[must_use]
    pub const fn size(&self) -> u64 {
        (self.len * self.element.width()) as u64
    }

    /// Size of the device allocation, rounded up to the copy alignment.
    #[must_use]
    pub fn allocated_size(&self) -> u64 {
        self.raw.size()
    }

    pub(crate) fn as_entire_binding(&self) -> wgpu::BindingResource<'_> {
        self.raw.as_entire_binding()
    }
}

/// Rounds a byte count up to [`wgpu::COPY_BUFFER_ALIGNMENT`].
#[must_use]
pub const fn padded_size(bytes: u64) -> u64 {
    bytes.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

fn byte_size(label: &str, element: ElementType, count: usize) -> Result<u64> {
    if count == 0 {
        return Err(HarnessError::BufferSize {
            label: label.to_string(),
            expected: element.width() as u64,
            actual: 0,
        });
    }
    count
        .checked_mul(element.width())
        .map(|bytes| bytes as u64)
        .ok_or_else(|| HarnessError::DimensionMismatch(format!("buffer `{label}` overflows")))
}

fn check_limit(label: &str, bytes: u64, limit: u64) -> Result<()> {
    if bytes > limit {
        return Err(HarnessError::BufferLimit {
            label: label.to_string(),
            requested: bytes,
            limit,
        });
    }
    Ok(())
}

/// Allocates, fills and drains device buffers for one context.
pub struct BufferManager<'ctx> {
    ctx: &'ctx GpuContext,
    allocations: Cell<usize>,
}

impl<'ctx> BufferManager<'ctx> {
    /// Manager bound to `ctx`.
    #[must_use]
    pub const fn new(ctx: &'ctx GpuContext) -> Self {
        Self {
            ctx,
            allocations: Cell::new(0),
        }
    }

    /// Largest storage buffer the device accepts, in bytes.
    fn storage_limit(&self) -> u64 {
        let limits = self.ctx.limits();
        limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size))
    }

    /// Number of buffers this manager has allocated, staging buffers excluded.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Creates a read-only buffer holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::BufferSize`] if `data` is empty.
    /// - [`HarnessError::BufferLimit`] if `data` is larger than the device's
    ///   storage buffer limit.
    /// - [`HarnessError::Transfer`] if the device rejects the buffer.
    pub fn upload<T: DeviceElement>(&self, label: &str, data: &[T]) -> Result<DeviceBuffer> {
        let bytes = byte_size(label, T::ELEMENT, data.len())?;
        check_limit(label, padded_size(bytes), self.storage_limit())?;
        let contents: &[u8] = bytemuck::cast_slice(data);
        debug_assert_eq!(contents.len() as u64, bytes);

        let raw = self.ctx.scoped(
            |device| {
                Ok(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage: wgpu::BufferUsages::STORAGE,
                }))
            },
            |err| HarnessError::Transfer(format!("upload of `{label}` failed: {err}")),
        )?;
        self.allocations.set(self.allocations.get() + 1);
        debug!(label, bytes, "uploaded input buffer");

        Ok(DeviceBuffer {
            raw,
            label: label.to_string(),
            access: Access::ReadOnly,
            element: T::ELEMENT,
            len: data.len(),
        })
    }

    /// Creates a write-only buffer for `count` elements of `T`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::BufferSize`] if `count` is zero.
    /// - [`HarnessError::BufferLimit`] if `count` elements exceed the device's
    ///   storage buffer limit.
    /// - [`HarnessError::Transfer`] if the device rejects the buffer.
    pub fn allocate<T: DeviceElement>(&self, label: &str, count: usize) -> Result<DeviceBuffer> {
        let bytes = byte_size(label, T::ELEMENT, count)?;
        let size = padded_size(bytes);
        check_limit(label, size, self.storage_limit())?;
        let raw = self.ctx.scoped(
            |device| {
                Ok(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }))
            },
            |err| HarnessError::Transfer(format!("allocation of `{label}` failed: {err}")),
        )?;
        self.allocations.set(self.allocations.get() + 1);
        debug!(label, bytes, "allocated output buffer");

        Ok(DeviceBuffer {
            raw,
            label: label.to_string(),
            access: Access::WriteOnly,
            element: T::ELEMENT,
            len: count,
        })
    }

    /// Copies an output buffer into `out`, blocking until the data is on the
    /// host. Requires the [`Launched`] token of the launch that wrote it.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::BufferSize`] if `out` does not have exactly the
    ///   buffer's element type and byte size.
    /// - [`HarnessError::BufferLimit`] if the staging copy would exceed the
    ///   device's buffer size limit.
    /// - [`HarnessError::Transfer`] if the buffer is not an output or the
    ///   device reports a copy or mapping fault.
    pub fn read_back<T: DeviceElement>(
        &self,
        buffer: &DeviceBuffer,
        launched: &Launched,
        out: &mut [T],
    ) -> Result<()> {
        if buffer.access != Access::WriteOnly {
            return Err(HarnessError::Transfer(format!(
                "buffer `{}` is an input and cannot be read back",
                buffer.label
            )));
        }
        let host_bytes = size_of_val(out) as u64;
        if T::ELEMENT != buffer.element || host_bytes != buffer.size() {
            return Err(HarnessError::BufferSize {
                label: buffer.label.clone(),
                expected: buffer.size(),
                actual: host_bytes,
            });
        }

        let device = &self.ctx.device;
        let copy_size = buffer.allocated_size();
        check_limit("staging", copy_size, self.ctx.limits().max_buffer_size)?;
        let staging = self.ctx.scoped(
            |device| {
                let staging = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("staging"),
                    size: copy_size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("read_back"),
                });
                encoder.copy_buffer_to_buffer(&buffer.raw, 0, &staging, 0, copy_size);
                self.ctx.queue.submit(Some(encoder.finish()));
                Ok(staging)
            },
            |err| HarnessError::Transfer(format!("copy of `{}` failed: {err}", buffer.label)),
        )?;

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| HarnessError::Transfer(e.to_string()))?;
        rx.recv()
            .map_err(|e| HarnessError::Transfer(format!("map callback dropped: {e}")))?
            .map_err(|e| HarnessError::Transfer(e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            let dst: &mut [u8] = bytemuck::cast_slice_mut(out);
            dst.copy_from_slice(&mapped[..dst.len()]);
        }
        staging.unmap();
        debug!(
            label = %buffer.label,
            kernel = launched.kernel(),
            bytes = host_bytes,
            "read back output buffer"
        );
        Ok(())
    }
}
