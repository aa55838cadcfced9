use crate::backend::{BufferKind, GpuBuffer};

/// wgpu buffer with a CPU staging shadow.
///
/// wgpu's persistent mapping is asynchronous; UI-sized transient buffers are
/// better served by a plain staging `Vec` flushed through
/// `Queue::write_buffer`, which also sidesteps map/unmap fencing on the
/// buffer itself (the queue orders the copy before the submission that
/// consumes it).
pub struct WgpuBuffer {
    raw: wgpu::Buffer,
    queue: wgpu::Queue,
    staging: Vec<u8>,
    size: u64,
}

impl WgpuBuffer {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        kind: BufferKind,
        size: u64,
    ) -> Self {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            BufferKind::Globals => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            BufferKind::Download => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        };

        // wgpu requires copy sizes in 4-byte units; round the allocation up
        // so `unmap` can always flush whole words.
        let padded = size.max(4).next_multiple_of(4);

        let raw = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vitrine transient buffer"),
            size: padded,
            usage,
            mapped_at_creation: false,
        });

        Self {
            raw,
            queue: queue.clone(),
            staging: vec![0u8; padded as usize],
            size,
        }
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }
}

impl GpuBuffer for WgpuBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn map(&mut self) -> &mut [u8] {
        &mut self.staging[..self.size as usize]
    }

    fn unmap(&mut self, used: u64) {
        debug_assert!(used <= self.size, "unmap of {used} bytes exceeds buffer size {}", self.size);
        if used == 0 {
            return;
        }

        let flush = (used as usize).next_multiple_of(4);
        self.queue.write_buffer(&self.raw, 0, &self.staging[..flush]);
    }
}
