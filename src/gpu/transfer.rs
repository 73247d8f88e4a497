//! Bitmap ↔ texture transfer.
//!
//! Upload is a straight `write_texture`. Readback goes through a staging
//! buffer whose row stride is padded up to `COPY_BYTES_PER_ROW_ALIGNMENT`
//! (256 bytes); rows are compacted after mapping. The staging buffer is
//! destroyed on every path.

use image::RgbaImage;

use crate::errors::GpuError;

use super::GpuContext;

/// Uploads an RGBA8 bitmap into a freshly created texture.
///
/// The texture carries `TEXTURE_BINDING` so compute passes can sample or
/// load from it, plus `COPY_DST` for the upload itself.
#[must_use]
pub fn bitmap_to_texture(gpu: &GpuContext, bitmap: &RgbaImage) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: bitmap.width(),
        height: bitmap.height(),
        depth_or_array_layers: 1,
    };

    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Frame Upload"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bitmap.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * bitmap.width()),
            rows_per_image: Some(bitmap.height()),
        },
        size,
    );

    texture
}

/// Reads an RGBA8 texture back into a bitmap.
///
/// Blocks on the map operation; the device is polled until the copy has
/// completed.
pub fn texture_to_bitmap(
    gpu: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<RgbaImage, GpuError> {
    let unpadded_bytes_per_row = 4 * width;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size: u64::from(padded_bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let result = map_and_compact(
        gpu,
        &staging,
        padded_bytes_per_row as usize,
        unpadded_bytes_per_row as usize,
        height,
    );
    staging.destroy();

    let pixels = result?;
    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| GpuError::new("readback produced a short pixel buffer"))
}

fn map_and_compact(
    gpu: &GpuContext,
    staging: &wgpu::Buffer,
    padded: usize,
    unpadded: usize,
    height: u32,
) -> Result<Vec<u8>, GpuError> {
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    gpu.device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| GpuError::new(format!("device poll failed: {e}")))?;

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(GpuError::new(format!("buffer map failed: {e}"))),
        Err(_) => return Err(GpuError::new("buffer map callback dropped")),
    }

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity(unpadded * height as usize);
    for row in 0..height as usize {
        let start = row * padded;
        pixels.extend_from_slice(&data[start..start + unpadded]);
    }
    drop(data);
    staging.unmap();

    Ok(pixels)
}
