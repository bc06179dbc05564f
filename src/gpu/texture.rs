use image::RgbaImage;

/// Sampled RGBA8 texture, used for the skybox.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &RgbaImage,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = img.dimensions();

        tracing::debug!("creating texture {:?}; size={width}x{height}", label);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: Self::extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture = Self {
            texture,
            view,
            sampler,
        };
        texture.update_data(queue, img);
        texture
    }

    pub fn update_data(&self, queue: &wgpu::Queue, img: &RgbaImage) {
        let (width, height) = img.dimensions();

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            Self::extent(width, height),
        );
    }

    fn extent(width: u32, height: u32) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }
}

/// Equirectangular sky: horizon haze fading into a deep blue zenith, with a
/// darker ground half.
pub fn procedural_skybox(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |_, y| {
        let v = y as f32 / (height.max(2) - 1) as f32;
        let elevation = 1.0 - 2.0 * v;

        let [r, g, b] = if elevation >= 0.0 {
            let t = elevation.powf(0.6);
            [
                0.85 + (0.25 - 0.85) * t,
                0.90 + (0.45 - 0.90) * t,
                1.00 + (0.85 - 1.00) * t,
            ]
        } else {
            let t = (-elevation).powf(0.5);
            [
                0.55 + (0.25 - 0.55) * t,
                0.55 + (0.22 - 0.55) * t,
                0.52 + (0.20 - 0.52) * t,
            ]
        };

        image::Rgba([
            (r * 255.0) as u8,
            (g * 255.0) as u8,
            (b * 255.0) as u8,
            255,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_skybox_is_brighter_above_horizon() {
        let sky = procedural_skybox(4, 64);

        assert_eq!((4, 64), sky.dimensions());
        let zenith = sky.get_pixel(0, 0);
        let horizon = sky.get_pixel(0, 31);
        let nadir = sky.get_pixel(0, 63);

        assert!(horizon[1] > zenith[1]);
        assert!(nadir[2] < zenith[2]);
        assert_eq!(255, zenith[3]);
    }
}
