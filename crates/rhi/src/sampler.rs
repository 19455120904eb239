//! Fixed set of texture samplers shared by all frames.
//!
//! Images are always paired with one of the [`SamplerKind`] presets. The
//! [`SamplerCache`] creates each preset once per device and hands out the
//! raw handle for descriptor records.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiResult, VkResultExt};

/// Sampler preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Linear filtering, clamp to edge.
    Default,
    /// Linear filtering, transparent black outside the image.
    Transparent,
    /// Linear filtering, repeating.
    Repeat,
    /// Nearest filtering, clamp to edge.
    Nearest,
    /// Like `Default` with trilinear mipmap filtering.
    MipmapDefault,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 5] = [
        SamplerKind::Default,
        SamplerKind::Transparent,
        SamplerKind::Repeat,
        SamplerKind::Nearest,
        SamplerKind::MipmapDefault,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    fn filter(self) -> vk::Filter {
        match self {
            SamplerKind::Nearest => vk::Filter::NEAREST,
            _ => vk::Filter::LINEAR,
        }
    }

    fn address_mode(self) -> vk::SamplerAddressMode {
        match self {
            SamplerKind::Transparent => vk::SamplerAddressMode::CLAMP_TO_BORDER,
            SamplerKind::Repeat => vk::SamplerAddressMode::REPEAT,
            _ => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }

    /// Builds the create info for this preset.
    pub fn create_info(self) -> vk::SamplerCreateInfo<'static> {
        let address_mode = self.address_mode();
        let (mipmap_mode, max_lod) = match self {
            SamplerKind::MipmapDefault => (vk::SamplerMipmapMode::LINEAR, vk::LOD_CLAMP_NONE),
            _ => (vk::SamplerMipmapMode::NEAREST, 0.0),
        };

        vk::SamplerCreateInfo::default()
            .mag_filter(self.filter())
            .min_filter(self.filter())
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false)
            .max_anisotropy(1.0)
            .min_lod(0.0)
            .max_lod(max_lod)
    }
}

/// One sampler per [`SamplerKind`], destroyed with the cache.
pub struct SamplerCache {
    device: Arc<Device>,
    samplers: [vk::Sampler; SamplerKind::ALL.len()],
}

impl SamplerCache {
    /// Creates every preset.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let mut cache = Self {
            device,
            samplers: [vk::Sampler::null(); SamplerKind::ALL.len()],
        };

        for kind in SamplerKind::ALL {
            let info = kind.create_info();
            // A failure drops `cache`, destroying the samplers made so far.
            cache.samplers[kind.index()] = unsafe {
                cache
                    .device
                    .handle()
                    .create_sampler(&info, None)
                    .call("vkCreateSampler")?
            };
        }

        debug!("Created {} samplers", SamplerKind::ALL.len());

        Ok(cache)
    }

    /// Returns the sampler for `kind`.
    #[inline]
    pub fn get(&self, kind: SamplerKind) -> vk::Sampler {
        self.samplers[kind.index()]
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for sampler in self.samplers {
            if sampler != vk::Sampler::null() {
                unsafe { self.device.handle().destroy_sampler(sampler, None) };
            }
        }
        debug!("Destroyed samplers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_kind_indices_are_dense() {
        for (i, kind) in SamplerKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_nearest_filters() {
        let info = SamplerKind::Nearest.create_info();
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
        assert_eq!(info.min_filter, vk::Filter::NEAREST);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    }

    #[test]
    fn test_transparent_uses_border() {
        let info = SamplerKind::Transparent.create_info();
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_BORDER);
        assert_eq!(info.border_color, vk::BorderColor::FLOAT_TRANSPARENT_BLACK);
    }

    #[test]
    fn test_repeat_and_mipmap() {
        assert_eq!(
            SamplerKind::Repeat.create_info().address_mode_v,
            vk::SamplerAddressMode::REPEAT
        );

        let info = SamplerKind::MipmapDefault.create_info();
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(info.max_lod, vk::LOD_CLAMP_NONE);
        assert_eq!(SamplerKind::Default.create_info().max_lod, 0.0);
    }

    #[test]
    fn test_sampler_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SamplerCache>();
    }
}
