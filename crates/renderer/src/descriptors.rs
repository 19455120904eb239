//! Per-cycle image registration table.

use vellum_rhi::sampler::SamplerKind;

use crate::frame::FrameBackend;

/// Images registered with a frame during one submission cycle.
///
/// Registering the same image with the same sampler twice yields the slot
/// handed out the first time; only new pairs reach the backend.
#[derive(Debug, Default)]
pub struct Descriptors {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    key: u64,
    sampler: SamplerKind,
    slot: u32,
}

impl Descriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the binding slot of `image` sampled with `sampler`.
    pub fn add_image<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        image: &B::Image,
        sampler: SamplerKind,
    ) -> u32 {
        let key = B::image_key(image);

        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.key == key && entry.sampler == sampler)
        {
            return entry.slot;
        }

        let slot = backend.add_image(image, sampler);
        self.entries.push(Entry { key, sampler, slot });
        slot
    }

    /// Number of distinct image/sampler pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeDevice, FakeFrame, FakeImage};

    fn backend() -> FakeFrame {
        FakeFrame::setup(Arc::new(FakeDevice::default())).unwrap()
    }

    #[test]
    fn test_same_pair_gets_same_slot() {
        let mut backend = backend();
        let mut descriptors = Descriptors::new();
        let image = FakeImage::new(7);

        let first = descriptors.add_image(&mut backend, &image, SamplerKind::Default);
        let second = descriptors.add_image(&mut backend, &image, SamplerKind::Default);

        assert_eq!(first, second);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(backend.images().len(), 1);
    }

    #[test]
    fn test_sampler_distinguishes_entries() {
        let mut backend = backend();
        let mut descriptors = Descriptors::new();
        let image = FakeImage::new(7);

        let linear = descriptors.add_image(&mut backend, &image, SamplerKind::Default);
        let nearest = descriptors.add_image(&mut backend, &image, SamplerKind::Nearest);

        assert_eq!((linear, nearest), (0, 1));
        assert_eq!(backend.images().len(), 2);
    }

    #[test]
    fn test_slots_follow_registration_order() {
        let mut backend = backend();
        let mut descriptors = Descriptors::new();

        let slots: Vec<u32> = (0..5)
            .map(|id| descriptors.add_image(&mut backend, &FakeImage::new(id), SamplerKind::Repeat))
            .collect();

        assert_eq!(slots, vec![0, 1, 2, 3, 4]);
    }
}
