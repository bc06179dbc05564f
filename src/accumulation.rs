use crate::{
    backend::{ComputeBackend, ImageHandle},
    error::RenderError,
};

/// How the kernel combines a new sample with the target's contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccumulationPolicy {
    /// The target holds no valid samples; write the new one as is.
    Overwrite,
    /// Mix the new sample in with the given weight.
    Blend { weight: f32 },
}

/// GPU image the kernel accumulates radiance into, plus the number of
/// samples it currently holds.
#[derive(Debug, Default)]
pub struct AccumulationTarget {
    image: Option<ImageHandle>,
    width: u32,
    height: u32,
    sample: u32,
}

impl AccumulationTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure the target matches `width`x`height`, reallocating (and
    /// dropping all accumulated samples) when it does not.
    ///
    /// Returns whether a new image was allocated. The new image's contents are
    /// undefined until the first dispatch overwrites them.
    pub fn ensure<B: ComputeBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<bool, RenderError> {
        if self.image.is_some() && self.width == width && self.height == height {
            return Ok(false);
        }

        if width == 0 || height == 0 {
            return Err(RenderError::TargetAllocation {
                width,
                height,
                reason: "target must not be empty".to_owned(),
            });
        }

        self.release(backend);

        tracing::debug!("allocating accumulation target; size={width}x{height}");

        self.image = Some(backend.create_image(width, height)?);
        self.width = width;
        self.height = height;
        self.sample = 0;

        Ok(true)
    }

    /// Drops all accumulated samples, keeping the image.
    pub fn invalidate(&mut self) {
        self.sample = 0;
    }

    /// Records one more sample after a successful dispatch.
    pub fn bump(&mut self) {
        self.sample += 1;
    }

    pub fn release<B: ComputeBackend>(&mut self, backend: &mut B) {
        if let Some(image) = self.image.take() {
            backend.release_image(image);
        }
        self.width = 0;
        self.height = 0;
        self.sample = 0;
    }

    pub fn image(&self) -> Option<ImageHandle> {
        self.image
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn sample_count(&self) -> u32 {
        self.sample
    }

    /// Running average weight: the `n`-th sample (counting from zero)
    /// contributes `1 / (n + 1)`.
    pub fn policy(&self) -> AccumulationPolicy {
        match self.sample {
            0 => AccumulationPolicy::Overwrite,
            n => AccumulationPolicy::Blend {
                weight: 1.0 / (n as f32 + 1.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{BindingValue, BufferHandle, Slot},
        scene::Sphere,
    };

    #[derive(Default)]
    struct Images {
        next: u32,
        live: Vec<ImageHandle>,
        allocations: usize,
        fail: bool,
    }

    impl ComputeBackend for Images {
        fn create_image(&mut self, width: u32, height: u32) -> Result<ImageHandle, RenderError> {
            if self.fail {
                return Err(RenderError::TargetAllocation {
                    width,
                    height,
                    reason: "out of memory".to_owned(),
                });
            }
            self.next += 1;
            self.allocations += 1;
            self.live.push(ImageHandle(self.next));
            Ok(ImageHandle(self.next))
        }

        fn release_image(&mut self, image: ImageHandle) {
            self.live.retain(|&i| i != image);
        }

        fn create_scene_buffer(&mut self, _: &[Sphere]) -> Result<BufferHandle, RenderError> {
            unreachable!()
        }

        fn release_scene_buffer(&mut self, _: BufferHandle) {
            unreachable!()
        }

        fn bind(&mut self, _: Slot, _: BindingValue) -> Result<(), RenderError> {
            unreachable!()
        }

        fn dispatch(&mut self, _: u32, _: u32, _: u32) -> Result<(), RenderError> {
            unreachable!()
        }

        fn present(&mut self, _: ImageHandle) -> Result<(), RenderError> {
            unreachable!()
        }
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut images = Images::default();
        let mut target = AccumulationTarget::new();

        assert!(target.ensure(&mut images, 800, 600).unwrap());
        target.bump();
        target.bump();

        assert!(!target.ensure(&mut images, 800, 600).unwrap());
        assert_eq!(2, target.sample_count());
        assert_eq!(1, images.allocations);
    }

    #[test]
    fn resize_reallocates() {
        let mut images = Images::default();
        let mut target = AccumulationTarget::new();

        target.ensure(&mut images, 800, 600).unwrap();
        let old = target.image().unwrap();
        target.bump();

        assert!(target.ensure(&mut images, 1920, 1080).unwrap());
        assert_eq!(0, target.sample_count());
        assert_eq!((1920, 1080), target.size());
        assert_ne!(Some(old), target.image());
        assert_eq!(vec![target.image().unwrap()], images.live);

        assert!(!target.ensure(&mut images, 1920, 1080).unwrap());
        assert_eq!(2, images.allocations);
    }

    #[test]
    fn invalidate_and_bump() {
        let mut images = Images::default();
        let mut target = AccumulationTarget::new();
        target.ensure(&mut images, 4, 4).unwrap();

        for n in 1..=5 {
            target.bump();
            assert_eq!(n, target.sample_count());
        }

        target.invalidate();
        assert_eq!(0, target.sample_count());
        assert_eq!(1, images.allocations);
    }

    #[test]
    fn policy_follows_sample_count() {
        let mut images = Images::default();
        let mut target = AccumulationTarget::new();
        target.ensure(&mut images, 4, 4).unwrap();

        assert_eq!(AccumulationPolicy::Overwrite, target.policy());
        target.bump();
        assert_eq!(AccumulationPolicy::Blend { weight: 0.5 }, target.policy());
        target.bump();
        target.bump();
        assert_eq!(AccumulationPolicy::Blend { weight: 0.25 }, target.policy());
    }

    #[test]
    fn allocation_failure_is_reported() {
        let mut images = Images {
            fail: true,
            ..Default::default()
        };
        let mut target = AccumulationTarget::new();

        assert!(matches!(
            target.ensure(&mut images, 64, 64),
            Err(RenderError::TargetAllocation { .. })
        ));
        assert_eq!(None, target.image());

        assert!(matches!(
            target.ensure(&mut Images::default(), 0, 64),
            Err(RenderError::TargetAllocation { width: 0, .. })
        ));
    }
}
