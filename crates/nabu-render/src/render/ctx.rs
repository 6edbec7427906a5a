use crate::coords::Viewport;

/// GPU handles and target description shared by every flush.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    /// Format pipelines are built for. Changing it rebuilds them.
    pub target_format: wgpu::TextureFormat,
    pub viewport: Viewport,
}

impl<'a> RenderCtx<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        Self { device, queue, target_format, viewport }
    }

    /// Same context after a resize or DPI change.
    #[inline]
    pub fn with_viewport(self, viewport: Viewport) -> Self {
        Self { viewport, ..self }
    }
}

/// Where one flush records its render pass. The pass loads the view's
/// existing contents; clearing is up to the caller.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, view: &'a wgpu::TextureView) -> Self {
        Self { encoder, view }
    }
}
