use anyhow::{anyhow, Result};
use gfx_hal::{adapter::Adapter, format as f, prelude::*, pso, window, Backend};
use log::{debug, warn};

pub struct Swapchain<'a, B: Backend> {
    device: &'a B::Device,
    adapter: &'a Adapter<B>,
    pub viewport: pso::Viewport,
    pub dims: window::Extent2D,
    pub surface: &'a mut B::Surface,
    pub format: f::Format,
}

impl<'a, B: Backend> Swapchain<'a, B> {
    pub fn new(
        device: &'a B::Device,
        surface: &'a mut B::Surface,
        adapter: &'a Adapter<B>,
        dims: window::Extent2D,
    ) -> Result<Self> {
        let formats = surface.supported_formats(&adapter.physical_device);
        let format = choose_format(formats.as_deref());
        debug!("swapchain format {:?}", format);

        // Covers the whole window: (0, 0) to (width, height).
        let viewport = pso::Viewport {
            rect: pso::Rect {
                x: 0,
                y: 0,
                w: dims.width as _,
                h: dims.height as _,
            },
            depth: 0.0..1.0,
        };

        let mut swapchain = Swapchain {
            device,
            surface,
            adapter,
            viewport,
            format,
            dims,
        };

        swapchain.configure()?;
        Ok(swapchain)
    }

    fn configure(&mut self) -> Result<()> {
        let caps = self.surface.capabilities(&self.adapter.physical_device);

        let mut swap_config = window::SwapchainConfig::from_caps(&caps, self.format, self.dims);
        swap_config.present_mode = window::PresentMode::FIFO;
        let extent = swap_config.extent;
        unsafe {
            self.surface
                .configure_swapchain(self.device, swap_config)
                .map_err(|err| anyhow!("can't create swapchain: {:?}", err))?;
        }

        self.viewport.rect.w = extent.width as _;
        self.viewport.rect.h = extent.height as _;
        Ok(())
    }

    /// Reconfigures after an acquire or present failure. The window size is
    /// fixed, so the extent stays the same.
    pub fn recreate(&mut self) {
        if let Err(err) = self.configure() {
            warn!("{:#}", err);
        }
    }
}

impl<'a, B: Backend> Drop for Swapchain<'a, B> {
    fn drop(&mut self) {
        unsafe { self.surface.unconfigure_swapchain(self.device) }
    }
}

/// Prefers a linear `Unorm` format so colors are stored exactly as written.
/// An sRGB format would encode every value on the way into the framebuffer.
pub fn choose_format(formats: Option<&[f::Format]>) -> f::Format {
    match formats {
        Some(formats) if !formats.is_empty() => formats
            .iter()
            .find(|format| format.base_format().1 == f::ChannelType::Unorm)
            .copied()
            .unwrap_or(formats[0]),
        _ => f::Format::Rgba8Unorm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_unorm_over_srgb() {
        let formats = [f::Format::Rgba8Srgb, f::Format::Rgba8Unorm];
        assert_eq!(choose_format(Some(&formats[..])), f::Format::Rgba8Unorm);
    }

    #[test]
    fn srgb_only_surface_keeps_first_format() {
        let formats = [f::Format::Bgra8Srgb, f::Format::Rgba8Srgb];
        assert_eq!(choose_format(Some(&formats[..])), f::Format::Bgra8Srgb);
    }

    #[test]
    fn unknown_formats_fall_back_to_linear() {
        assert_eq!(choose_format(None), f::Format::Rgba8Unorm);
        assert_eq!(choose_format(Some(&[][..])), f::Format::Rgba8Unorm);
    }
}
