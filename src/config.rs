use gfx_hal::{format as f, window};

/// Window and context parameters. There is exactly one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: &'static str,
    /// Requested OpenGL version, always a core profile.
    pub gl_version: (u8, u8),
    pub vsync: bool,
    /// Linear, so clear and fragment colors reach the framebuffer unencoded.
    pub color_format: f::Format,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1280,
            height: 720,
            title: "OpenGL Test",
            gl_version: (3, 3),
            vsync: true,
            color_format: f::Format::Rgba8Unorm,
        }
    }
}

impl WindowConfig {
    pub fn extent(&self) -> window::Extent2D {
        window::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_720p() {
        let config = WindowConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.title, "OpenGL Test");
    }

    #[test]
    fn requests_gl_3_3() {
        assert_eq!(WindowConfig::default().gl_version, (3, 3));
    }

    #[test]
    fn color_format_is_linear() {
        let format = WindowConfig::default().color_format;
        assert_eq!(format.base_format().1, f::ChannelType::Unorm);
    }

    #[test]
    fn extent_matches_size() {
        let extent = WindowConfig::default().extent();
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }
}
