pub mod halfblocks;
pub mod protocol;
pub mod source;

use image::DynamicImage;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;

pub use halfblocks::HalfblockRenderable;
pub use protocol::{ImageProtocol, ProtocolRenderable};
pub use source::{ImageLoadError, ImageSource, PixelMeta};

/// Something that can draw an image into a ratatui buffer
///
/// The widget sizes the area before calling `render`; a renderable only has
/// to fill it.
pub trait ImageRenderable: Send {
    /// Draw `image` into `area`, which is already the resolved cell size
    fn render(&mut self, image: &DynamicImage, area: Rect, buf: &mut Buffer);

    /// Release any encoded state held for the current image
    fn cleanup(&mut self);
}

/// Which renderable the viewer should use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Best graphics protocol the terminal supports
    #[default]
    Protocol,
    /// Unicode halfblocks only
    Halfblocks,
}

/// Create an image renderable of the requested kind
///
/// The protocol renderable uses ratatui-image's picker, which auto-detects:
/// - Kitty graphics protocol
/// - Sixel protocol
/// - iTerm2 protocol
/// - Halfblocks fallback (always works)
pub fn create_renderable(kind: RendererKind, protocol: ImageProtocol) -> Box<dyn ImageRenderable> {
    match kind {
        RendererKind::Protocol => {
            log::debug!("Using ratatui-image protocol renderable");
            Box::new(ProtocolRenderable::new(protocol))
        }
        RendererKind::Halfblocks => {
            log::debug!("Using halfblock renderable");
            Box::new(HalfblockRenderable::new())
        }
    }
}
