use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors from reading an image source
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
    #[error("Failed to read image {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Image to display: a file on disk or pixels already in memory
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file, decoded on first render
    File(PathBuf),
    /// Decoded image
    Decoded(Arc<DynamicImage>),
}

impl ImageSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ImageSource::File(path.into())
    }

    /// Path on disk, if this source came from one
    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageSource::File(path) => Some(path),
            ImageSource::Decoded(_) => None,
        }
    }

    /// Decode the image (a cheap clone for in-memory sources)
    pub fn decode(&self) -> Result<Arc<DynamicImage>, ImageLoadError> {
        match self {
            ImageSource::File(path) => {
                let image = image::open(path).map_err(|source| ImageLoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                Ok(Arc::new(image))
            }
            ImageSource::Decoded(img) => Ok(Arc::clone(img)),
        }
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(img: DynamicImage) -> Self {
        ImageSource::Decoded(Arc::new(img))
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::File(path)
    }
}

/// Pixel dimensions of an image source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelMeta {
    pub width: u32,
    pub height: u32,
}

impl PixelMeta {
    /// Read the dimensions, touching only the file header for on-disk images
    pub fn read(source: &ImageSource) -> Result<Self, ImageLoadError> {
        let (width, height) = match source {
            ImageSource::File(path) => {
                image::image_dimensions(path).map_err(|source| ImageLoadError::Read {
                    path: path.clone(),
                    source,
                })?
            }
            ImageSource::Decoded(img) => (img.width(), img.height()),
        };
        Ok(PixelMeta { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_decoded_meta() {
        let source = ImageSource::from(DynamicImage::ImageRgb8(RgbImage::new(32, 16)));
        assert_eq!(
            PixelMeta::read(&source).unwrap(),
            PixelMeta {
                width: 32,
                height: 16
            }
        );
        assert!(source.path().is_none());
    }

    #[test]
    fn test_file_meta_and_decode() {
        let name = format!("tuimg-meta-{}.png", std::process::id());
        let path = std::env::temp_dir().join(name);
        RgbImage::from_pixel(12, 5, Rgb([1, 2, 3])).save(&path).unwrap();

        let source = ImageSource::file(&path);
        assert_eq!(source.path(), Some(path.as_path()));
        assert_eq!(
            PixelMeta::read(&source).unwrap(),
            PixelMeta {
                width: 12,
                height: 5
            }
        );
        let decoded = source.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 5));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let source = ImageSource::file("/nonexistent/tuimg/missing.png");
        assert!(matches!(
            PixelMeta::read(&source),
            Err(ImageLoadError::Read { .. })
        ));
        assert!(source.decode().is_err());
    }
}
