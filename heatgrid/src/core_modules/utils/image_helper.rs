pub mod image_helper {
    use image::{ImageEncoder, RgbaImage};
    use std::io::Cursor;
    use std::path::Path;

    pub fn save(path: impl AsRef<Path>, canvas: &RgbaImage) -> Result<(), image::error::ImageError> {
        let output = std::io::BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(canvas.as_raw(), canvas.width(), canvas.height(), image::ExtendedColorType::Rgba8)?;

        Ok(())
    }

    pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, image::error::ImageError> {
        let mut bytes = Cursor::new(Vec::new());
        let encoder = image::codecs::png::PngEncoder::new(&mut bytes);

        encoder.write_image(canvas.as_raw(), canvas.width(), canvas.height(), image::ExtendedColorType::Rgba8)?;

        Ok(bytes.into_inner())
    }
}
