use anyhow::{Context, Result};
use retro24_core::types::Frame;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Expand an ARGB frame into RGBA bytes, each pixel repeated `scale` times
/// in both directions.
pub fn scaled_rgba(frame: &Frame, scale: u32) -> Vec<u8> {
    let scale = scale.max(1) as usize;
    let width = frame.width as usize;
    let mut out = Vec::with_capacity(frame.pixels.len() * scale * scale * 4);
    for row in frame.pixels.chunks(width) {
        let mut line = Vec::with_capacity(width * scale * 4);
        for &argb in row {
            let [a, r, g, b] = argb.to_be_bytes();
            for _ in 0..scale {
                line.extend_from_slice(&[r, g, b, a]);
            }
        }
        for _ in 0..scale {
            out.extend_from_slice(&line);
        }
    }
    out
}

pub fn write_png(frame: &Frame, scale: u32, path: &Path) -> Result<()> {
    let scale = scale.max(1);
    let file = File::create(path)
        .with_context(|| format!("failed to create PNG: {}", path.display()))?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        frame.width * scale,
        frame.height * scale,
    );
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .with_context(|| format!("failed to write PNG: {}", path.display()))?;
    writer
        .write_image_data(&scaled_rgba(frame, scale))
        .with_context(|| format!("failed to write PNG: {}", path.display()))?;
    Ok(())
}
