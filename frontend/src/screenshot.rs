use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use omniframe_core::frame::LayoutTable;

/// Write the video region as an 8-bit grayscale PNG, one byte per pixel.
pub fn write_png(path: &Path, layout: &LayoutTable, video: &[u8]) -> Result<(), String> {
    let width = layout.profile.video_width;
    let height = layout.profile.video_height;
    let pixels = video
        .get(..width * height)
        .ok_or_else(|| format!("video region holds {} bytes, need {}", video.len(), width * height))?;

    let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width as u32, height as u32);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
    writer.write_image_data(pixels).map_err(|e| e.to_string())?;
    writer.finish().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniframe_core::prelude::*;
    use omniframe_machines::registry;

    #[test]
    fn screenshot_matches_video_region() {
        let entry = registry::find("generic6502").unwrap();
        let mut session = EmulatorSession::new((entry.create)(), SessionConfig::default()).unwrap();
        session.write_memory(0x2000, &[0x00, 0x40, 0xFF]).unwrap();
        session.next_frame().unwrap();

        let path = std::env::temp_dir().join(format!(
            "omniframe_screenshot_{}.png",
            std::process::id()
        ));
        write_png(&path, session.layout(), session.video()).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (280, 192));
        assert_eq!(info.color_type, png::ColorType::Grayscale);
        assert_eq!(&buf[..info.buffer_size()], session.video());
        assert_eq!(buf[..3], [0x00, 0x40, 0xFF]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn short_video_region_is_rejected() {
        let entry = registry::find("generic6502").unwrap();
        let session = EmulatorSession::new((entry.create)(), SessionConfig::default()).unwrap();
        let path = std::env::temp_dir().join("omniframe_screenshot_short.png");
        assert!(write_png(&path, session.layout(), &[0; 10]).is_err());
    }
}
