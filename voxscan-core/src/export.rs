//! Slice stack export as a zip of PNG images.
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use image::ImageFormat;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::raster::SliceStack;

/// File name used when the host does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "slices.zip";

/// Write every slice of `stack` as `slice_<axis>_<index>.png` into a zip
/// archive on `writer`. An empty stack yields an empty archive.
pub fn write_archive<W: Write + Seek>(stack: &SliceStack, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    // PNG data is already compressed.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut png = Vec::new();
    for slice in &stack.slices {
        png.clear();
        slice
            .image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        zip.start_file(stack.file_name(slice.index), options)?;
        zip.write_all(&png)?;
    }

    Ok(zip.finish()?)
}

/// Write the archive to `path`, creating or truncating the file.
pub fn save_archive(stack: &SliceStack, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);
    let mut file = write_archive(stack, file)?;
    file.flush()?;
    info!(
        path = %path.display(),
        slices = stack.len(),
        axis = stack.axis.name(),
        "Saved slice archive"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Slice;
    use crate::scan::PlaneMode;
    use image::{GrayImage, Luma};
    use std::io::Read;
    use zip::ZipArchive;

    fn stack() -> SliceStack {
        let slices = (0..3)
            .map(|i| Slice {
                index: i,
                position: i as f32,
                image: GrayImage::from_fn(4, 3, |x, y| Luma([(x * 10 + y + i as u32) as u8])),
            })
            .collect();
        SliceStack {
            mode: PlaneMode::Xz,
            axis: PlaneMode::Xz.normal(),
            slices,
        }
    }

    #[test]
    fn test_archive_holds_one_png_per_slice() {
        let stack = stack();
        let cursor = write_archive(&stack, Cursor::new(Vec::new())).unwrap();
        let mut archive = ZipArchive::new(cursor).unwrap();
        assert_eq!(archive.len(), 3);

        for slice in &stack.slices {
            let mut entry = archive.by_name(&format!("slice_y_{}.png", slice.index)).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
                .unwrap()
                .to_luma8();
            assert_eq!(decoded, slice.image);
        }
    }

    #[test]
    fn test_empty_stack_gives_empty_archive() {
        let cursor = write_archive(&SliceStack::empty(PlaneMode::Xy), Cursor::new(Vec::new())).unwrap();
        assert_eq!(ZipArchive::new(cursor).unwrap().len(), 0);
    }

    #[test]
    fn test_save_archive_to_disk() {
        let path = std::env::temp_dir().join(format!("voxscan-export-{}.zip", std::process::id()));
        save_archive(&stack(), &path).unwrap();
        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        std::fs::remove_file(&path).unwrap();
    }
}
