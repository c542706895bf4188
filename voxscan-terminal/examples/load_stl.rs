//! Example: scan an STL file without the interactive view
//!
//! Usage: cargo run --example load_stl -- path/to/file.stl [slices.zip]
//!
//! Fits the model, runs a volumetric voxel scan and writes an XY slice stack.
use std::env;
use std::error::Error;
use voxscan_core::export::{save_archive, DEFAULT_ARCHIVE_NAME};
use voxscan_core::{ActivePlanes, Mesh, PlaneMode, ScanConfig, ScanSession};
use voxscan_terminal::loader;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    let mut mesh = match args.get(1) {
        Some(path) => loader::load_model(path)?,
        None => {
            eprintln!("Usage: {} <stl-file> [out.zip]", args[0]);
            eprintln!("\nNo STL file provided, using default cube...");
            Mesh::cube(2.0)
        }
    };
    let pose = loader::fit(&mut mesh);

    let config = ScanConfig {
        pitch: 0.5,
        planes: ActivePlanes::volumetric(),
        sample_count: 20,
        raster_width: 256,
        raster_height: 256,
        padding: 16,
        ..ScanConfig::default()
    };
    let mut session = ScanSession::new(config);
    session.load_mesh(mesh, pose);

    let voxels = session.update_now()?;
    println!("{} voxels at pitch {}", voxels.len(), voxels.pitch);

    let stack = session.generate_slices(PlaneMode::Xy)?;
    let out = args.get(2).map_or(DEFAULT_ARCHIVE_NAME, String::as_str);
    save_archive(&stack, out)?;
    println!("Wrote {} slices to {}", stack.len(), out);

    Ok(())
}
