//! VoxScan Terminal - interactive voxel scan of an STL model
//!
//! Usage: voxscan-terminal [model.stl] [--config scan.toml] [--out slices.zip]
//!
//! Without a model a cube is scanned. Controls:
//!   - WASD / Arrow Keys, E/R: Rotate the model (rescans in live mode)
//!   - 1/2/3: Toggle the XY/XZ/YZ planes, V: volumetric scan
//!   - L: Live update, U: Scan now, G: Export a slice stack
//!   - Q/ESC: Quit
use std::env;
use std::error::Error;
use voxscan_core::{Mesh, ScanConfig};
use voxscan_terminal::{loader, TerminalApp};

fn main() -> Result<(), Box<dyn Error>> {
    let mut model = None;
    let mut config_path = None;
    let mut out = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next(),
            "--out" => out = args.next(),
            _ => model = Some(arg),
        }
    }

    let config = match config_path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    let mut mesh = match model {
        Some(path) => {
            println!("Loading model: {}", path);
            loader::load_model(&path)?
        }
        None => Mesh::cube(2.0),
    };
    let pose = loader::fit(&mut mesh);
    println!("Loaded {} triangles", mesh.triangles.len());

    let mut app = TerminalApp::new(mesh, pose, config)?;
    if let Some(out) = out {
        app = app.with_export_path(out);
    }
    app.run()?;

    Ok(())
}
