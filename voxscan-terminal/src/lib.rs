//! Interactive terminal host for the VoxScan core
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use voxscan_core::export::{save_archive, DEFAULT_ARCHIVE_NAME};
use voxscan_core::{ActivePlanes, Mesh, PlaneMode, ScanConfig, ScanSession, WorldTransform};

pub mod loader;
pub mod renderer;

pub use renderer::OccupancyRenderer;

/// Rotation applied per key press, in radians.
const ROTATE_STEP: f32 = 0.1;

/// Main application struct for the terminal scanner
pub struct TerminalApp {
    session: ScanSession,
    renderer: OccupancyRenderer,
    view: PlaneMode,
    export_path: PathBuf,
    status: String,
    running: bool,
}

impl TerminalApp {
    pub fn new(mesh: Mesh, pose: WorldTransform, config: ScanConfig) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let mut session = ScanSession::new(config);
        session.load_mesh(mesh, pose);

        Ok(Self {
            session,
            renderer: OccupancyRenderer::new(width as usize, height.saturating_sub(2) as usize),
            view: PlaneMode::Xy,
            export_path: PathBuf::from(DEFAULT_ARCHIVE_NAME),
            status: String::from("Press U to scan"),
            running: true,
        })
    }

    /// Where `G` writes the slice archive.
    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = path.into();
        self
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        // First scan before the loop so the view is never empty on start.
        self.update_now();
        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let frame_time = Duration::from_millis(1000 / 30);

        while self.running {
            // Wake early if a debounced scan is due before the next frame.
            let timeout = self
                .session
                .scheduler()
                .time_until_due()
                .map_or(frame_time, |due| due.min(frame_time));

            if event::poll(timeout)? {
                self.handle_input()?;
            }

            match self.session.tick() {
                Ok(true) => self.status = self.scan_summary(),
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "Debounced scan failed");
                    self.status = format!("Scan failed: {e}");
                }
            }

            self.render()?;
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        match event::read()? {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => self.handle_key(code),
            Event::Resize(width, height) => {
                self.renderer
                    .resize(width as usize, height.saturating_sub(2) as usize);
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') | KeyCode::Up => self.rotate(ROTATE_STEP, 0.0, 0.0),
            KeyCode::Char('s') | KeyCode::Down => self.rotate(-ROTATE_STEP, 0.0, 0.0),
            KeyCode::Char('a') | KeyCode::Left => self.rotate(0.0, -ROTATE_STEP, 0.0),
            KeyCode::Char('d') | KeyCode::Right => self.rotate(0.0, ROTATE_STEP, 0.0),
            KeyCode::Char('e') => self.rotate(0.0, 0.0, ROTATE_STEP),
            KeyCode::Char('r') => self.rotate(0.0, 0.0, -ROTATE_STEP),
            KeyCode::Char('0') => {
                self.session.reset_transform();
                self.status = String::from("Pose reset");
            }
            KeyCode::Char('1') => self.toggle_plane(PlaneMode::Xy),
            KeyCode::Char('2') => self.toggle_plane(PlaneMode::Xz),
            KeyCode::Char('3') => self.toggle_plane(PlaneMode::Yz),
            KeyCode::Char('v') => {
                let planes = if self.session.config().planes.volumetric {
                    ActivePlanes::only(self.view)
                } else {
                    ActivePlanes::volumetric()
                };
                self.session.set_planes(planes);
                self.status = self.planes_summary();
            }
            KeyCode::Tab => {
                self.view = match self.view {
                    PlaneMode::Xy => PlaneMode::Xz,
                    PlaneMode::Xz => PlaneMode::Yz,
                    PlaneMode::Yz => PlaneMode::Xy,
                };
            }
            KeyCode::Char('l') => {
                let live = !self.session.config().live_update;
                self.session.set_live_update(live);
                self.status = format!("Live update {}", if live { "on" } else { "off" });
            }
            KeyCode::Char('u') => self.update_now(),
            KeyCode::Char('g') => self.export_slices(),
            _ => {}
        }
    }

    fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        let mut transform = *self.session.transform();
        transform.rotation.rotate(dx, dy, dz);
        self.session.set_transform(transform);
    }

    fn toggle_plane(&mut self, mode: PlaneMode) {
        let mut planes = self.session.config().planes;
        planes.volumetric = false;
        planes.set(mode, !planes.contains(mode));
        self.session.set_planes(planes);
        self.view = mode;
        self.status = self.planes_summary();
    }

    fn update_now(&mut self) {
        let result = self.session.update_now().map(|_| ());
        self.status = match result {
            Ok(()) => self.scan_summary(),
            Err(e) => {
                warn!(error = %e, "Scan failed");
                format!("Scan failed: {e}")
            }
        };
    }

    fn export_slices(&mut self) {
        let result = self
            .session
            .generate_slices(self.view)
            .and_then(|stack| save_archive(&stack, &self.export_path).map(|_| stack.len()));
        self.status = match result {
            Ok(count) => {
                info!(slices = count, path = %self.export_path.display(), "Exported slices");
                format!("Wrote {} slices to {}", count, self.export_path.display())
            }
            Err(e) => {
                warn!(error = %e, "Slice export failed");
                format!("Export failed: {e}")
            }
        };
    }

    fn scan_summary(&self) -> String {
        let voxels = self.session.voxels();
        format!("{} voxels at pitch {}", voxels.len(), voxels.pitch)
    }

    fn planes_summary(&self) -> String {
        let planes = self.session.config().planes;
        if planes.volumetric {
            return String::from("Volumetric scan");
        }
        let active: Vec<&str> = PlaneMode::ALL
            .iter()
            .filter(|m| planes.contains(**m))
            .map(|m| match m {
                PlaneMode::Xy => "XY",
                PlaneMode::Xz => "XZ",
                PlaneMode::Yz => "YZ",
            })
            .collect();
        if active.is_empty() {
            String::from("No planes active")
        } else {
            format!("Planes: {}", active.join(" "))
        }
    }

    fn render(&mut self) -> io::Result<()> {
        self.renderer.render_voxels(self.session.voxels(), self.view);

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        // Draw UI overlay
        let (_, height) = terminal::size()?;
        let live = if self.session.config().live_update { "live" } else { "manual" };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "VoxScan | view {:?} | {} | WASD/ER=Rotate 0=Reset 1/2/3=Planes V=Volume Tab=View L=Live U=Scan G=Export Q=Quit",
                self.view, live
            )),
            cursor::MoveTo(0, height.saturating_sub(1)),
            terminal::Clear(ClearType::CurrentLine),
            Print(&self.status),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}
