//! Host-facing state: the active mesh, its pose, the scan parameters and the
//! most recent voxel set, tied together by a debounced update scheduler.
use tracing::{debug, info, warn};

use crate::config::{ActivePlanes, ScanConfig};
use crate::error::{Result, VoxScanError};
use crate::geometry::Mesh;
use crate::raster::{self, SliceStack};
use crate::scan::PlaneMode;
use crate::scheduler::{Clock, SystemClock, UpdateScheduler};
use crate::transform::WorldTransform;
use crate::voxel::{voxelize, VoxelSet};

/// One interactive scanning session.
///
/// Mutators only record the new state and ask the scheduler for a deferred
/// run; the pipeline itself runs from [`ScanSession::tick`] or
/// [`ScanSession::update_now`]. A run that fails leaves the previous voxel
/// set in place.
#[derive(Debug)]
pub struct ScanSession<C: Clock = SystemClock> {
    mesh: Option<Mesh>,
    transform: WorldTransform,
    reset_pose: WorldTransform,
    config: ScanConfig,
    voxels: VoxelSet,
    scheduler: UpdateScheduler<C>,
    runs: usize,
}

impl ScanSession<SystemClock> {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ScanSession<C> {
    pub fn with_clock(config: ScanConfig, clock: C) -> Self {
        let mut scheduler = UpdateScheduler::new(clock, config.update_delay());
        scheduler.set_live(config.live_update);
        Self {
            mesh: None,
            transform: WorldTransform::identity(),
            reset_pose: WorldTransform::identity(),
            voxels: VoxelSet::empty(config.pitch),
            config,
            scheduler,
            runs: 0,
        }
    }

    /// Make `mesh` the active mesh, posed at `reset_pose`.
    pub fn load_mesh(&mut self, mesh: Mesh, reset_pose: WorldTransform) {
        info!(triangles = mesh.triangles.len(), "Mesh loaded");
        self.mesh = Some(mesh);
        self.transform = reset_pose;
        self.reset_pose = reset_pose;
        self.discard_voxels();
        self.scheduler.cancel();
        self.scheduler.request_update();
    }

    pub fn unload(&mut self) {
        self.mesh = None;
        self.discard_voxels();
        self.scheduler.cancel();
    }

    pub fn set_transform(&mut self, transform: WorldTransform) {
        self.transform = transform;
        self.scheduler.request_update();
    }

    pub fn reset_transform(&mut self) {
        self.set_transform(self.reset_pose);
    }

    /// Switch the active planes. The current voxel set belongs to the old
    /// selection and is dropped.
    pub fn set_planes(&mut self, planes: ActivePlanes) {
        if planes != self.config.planes {
            self.config.planes = planes;
            self.discard_voxels();
        }
        self.scheduler.request_update();
    }

    /// Replace every parameter at once. Invalid configurations are rejected
    /// without touching the session.
    pub fn set_config(&mut self, config: ScanConfig) -> Result<()> {
        config.validate()?;
        if config.planes != self.config.planes {
            self.discard_voxels();
        }
        self.scheduler.set_delay(config.update_delay());
        self.scheduler.set_live(config.live_update);
        self.config = config;
        self.scheduler.request_update();
        Ok(())
    }

    /// Turning live mode on schedules a run straight away.
    pub fn set_live_update(&mut self, live: bool) {
        self.config.live_update = live;
        self.scheduler.set_live(live);
        self.scheduler.request_update();
    }

    /// Run the pipeline immediately, bypassing the debounce window.
    pub fn update_now(&mut self) -> Result<&VoxelSet> {
        self.run()?;
        Ok(&self.voxels)
    }

    /// Run the pipeline if a debounced update has come due.
    ///
    /// Returns whether a run happened.
    pub fn tick(&mut self) -> Result<bool> {
        if !self.scheduler.poll() {
            return Ok(false);
        }
        debug!("Debounced update due");
        self.run()?;
        Ok(true)
    }

    /// Slice stack for `mode` with the current mesh, pose and parameters.
    pub fn generate_slices(&self, mode: PlaneMode) -> Result<SliceStack> {
        let mesh = self.mesh.as_ref().ok_or(VoxScanError::NoMesh)?;
        raster::generate_slices(mesh, &self.transform, &self.config, mode)
    }

    fn run(&mut self) -> Result<()> {
        let Some(mesh) = self.mesh.as_ref() else {
            warn!("Update requested with no mesh loaded");
            return Err(VoxScanError::NoMesh);
        };
        self.voxels = voxelize(mesh, &self.transform, &self.config)?;
        self.runs += 1;
        Ok(())
    }

    fn discard_voxels(&mut self) {
        self.voxels = VoxelSet::empty(self.config.pitch);
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn transform(&self) -> &WorldTransform {
        &self.transform
    }

    pub fn reset_pose(&self) -> &WorldTransform {
        &self.reset_pose
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn voxels(&self) -> &VoxelSet {
        &self.voxels
    }

    pub fn scheduler(&self) -> &UpdateScheduler<C> {
        &self.scheduler
    }

    /// Completed pipeline runs since the session was created.
    pub fn runs(&self) -> usize {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;
    use crate::voxel::VoxelSource;
    use nalgebra::Vector3;
    use std::time::Duration;

    fn config() -> ScanConfig {
        ScanConfig {
            pitch: 0.25,
            ..ScanConfig::default()
        }
    }

    fn at(x: f32) -> WorldTransform {
        WorldTransform {
            position: Vector3::new(x, 0.0, 0.0),
            ..WorldTransform::identity()
        }
    }

    #[test]
    fn test_no_mesh_is_reported_without_mutation() {
        let mut session = ScanSession::new(config());
        assert!(matches!(session.update_now(), Err(VoxScanError::NoMesh)));
        assert!(matches!(
            session.generate_slices(PlaneMode::Xy),
            Err(VoxScanError::NoMesh)
        ));
        assert!(session.voxels().is_empty());
        assert_eq!(session.runs(), 0);
        assert_eq!(session.config(), &config());
    }

    #[test]
    fn test_empty_mesh_run_fails() {
        let mut session = ScanSession::new(config());
        session.load_mesh(Mesh::new(), WorldTransform::identity());
        assert!(matches!(session.update_now(), Err(VoxScanError::EmptyMesh)));
        assert!(session.voxels().is_empty());
    }

    #[test]
    fn test_rejected_config_keeps_state() {
        let mut session = ScanSession::new(config());
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());
        assert_eq!(session.update_now().unwrap().len(), 64);

        let bad = ScanConfig {
            pitch: 0.0,
            ..config()
        };
        assert!(session.set_config(bad).is_err());
        assert_eq!(session.config().pitch, 0.25);
        assert_eq!(session.voxels().len(), 64);
    }

    #[test]
    fn test_switching_planes_discards_voxels() {
        let mut session = ScanSession::new(config());
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());
        session.update_now().unwrap();
        assert_eq!(session.voxels().count_from(VoxelSource::Plane(PlaneMode::Xy)), 64);

        session.set_planes(ActivePlanes::only(PlaneMode::Yz));
        assert!(session.voxels().is_empty());

        let set = session.update_now().unwrap();
        assert_eq!(set.len(), 64);
        assert_eq!(set.count_from(VoxelSource::Plane(PlaneMode::Yz)), 64);
    }

    #[test]
    fn test_debounced_run_uses_latest_parameters() {
        let clock = ManualClock::new();
        let live = ScanConfig {
            live_update: true,
            ..config()
        };
        let mut session = ScanSession::with_clock(live.clone(), &clock);
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());

        for i in 0..5 {
            session.set_transform(at(i as f32));
            clock.advance(Duration::from_millis(10));
            assert!(!session.tick().unwrap());
        }
        session
            .set_config(ScanConfig {
                pitch: 0.5,
                ..live
            })
            .unwrap();
        clock.advance(Duration::from_millis(50));
        assert!(session.tick().unwrap());
        assert!(!session.tick().unwrap());

        assert_eq!(session.runs(), 1);
        let set = session.voxels();
        assert_eq!(set.pitch, 0.5);
        assert_eq!(set.len(), 16);
        assert!(set.centers().all(|c| c.x > 2.9));
    }

    #[test]
    fn test_manual_mode_ignores_edits_until_update_now() {
        let clock = ManualClock::new();
        let mut session = ScanSession::with_clock(config(), &clock);
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());
        session.set_transform(at(3.0));
        clock.advance(Duration::from_secs(1));
        assert!(!session.tick().unwrap());
        assert!(session.voxels().is_empty());

        session.update_now().unwrap();
        assert_eq!(session.runs(), 1);

        session.reset_transform();
        assert_eq!(session.transform(), session.reset_pose());
    }

    #[test]
    fn test_enabling_live_mode_schedules_a_run() {
        let clock = ManualClock::new();
        let mut session = ScanSession::with_clock(config(), &clock);
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());
        session.set_live_update(true);
        assert!(session.scheduler().is_pending());
        clock.advance(Duration::from_millis(50));
        assert!(session.tick().unwrap());
        assert_eq!(session.voxels().len(), 64);
    }

    #[test]
    fn test_slices_follow_current_pose() {
        let mut session = ScanSession::new(ScanConfig {
            sample_count: 3,
            raster_width: 64,
            raster_height: 64,
            padding: 4,
            noise_seed: Some(1),
            ..config()
        });
        session.load_mesh(Mesh::cube(2.0), WorldTransform::identity());
        let stack = session.generate_slices(PlaneMode::Xz).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.file_name(0), "slice_y_0.png");
    }
}
