//! # Shell Hierarchy
//!
//! Concentric icosahedral shells around the camera, stored outermost first.
//! Shell `k` has radius `root_radius * shell_scale^k` and textures whatever
//! its rays find between `0.9 R` and its distance limit. Only the first
//! `active` shells are scheduled and drawn; the rest are kept for reuse until
//! pruned.
//!
//! The hierarchy reacts to three things:
//!
//! -   the camera leaving a shell's neighbourhood (recenter, a reset),
//! -   the innermost active shell seeing the set within its own radius
//!     (grow one level),
//! -   trailing inactive shells going stale or far away (prune).

use crate::icosahedron::{self, FACE_COUNT};
use crate::settings::RenderSettings;
use crate::tile::{ShellId, Tile, TileId};
use fractal::{RenderJob, Vec3};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Shell {
    id: ShellId,
    radius: f64,
    distance_limit: f64,
    center: Vec3,
    tiles: Vec<Tile>,
}

impl Shell {
    fn new(id: ShellId, radius: f64, distance_limit: f64, center: Vec3) -> Self {
        Self {
            id,
            radius,
            distance_limit,
            center,
            tiles: icosahedron::faces().map(Tile::new).collect(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ShellId {
        self.id
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// March limit in units of the radius.
    #[must_use]
    pub fn distance_limit(&self) -> f64 {
        self.distance_limit
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[must_use]
    pub fn tile(&self, face: usize) -> Option<&Tile> {
        self.tiles.get(face)
    }

    pub fn tile_mut(&mut self, face: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(face)
    }

    /// Moves the shell and drops every tile computed for the old center.
    /// Jobs already in flight finish and are then ignored.
    pub fn recenter(&mut self, center: Vec3) {
        self.center = center;
        for tile in &mut self.tiles {
            tile.invalidate();
        }
    }

    /// Some current tile saw the set within one radius.
    #[must_use]
    pub fn has_intersection(&self) -> bool {
        self.tiles.iter().any(|t| t.is_current(self.center) && t.intersection)
    }

    #[must_use]
    pub fn has_valid_data(&self) -> bool {
        self.tiles.iter().any(|t| t.is_valid(self.center))
    }

    #[must_use]
    pub fn busy_tiles(&self) -> usize {
        self.tiles.iter().filter(|t| t.busy).count()
    }

    #[must_use]
    pub fn job(&self, face: usize, tex_size: u32) -> Option<RenderJob> {
        self.tile(face)
            .map(|t| t.job(self.center, self.radius, self.distance_limit, tex_size))
    }
}

/// What happened to the hierarchy during one camera update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HierarchyChange {
    /// Index of the shell that was recentered, if any.
    pub recentered: Option<usize>,
    pub active_before: usize,
    pub active_after: usize,
}

impl HierarchyChange {
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.recentered.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    shells: Vec<Shell>,
    active: usize,
    next_id: u64,
    root_radius: f64,
    shell_scale: f64,
    max_shells: usize,
    recenter_fraction: f64,
    prune_distance: f64,
    root_distance_limit: f64,
    shell_distance_limit: f64,
}

impl Hierarchy {
    /// A hierarchy with only the root shell, centered at `camera`.
    #[must_use]
    pub fn new(settings: &RenderSettings, camera: Vec3) -> Self {
        let mut hierarchy = Self {
            shells: Vec::with_capacity(settings.max_shells),
            active: 0,
            next_id: 0,
            root_radius: settings.root_radius,
            shell_scale: settings.shell_scale,
            max_shells: settings.max_shells.clamp(1, crate::settings::MAX_SHELLS),
            recenter_fraction: settings.recenter_fraction,
            prune_distance: settings.prune_distance,
            root_distance_limit: settings.root_distance_limit,
            shell_distance_limit: settings.shell_distance_limit,
        };
        hierarchy.push_shell(camera);
        hierarchy.active = 1;
        hierarchy
    }

    fn push_shell(&mut self, center: Vec3) {
        let depth = self.shells.len();
        let (radius, limit) = match self.shells.last() {
            None => (self.root_radius, self.root_distance_limit),
            Some(parent) => (parent.radius * self.shell_scale, self.shell_distance_limit),
        };
        let id = ShellId(self.next_id);
        self.next_id += 1;
        debug!(shell = id.0, depth, radius, "shell created");
        self.shells.push(Shell::new(id, radius, limit, center));
    }

    #[must_use]
    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    /// Shells that are scheduled and drawn, outermost first.
    #[must_use]
    pub fn active_shells(&self) -> &[Shell] {
        &self.shells[..self.active]
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    /// The deepest active shell.
    #[must_use]
    pub fn innermost(&self) -> &Shell {
        &self.shells[self.active - 1]
    }

    /// Index of shell `id`, if it still exists.
    #[must_use]
    pub fn position(&self, id: ShellId) -> Option<usize> {
        self.shells.iter().position(|s| s.id == id)
    }

    #[must_use]
    pub fn shell(&self, id: ShellId) -> Option<&Shell> {
        self.shells.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn is_active(&self, id: ShellId) -> bool {
        self.position(id).is_some_and(|i| i < self.active)
    }

    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.shell(id.shell)?.tile(id.face)
    }

    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.shells.iter_mut().find(|s| s.id == id.shell)?.tile_mut(id.face)
    }

    /// Job for tile `id` at its shell's current center.
    #[must_use]
    pub fn job(&self, id: TileId, tex_size: u32) -> Option<RenderJob> {
        self.shell(id.shell)?.job(id.face, tex_size)
    }

    /// Recenters the outermost active shell the camera has strayed from; it
    /// becomes the deepest active shell.
    pub fn on_camera_moved(&mut self, camera: Vec3) -> HierarchyChange {
        let before = self.active;
        let fraction = self.recenter_fraction;
        let stray = self.shells[..self.active]
            .iter()
            .position(|s| s.center.distance(camera) > fraction * s.radius);
        if let Some(k) = stray {
            self.shells[k].recenter(camera);
            self.active = k + 1;
            info!(shell = k, active = self.active, "shell recentered");
        }
        HierarchyChange { recentered: stray, active_before: before, active_after: self.active }
    }

    /// Activates one more shell if the innermost active one reports an
    /// intersection. Returns whether the active count grew.
    pub fn grow(&mut self, camera: Vec3) -> bool {
        if self.active >= self.max_shells || !self.innermost().has_intersection() {
            return false;
        }
        if self.active < self.shells.len() {
            let shell = &mut self.shells[self.active];
            if shell.center.distance(camera) > self.recenter_fraction * shell.radius {
                shell.recenter(camera);
            }
        } else {
            self.push_shell(camera);
        }
        self.active += 1;
        info!(active = self.active, radius = self.innermost().radius, "shell activated");
        true
    }

    /// Removes trailing inactive shells that have nothing in flight, hold no
    /// valid data and are far from the camera. Returns how many were removed.
    pub fn prune(&mut self, camera: Vec3) -> usize {
        let mut removed = 0;
        while self.shells.len() > self.active {
            let Some(last) = self.shells.last() else { break };
            let far = last.center.distance(camera) > self.prune_distance * last.radius;
            if last.busy_tiles() > 0 || last.has_valid_data() || !far {
                break;
            }
            debug!(shell = last.id.0, "shell pruned");
            self.shells.pop();
            removed += 1;
        }
        removed
    }

    /// Moves the whole hierarchy to a new camera position, as after a jump.
    pub fn reset(&mut self, camera: Vec3) -> HierarchyChange {
        let before = self.active;
        self.shells[0].recenter(camera);
        self.active = 1;
        info!("hierarchy reset");
        HierarchyChange { recentered: Some(0), active_before: before, active_after: 1 }
    }

    /// Tiles in flight across all shells.
    #[must_use]
    pub fn busy_tiles(&self) -> usize {
        self.shells.iter().map(Shell::busy_tiles).sum()
    }

    /// Every tile id of the active shells.
    pub fn active_tile_ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.active_shells()
            .iter()
            .flat_map(|s| (0..FACE_COUNT).map(move |face| TileId { shell: s.id, face }))
    }
}
