// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The stage: a root container bound to an output surface.
//!
//! [`Stage`] owns the [`Scene`], the surface it renders into, and all pointer
//! state. Hosts feed it input in page coordinates and call [`Stage::update`]
//! once per frame. Everything the stage has to report is queued as
//! [`StageEvent`]s and retrieved with [`Stage::drain_events`].
//!
//! ## Pointers
//!
//! Page coordinates are mapped to stage pixels through the display rectangle
//! set with [`Stage::set_display_rect`]. A press hit-tests the scene and
//! captures the pointer: later moves are reported to the pressed node as
//! [`EventKind::PressMove`] regardless of what is under the pointer, and the
//! release produces [`EventKind::PressUp`] plus [`EventKind::Click`] if the
//! pointer is still over the pressed node.
//!
//! ## Hover
//!
//! Over/out and roll transitions are computed by [`Stage::test_mouse_over`].
//! Nothing is polled in the background; a host that enabled hover tracking
//! with [`Stage::enable_mouse_over`] calls [`Stage::poll`] from its frame
//! loop and the stage rate-limits the actual hit tests.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

use kurbo::{Affine, Point, Rect, Shape};

use crate::event::{EventKind, PointerInfo, StageEvent, TickParams};
use crate::graphics::PATH_TOLERANCE;
use crate::hit::{HitMode, HitSampler, HitTestError};
use crate::node::{NodeId, Scene};
use crate::pointer::{HoverPoller, PointerId, PointerTable};
use crate::surface::{Surface, SurfaceFactory};

/// Stage behavior switches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageConfig {
    /// Clear the surface before each update.
    pub auto_clear: bool,
    /// Tick the scene at the start of each update.
    pub tick_on_update: bool,
    /// Round translations of nodes that opt into pixel snapping.
    pub snap_to_pixel: bool,
    /// Keep tracking pointers outside the stage, clamped to its edge.
    pub mouse_move_outside: bool,
    /// Treat unreadable hit samples as misses instead of errors.
    pub suppress_sampling_errors: bool,
    /// Hover polls per second. `None` disables hover tracking.
    pub mouse_over_frequency: Option<u32>,
    /// Restrict drawing to this region of the surface.
    ///
    /// This only clips drawing. With `auto_clear` set, the whole surface is
    /// still cleared, so pixels outside the region do not survive an update.
    pub draw_rect: Option<Rect>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            auto_clear: true,
            tick_on_update: true,
            snap_to_pixel: true,
            mouse_move_outside: false,
            suppress_sampling_errors: false,
            mouse_over_frequency: None,
            draw_rect: None,
        }
    }
}

impl StageConfig {
    /// Sets [`StageConfig::auto_clear`].
    #[must_use]
    pub fn with_auto_clear(mut self, enabled: bool) -> Self {
        self.auto_clear = enabled;
        self
    }

    /// Sets [`StageConfig::tick_on_update`].
    #[must_use]
    pub fn with_tick_on_update(mut self, enabled: bool) -> Self {
        self.tick_on_update = enabled;
        self
    }

    /// Sets [`StageConfig::snap_to_pixel`].
    #[must_use]
    pub fn with_snap_to_pixel(mut self, enabled: bool) -> Self {
        self.snap_to_pixel = enabled;
        self
    }

    /// Sets [`StageConfig::mouse_move_outside`].
    #[must_use]
    pub fn with_mouse_move_outside(mut self, enabled: bool) -> Self {
        self.mouse_move_outside = enabled;
        self
    }

    /// Sets [`StageConfig::suppress_sampling_errors`].
    #[must_use]
    pub fn with_suppressed_sampling_errors(mut self, enabled: bool) -> Self {
        self.suppress_sampling_errors = enabled;
        self
    }

    /// Sets [`StageConfig::mouse_over_frequency`].
    #[must_use]
    pub fn with_mouse_over(mut self, frequency: Option<u32>) -> Self {
        self.mouse_over_frequency = frequency;
        self
    }

    /// Sets [`StageConfig::draw_rect`].
    #[must_use]
    pub fn with_draw_rect(mut self, rect: Option<Rect>) -> Self {
        self.draw_rect = rect;
        self
    }
}

/// Root of a display list bound to an output surface.
#[derive(Debug)]
pub struct Stage {
    scene: Scene,
    root: NodeId,
    surface: Option<Box<dyn Surface>>,
    size: (u32, u32),
    sampler: HitSampler,
    config: StageConfig,
    display_rect: Option<Rect>,
    pointers: PointerTable,
    mouse: Point,
    mouse_in_bounds: bool,
    hover: Option<HoverPoller>,
    /// Root-to-target chain under the mouse at the last hover test.
    hover_path: Vec<NodeId>,
    last_hover: Option<Point>,
    cursor: Option<String>,
    events: Vec<StageEvent>,
}

impl Stage {
    /// Creates a stage with a `width` × `height` surface from `factory` and
    /// the default configuration.
    pub fn new(factory: Box<dyn SurfaceFactory>, width: u32, height: u32) -> Self {
        Self::with_config(factory, width, height, StageConfig::default())
    }

    /// Creates a stage with an explicit configuration.
    pub fn with_config(
        factory: Box<dyn SurfaceFactory>,
        width: u32,
        height: u32,
        config: StageConfig,
    ) -> Self {
        let mut scene = Scene::new(factory);
        let root = scene.create_root();
        scene.set_snap_to_pixel_enabled(config.snap_to_pixel);
        let surface = scene.factory().create_surface(width, height);
        let sampler = HitSampler::from_factory(scene.factory())
            .with_suppressed_errors(config.suppress_sampling_errors);
        Self {
            scene,
            root,
            surface: Some(surface),
            size: (width, height),
            sampler,
            config,
            display_rect: None,
            pointers: PointerTable::default(),
            mouse: Point::ZERO,
            mouse_in_bounds: false,
            hover: config.mouse_over_frequency.and_then(HoverPoller::new),
            hover_path: Vec::new(),
            last_hover: None,
            cursor: None,
            events: Vec::new(),
        }
    }

    /// The scene graph.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to the scene graph.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The root container.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The active configuration.
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: StageConfig) {
        self.sampler.set_suppress_errors(config.suppress_sampling_errors);
        if config.mouse_over_frequency != self.config.mouse_over_frequency {
            self.hover = config.mouse_over_frequency.and_then(HoverPoller::new);
        }
        self.scene.set_snap_to_pixel_enabled(config.snap_to_pixel);
        self.config = config;
    }

    /// The output surface, unless detached.
    pub fn surface(&self) -> Option<&dyn Surface> {
        self.surface.as_deref()
    }

    /// Mutable access to the output surface.
    pub fn surface_mut(&mut self) -> Option<&mut (dyn Surface + 'static)> {
        self.surface.as_deref_mut()
    }

    /// Binds a new output surface and returns the previous one.
    pub fn attach_surface(&mut self, surface: Box<dyn Surface>) -> Option<Box<dyn Surface>> {
        log::debug!(
            "attaching {}x{} stage surface",
            surface.width(),
            surface.height()
        );
        self.size = (surface.width(), surface.height());
        self.surface.replace(surface)
    }

    /// Unbinds the output surface. Updates are no-ops until one is attached.
    pub fn detach_surface(&mut self) -> Option<Box<dyn Surface>> {
        if self.surface.is_some() {
            log::debug!("detaching stage surface");
        }
        self.surface.take()
    }

    /// Stage size in pixels. Kept from the last surface while detached.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Where the surface appears in page coordinates. `None` means the
    /// surface is displayed unscaled at the page origin.
    pub fn set_display_rect(&mut self, rect: Option<Rect>) {
        self.display_rect = rect;
    }

    /// Takes every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        core::mem::take(&mut self.events)
    }

    /// Events queued since the last drain.
    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    /// Cursor of the nearest hovered node that declares one.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Position of the primary pointer in stage coordinates.
    pub fn mouse_position(&self) -> Point {
        self.mouse
    }

    /// Whether the primary pointer is inside the stage.
    pub fn mouse_in_bounds(&self) -> bool {
        self.mouse_in_bounds
    }

    /// Tracked pointers.
    pub fn pointers(&self) -> &PointerTable {
        &self.pointers
    }

    /// The primary pointer, if any is tracked.
    pub fn primary_pointer(&self) -> Option<PointerId> {
        self.pointers.primary()
    }

    /// Topmost node at a stage-space point.
    pub fn object_under_point(
        &mut self,
        point: Point,
        mode: HitMode,
    ) -> Result<Option<NodeId>, HitTestError> {
        self.scene
            .object_under_point(self.root, point, mode, &mut self.sampler)
    }

    /// Every node at a stage-space point, topmost first.
    pub fn objects_under_point(
        &mut self,
        point: Point,
        mode: HitMode,
    ) -> Result<Vec<NodeId>, HitTestError> {
        self.scene
            .objects_under_point(self.root, point, mode, &mut self.sampler)
    }

    /// Enables hover tracking at `frequency` polls per second, capped at
    /// [`MAX_HOVER_FREQUENCY`](crate::pointer::MAX_HOVER_FREQUENCY). Zero
    /// disables it.
    pub fn enable_mouse_over(&mut self, frequency: u32) {
        self.hover = HoverPoller::new(frequency);
        self.config.mouse_over_frequency = (frequency > 0).then_some(frequency);
        match &self.hover {
            Some(poller) => log::debug!("hover polling every {:?}", poller.interval()),
            None => log::debug!("hover polling disabled"),
        }
    }

    /// Ticks the scene, queueing tick events for interested nodes.
    pub fn tick(&mut self, params: &TickParams) {
        if !self.scene.node(self.root).is_some_and(|n| n.tick_enabled) {
            return;
        }
        self.emit(EventKind::TickStart, self.root, None, None);
        let mut ticked = Vec::new();
        self.scene.tick(self.root, params, &mut ticked);
        for id in ticked {
            self.emit(EventKind::Tick, id, None, None);
        }
        self.emit(EventKind::TickEnd, self.root, None, None);
    }

    /// Ticks (if configured) and redraws the whole scene.
    ///
    /// Does nothing while no surface is attached.
    pub fn update(&mut self, params: &TickParams) {
        if self.surface.is_none() {
            return;
        }
        if self.config.tick_on_update {
            self.tick(params);
        }
        self.emit(EventKind::DrawStart, self.root, None, None);
        self.scene.set_snap_to_pixel_enabled(self.config.snap_to_pixel);

        let Some(surface) = self.surface.as_deref_mut() else {
            return;
        };
        surface.set_transform(Affine::IDENTITY);
        if self.config.auto_clear {
            surface.clear();
        }
        surface.save();
        if let Some(rect) = self.config.draw_rect {
            surface.clip(&rect.to_path(PATH_TOLERANCE));
        }
        self.scene.update_transform_context(self.root, surface);
        self.scene.draw(self.root, surface, false);
        surface.restore();

        self.emit(EventKind::DrawEnd, self.root, None, None);
    }

    /// Handles a pointer press at a page position.
    pub fn pointer_down(&mut self, id: PointerId, page: Point) -> Result<(), HitTestError> {
        self.update_pointer_position(id, page);
        let position = self.pointers.entry(id).position;
        let target = self.hit(position)?;

        let record = self.pointers.entry(id);
        record.target = target;
        record.press_origin = Some(position);
        let in_bounds = record.in_bounds;
        if in_bounds {
            record.down = true;
        }
        let info = self.pointer_info(id);
        if in_bounds {
            self.emit(EventKind::StageMouseDown, self.root, None, info);
        }
        if let Some(target) = target {
            self.emit(EventKind::MouseDown, target, None, info);
        }
        Ok(())
    }

    /// Handles pointer motion at a page position.
    pub fn pointer_move(&mut self, id: PointerId, page: Point) {
        let was_in = self.pointers.get(id).is_some_and(|r| r.in_bounds);
        self.update_pointer_position(id, page);
        let Some(record) = self.pointers.get(id).copied() else {
            return;
        };
        if !(was_in || record.in_bounds || self.config.mouse_move_outside) {
            return;
        }
        let info = self.pointer_info(id);
        if id == PointerId::MOUSE && was_in != record.in_bounds {
            let kind = if was_in {
                EventKind::MouseLeave
            } else {
                EventKind::MouseEnter
            };
            self.emit(kind, self.root, None, info);
        }
        self.emit(EventKind::StageMouseMove, self.root, None, info);
        if let Some(target) = record.target {
            self.emit(EventKind::PressMove, target, None, info);
        }
    }

    /// Handles a pointer release.
    ///
    /// With `clear` the pointer record is dropped, as for a lifted touch.
    pub fn pointer_up(&mut self, id: PointerId, clear: bool) -> Result<(), HitTestError> {
        let Some(record) = self.pointers.get(id).copied() else {
            return Ok(());
        };
        let over = match record.target {
            Some(_) => self.hit(record.position)?,
            None => None,
        };
        let info = self.pointer_info(id);
        if record.down {
            self.emit(EventKind::StageMouseUp, self.root, None, info);
            if let Some(record) = self.pointers.get_mut(id) {
                record.down = false;
            }
        }
        if let Some(target) = record.target {
            if over == Some(target) {
                self.emit(EventKind::Click, target, None, info);
            }
            self.emit(EventKind::PressUp, target, None, info);
        }
        self.pointers.release(id, clear);
        Ok(())
    }

    /// Handles a double click at the current mouse position.
    pub fn double_click(&mut self) -> Result<(), HitTestError> {
        if let Some(target) = self.hit(self.mouse)? {
            let info = self.mouse_info();
            self.emit(EventKind::DoubleClick, target, None, info);
        }
        Ok(())
    }

    /// Runs a hover test if hover tracking is enabled and a poll is due at
    /// `now` on the host clock. Returns whether a test ran.
    pub fn poll(&mut self, now: Duration) -> Result<bool, HitTestError> {
        let Some(poller) = &mut self.hover else {
            return Ok(false);
        };
        if !poller.due(now) {
            return Ok(false);
        }
        self.test_mouse_over(false)?;
        Ok(true)
    }

    /// Recomputes what the primary pointer hovers and queues the resulting
    /// over/out and roll events.
    ///
    /// Skipped while hover tracking is disabled, and when the pointer has
    /// not moved since the last test unless `clear` is set. With `clear` the
    /// scene is tested even if the pointer is outside the stage.
    pub fn test_mouse_over(&mut self, clear: bool) -> Result<(), HitTestError> {
        if self.hover.is_none() || self.pointers.is_empty() {
            return Ok(());
        }
        if !clear && self.last_hover == Some(self.mouse) && self.mouse_in_bounds {
            return Ok(());
        }

        let mut target = None;
        if clear || self.mouse_in_bounds {
            target = self.hit(self.mouse)?;
            self.last_hover = Some(self.mouse);
        }

        let old_path = core::mem::take(&mut self.hover_path);
        let old_target = old_path.last().copied();
        let mut path: Vec<NodeId> = match target {
            Some(t) => self.scene.ancestors(t).collect(),
            None => Vec::new(),
        };
        path.reverse();
        self.cursor = path
            .iter()
            .rev()
            .find_map(|&id| self.scene.node(id).and_then(|n| n.cursor.clone()));

        let common = path.iter().zip(&old_path).take_while(|(a, b)| a == b).count();
        let info = self.mouse_info();

        if old_target != target
            && let Some(old) = old_target
        {
            self.emit(EventKind::MouseOut, old, target, info);
        }
        for &left in old_path[common..].iter().rev() {
            self.emit(EventKind::RollOut, left, target, info);
        }
        for &entered in path[common..].iter().rev() {
            self.emit(EventKind::RollOver, entered, old_target, info);
        }
        if old_target != target
            && let Some(new) = target
        {
            self.emit(EventKind::MouseOver, new, old_target, info);
        }

        self.hover_path = path;
        Ok(())
    }

    fn hit(&mut self, point: Point) -> Result<Option<NodeId>, HitTestError> {
        self.scene.object_under_global_point(
            self.root,
            point,
            HitMode::Listeners,
            &mut self.sampler,
        )
    }

    /// Maps a page position to stage pixels and stores it on the record.
    fn update_pointer_position(&mut self, id: PointerId, page: Point) {
        let (w, h) = (f64::from(self.size.0), f64::from(self.size.1));
        let rect = self.display_rect.unwrap_or(Rect::new(0.0, 0.0, w, h));
        let sx = if rect.width() > 0.0 { w / rect.width() } else { 1.0 };
        let sy = if rect.height() > 0.0 { h / rect.height() } else { 1.0 };
        let p = Point::new((page.x - rect.x0) * sx, (page.y - rect.y0) * sy);
        let (max_x, max_y) = ((w - 1.0).max(0.0), (h - 1.0).max(0.0));
        let in_bounds = p.x >= 0.0 && p.y >= 0.0 && p.x <= max_x && p.y <= max_y;

        let mouse_move_outside = self.config.mouse_move_outside;
        let record = self.pointers.entry(id);
        if in_bounds {
            record.position = p;
        } else if mouse_move_outside {
            record.position = Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y));
        }
        record.raw = p;
        record.in_bounds = in_bounds;
        let position = record.position;

        if id == PointerId::MOUSE || self.pointers.is_primary(id) {
            self.mouse = position;
            self.mouse_in_bounds = in_bounds;
        }
    }

    fn pointer_info(&self, id: PointerId) -> Option<PointerInfo> {
        self.pointers.get(id).map(|record| PointerInfo {
            id,
            primary: self.pointers.is_primary(id),
            stage: record.position,
            raw: record.raw,
        })
    }

    /// Pointer details for hover and double click, which follow the mouse
    /// or, without one, the primary pointer.
    fn mouse_info(&self) -> Option<PointerInfo> {
        if self.pointers.get(PointerId::MOUSE).is_some() {
            return self.pointer_info(PointerId::MOUSE);
        }
        self.pointers.primary().and_then(|id| self.pointer_info(id))
    }

    /// Queues an event if the target (or, for bubbling kinds, one of its
    /// ancestors) is interested.
    fn emit(
        &mut self,
        kind: EventKind,
        target: NodeId,
        related_target: Option<NodeId>,
        pointer: Option<PointerInfo>,
    ) {
        let interest = kind.interest();
        let wanted = if kind.bubbles() {
            self.scene.chain_has_interest(target, interest)
        } else {
            self.scene
                .node(target)
                .is_some_and(|n| n.interest().contains(interest))
        };
        if wanted {
            self.events.push(StageEvent {
                kind,
                target,
                related_target,
                pointer,
            });
        }
    }
}
