// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display nodes and the [`Scene`] arena that owns them.
//!
//! Every node lives in a [`Scene`] and is addressed by a [`NodeId`]. A node is
//! one of four kinds ([`NodeKind`]): a container with an ordered child list, a
//! vector [`Graphics`] shape, a [`Bitmap`], or custom [`Content`].
//!
//! The arena also implements the per-node half of the display contract:
//! visibility, the draw template with its cache fast path, surface transform
//! setup, coordinate conversion and local alpha hit testing. Child management
//! lives in [`crate::container`], bitmap caching in [`crate::cache`].

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Point, Rect};
use peniko::BlendMode;

use crate::cache::Cache;
use crate::event::TickParams;
use crate::filter::Filter;
use crate::graphics::Graphics;
use crate::hit::{HitSampler, HitTestError};
use crate::matrix::{Matrix2D, Shadow, TransformParts};
use crate::surface::{Effects, Image, Surface, SurfaceFactory};

/// Identifier for a node in a [`Scene`].
///
/// A small, copyable handle made of a slot index and a generation counter.
/// Freeing a node bumps the generation of its slot, so a stale `NodeId` never
/// aliases a node created later. Use [`Scene::is_alive`] to check liveness.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Event kinds a node wants delivered.
    ///
    /// Nodes with no pointer interest are skipped by listener-filtered hit
    /// tests, and events are only queued for nodes that asked for them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Interest: u32 {
        /// Pointer pressed on the node.
        const MOUSE_DOWN       = 1 << 0;
        /// Press and release on the same node.
        const CLICK            = 1 << 1;
        /// Double click on the node.
        const DOUBLE_CLICK     = 1 << 2;
        /// Pointer moved while captured by the node.
        const PRESS_MOVE       = 1 << 3;
        /// Pointer released after being captured by the node.
        const PRESS_UP         = 1 << 4;
        /// Pointer entered the node (bubbles).
        const MOUSE_OVER       = 1 << 5;
        /// Pointer left the node (bubbles).
        const MOUSE_OUT        = 1 << 6;
        /// Pointer entered the node or one of its descendants.
        const ROLL_OVER        = 1 << 7;
        /// Pointer left the node and all of its descendants.
        const ROLL_OUT         = 1 << 8;
        /// Any pointer pressed on the stage.
        const STAGE_MOUSE_DOWN = 1 << 9;
        /// Any pointer moved over the stage.
        const STAGE_MOUSE_MOVE = 1 << 10;
        /// Any pointer released on the stage.
        const STAGE_MOUSE_UP   = 1 << 11;
        /// The mouse entered the stage surface.
        const MOUSE_ENTER      = 1 << 12;
        /// The mouse left the stage surface.
        const MOUSE_LEAVE      = 1 << 13;
        /// Per-node tick.
        const TICK             = 1 << 14;
        /// Start of a stage tick.
        const TICK_START       = 1 << 15;
        /// End of a stage tick.
        const TICK_END         = 1 << 16;
        /// Start of a stage draw.
        const DRAW_START       = 1 << 17;
        /// End of a stage draw.
        const DRAW_END         = 1 << 18;

        /// Everything delivered to a hit node.
        const POINTER = Self::MOUSE_DOWN.bits()
            | Self::CLICK.bits()
            | Self::DOUBLE_CLICK.bits()
            | Self::PRESS_MOVE.bits()
            | Self::PRESS_UP.bits()
            | Self::MOUSE_OVER.bits()
            | Self::MOUSE_OUT.bits()
            | Self::ROLL_OVER.bits()
            | Self::ROLL_OUT.bits();
    }
}

/// Renderable content supplied by the host.
pub trait Content: fmt::Debug {
    /// Whether drawing would produce anything.
    fn has_content(&self) -> bool;

    /// Draws in the node's local space.
    fn draw(&self, surface: &mut dyn Surface);

    /// Local bounds, if known.
    fn bounds(&self) -> Option<Rect> {
        None
    }

    /// Advances time-based state. Called once per stage tick.
    fn tick(&mut self, _params: &TickParams) {}
}

/// An image, optionally restricted to a source rectangle.
#[derive(Clone, Debug, Default)]
pub struct Bitmap {
    image: Option<Image>,
    source_rect: Option<Rect>,
}

impl Bitmap {
    /// A bitmap showing all of `image`.
    pub fn new(image: Image) -> Self {
        Self {
            image: Some(image),
            source_rect: None,
        }
    }

    /// Restricts drawing to `rect`, in image pixels.
    #[must_use]
    pub fn with_source_rect(mut self, rect: Rect) -> Self {
        self.source_rect = Some(rect);
        self
    }

    /// The image, if loaded.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Replaces the image.
    pub fn set_image(&mut self, image: Option<Image>) {
        self.image = image;
    }

    /// The source rectangle, if any.
    pub fn source_rect(&self) -> Option<Rect> {
        self.source_rect
    }

    /// Sets or clears the source rectangle.
    pub fn set_source_rect(&mut self, rect: Option<Rect>) {
        self.source_rect = rect;
    }

    /// The image region that will be drawn and where it lands locally.
    fn placement(&self) -> Option<(&Image, Rect, Rect)> {
        let image = self.image.as_ref()?;
        let full = image.bounds();
        let Some(rect) = self.source_rect else {
            return Some((image, full, full));
        };
        let src = rect.intersect(full);
        if src.width() <= 0.0 || src.height() <= 0.0 {
            return None;
        }
        let dst = src - rect.origin().to_vec2();
        Some((image, src, dst))
    }

    /// Draws the image at the local origin.
    pub fn draw(&self, surface: &mut dyn Surface) {
        if let Some((image, src, dst)) = self.placement() {
            surface.draw_image(image, Some(src), dst);
        }
    }

    /// Local bounds of what [`Bitmap::draw`] paints.
    pub fn bounds(&self) -> Option<Rect> {
        let image = self.image.as_ref()?;
        Some(match self.source_rect {
            Some(rect) => Rect::from_origin_size(Point::ZERO, rect.size()),
            None => image.bounds(),
        })
    }
}

/// Child list and container-only flags.
#[derive(Clone, Debug)]
pub struct ContainerState {
    pub(crate) children: Vec<NodeId>,
    pub(crate) mouse_children: bool,
    pub(crate) tick_children: bool,
}

impl Default for ContainerState {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            mouse_children: true,
            tick_children: true,
        }
    }
}

impl ContainerState {
    /// Children in paint order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether hits on descendants are reported as such.
    pub fn mouse_children(&self) -> bool {
        self.mouse_children
    }

    /// Whether children are ticked.
    pub fn tick_children(&self) -> bool {
        self.tick_children
    }
}

/// What a node draws.
#[derive(Debug)]
pub enum NodeKind {
    /// Ordered list of child nodes.
    Container(ContainerState),
    /// Vector shape.
    Shape(Graphics),
    /// Image.
    Bitmap(Bitmap),
    /// Host-supplied content.
    Custom(Box<dyn Content>),
}

/// A display node.
///
/// Transform and appearance live in public fields. Structure (parent,
/// children, mask, hit area) and the bitmap cache are managed through
/// [`Scene`] so that the tree stays consistent.
#[derive(Debug)]
pub struct Node {
    uid: u64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) root: bool,
    pub(crate) kind: NodeKind,
    pub(crate) mask: Option<NodeId>,
    pub(crate) hit_area: Option<NodeId>,
    pub(crate) cache: Option<Cache>,
    pub(crate) cache_id: u64,
    pub(crate) filters: Vec<Box<dyn Filter>>,
    interest: Interest,
    bounds_override: Option<Rect>,

    /// Horizontal position in the parent.
    pub x: f64,
    /// Vertical position in the parent.
    pub y: f64,
    /// Horizontal scale.
    pub scale_x: f64,
    /// Vertical scale.
    pub scale_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Horizontal skew in degrees.
    pub skew_x: f64,
    /// Vertical skew in degrees.
    pub skew_y: f64,
    /// Registration point x.
    pub reg_x: f64,
    /// Registration point y.
    pub reg_y: f64,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
    /// Whether the node is drawn and hit tested.
    pub visible: bool,
    /// Whether pointer hit tests may report this node.
    pub mouse_enabled: bool,
    /// Blend mode used when compositing.
    pub blend_mode: Option<BlendMode>,
    /// Drop shadow.
    pub shadow: Option<Shadow>,
    /// Round the translation to whole pixels when the stage enables snapping.
    pub snap_to_pixel: bool,
    /// Whether the node takes part in stage ticks.
    pub tick_enabled: bool,
    /// Optional name for lookups.
    pub name: Option<String>,
    /// Cursor requested while the pointer is over this node.
    pub cursor: Option<String>,
}

impl Node {
    fn new(uid: u64, kind: NodeKind) -> Self {
        Self {
            uid,
            parent: None,
            root: false,
            kind,
            mask: None,
            hit_area: None,
            cache: None,
            cache_id: 0,
            filters: Vec::new(),
            interest: Interest::empty(),
            bounds_override: None,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            reg_x: 0.0,
            reg_y: 0.0,
            opacity: 1.0,
            visible: true,
            mouse_enabled: true,
            blend_mode: None,
            shadow: None,
            snap_to_pixel: true,
            tick_enabled: true,
            name: None,
            cursor: None,
        }
    }

    /// Unique identity, never reused within a scene.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The containing node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether this node anchors the global coordinate frame.
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// What the node draws.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this node can have children.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    /// Child ids in paint order. Empty for non-containers.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Container(c) => &c.children,
            _ => &[],
        }
    }

    /// The vector graphics of a shape node.
    pub fn graphics(&self) -> Option<&Graphics> {
        match &self.kind {
            NodeKind::Shape(g) => Some(g),
            _ => None,
        }
    }

    /// Mutable vector graphics of a shape node.
    pub fn graphics_mut(&mut self) -> Option<&mut Graphics> {
        match &mut self.kind {
            NodeKind::Shape(g) => Some(g),
            _ => None,
        }
    }

    /// Mutable bitmap of a bitmap node.
    pub fn bitmap_mut(&mut self) -> Option<&mut Bitmap> {
        match &mut self.kind {
            NodeKind::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    /// Mutable custom content.
    pub fn content_mut(&mut self) -> Option<&mut dyn Content> {
        match &mut self.kind {
            NodeKind::Custom(c) => Some(c.as_mut()),
            _ => None,
        }
    }

    /// Whether hits on descendants are reported as such. Always true for
    /// non-containers.
    pub fn mouse_children(&self) -> bool {
        match &self.kind {
            NodeKind::Container(c) => c.mouse_children,
            _ => true,
        }
    }

    /// When false, hits anywhere in this container report the container.
    pub fn set_mouse_children(&mut self, enabled: bool) {
        if let NodeKind::Container(c) = &mut self.kind {
            c.mouse_children = enabled;
        }
    }

    /// Whether children are ticked.
    pub fn tick_children(&self) -> bool {
        match &self.kind {
            NodeKind::Container(c) => c.tick_children,
            _ => false,
        }
    }

    /// Enables or disables ticking of this container's children.
    pub fn set_tick_children(&mut self, enabled: bool) {
        if let NodeKind::Container(c) = &mut self.kind {
            c.tick_children = enabled;
        }
    }

    /// Mask shape, if any.
    pub fn mask(&self) -> Option<NodeId> {
        self.mask
    }

    /// Hit area stand-in, if any.
    pub fn hit_area(&self) -> Option<NodeId> {
        self.hit_area
    }

    /// Registered event interest.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Replaces the registered event interest.
    pub fn set_interest(&mut self, interest: Interest) {
        self.interest = interest;
    }

    /// Adds to the registered event interest.
    pub fn add_interest(&mut self, interest: Interest) {
        self.interest |= interest;
    }

    /// Removes from the registered event interest.
    pub fn remove_interest(&mut self, interest: Interest) {
        self.interest.remove(interest);
    }

    /// Filters applied when the cache is redrawn.
    pub fn filters(&self) -> &[Box<dyn Filter>] {
        &self.filters
    }

    /// Appends a cache filter. Takes effect on the next cache update.
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Removes all cache filters.
    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    /// Overrides the computed local bounds.
    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds_override = bounds;
    }

    /// The local transform components.
    pub fn transform_parts(&self) -> TransformParts {
        TransformParts {
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            rotation: self.rotation,
            skew_x: self.skew_x,
            skew_y: self.skew_y,
            reg_x: self.reg_x,
            reg_y: self.reg_y,
        }
    }

    /// Sets all transform components at once.
    pub fn set_transform(&mut self, parts: TransformParts) {
        self.x = parts.x;
        self.y = parts.y;
        self.scale_x = parts.scale_x;
        self.scale_y = parts.scale_y;
        self.rotation = parts.rotation;
        self.skew_x = parts.skew_x;
        self.skew_y = parts.skew_y;
        self.reg_x = parts.reg_x;
        self.reg_y = parts.reg_y;
    }

    /// The local matrix with this node's own display properties.
    pub fn matrix(&self) -> Matrix2D {
        let mut m = Matrix2D::IDENTITY;
        m.append_transform(&self.transform_parts()).append_properties(
            self.opacity,
            self.shadow,
            self.blend_mode,
            self.visible,
        );
        m
    }

    /// Applies every field set in `patch`.
    pub fn apply(&mut self, patch: &DisplayPatch) {
        macro_rules! copy_fields {
            ($($field:ident),*) => {
                $(if let Some(v) = patch.$field { self.$field = v; })*
            };
        }
        copy_fields!(
            x,
            y,
            scale_x,
            scale_y,
            rotation,
            skew_x,
            skew_y,
            reg_x,
            reg_y,
            opacity,
            visible,
            mouse_enabled,
            blend_mode,
            shadow,
            snap_to_pixel,
            tick_enabled
        );
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(cursor) = &patch.cursor {
            self.cursor.clone_from(cursor);
        }
    }

    /// Whether drawing would produce anything, ignoring display properties.
    pub fn has_content(&self) -> bool {
        if self.cache.as_ref().is_some_and(Cache::is_populated) {
            return true;
        }
        match &self.kind {
            NodeKind::Container(c) => !c.children.is_empty(),
            NodeKind::Shape(g) => !g.is_empty(),
            NodeKind::Bitmap(b) => b.image.is_some(),
            NodeKind::Custom(c) => c.has_content(),
        }
    }
}

/// Bulk property assignment.
///
/// Every `Some` field is written by [`Node::apply`] / [`Scene::apply`];
/// `None` leaves the node's value alone. Optional node properties take an
/// `Option<Option<_>>` so they can also be cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayPatch {
    /// New x.
    pub x: Option<f64>,
    /// New y.
    pub y: Option<f64>,
    /// New horizontal scale.
    pub scale_x: Option<f64>,
    /// New vertical scale.
    pub scale_y: Option<f64>,
    /// New rotation in degrees.
    pub rotation: Option<f64>,
    /// New horizontal skew in degrees.
    pub skew_x: Option<f64>,
    /// New vertical skew in degrees.
    pub skew_y: Option<f64>,
    /// New registration x.
    pub reg_x: Option<f64>,
    /// New registration y.
    pub reg_y: Option<f64>,
    /// New opacity.
    pub opacity: Option<f64>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New pointer eligibility.
    pub mouse_enabled: Option<bool>,
    /// New blend mode.
    pub blend_mode: Option<Option<BlendMode>>,
    /// New shadow.
    pub shadow: Option<Option<Shadow>>,
    /// New pixel snapping flag.
    pub snap_to_pixel: Option<bool>,
    /// New tick flag.
    pub tick_enabled: Option<bool>,
    /// New name.
    pub name: Option<Option<String>>,
    /// New cursor.
    pub cursor: Option<Option<String>>,
}

impl DisplayPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position.
    #[must_use]
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    /// Sets both scale factors.
    #[must_use]
    pub fn scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = Some(scale_x);
        self.scale_y = Some(scale_y);
        self
    }

    /// Sets the rotation in degrees.
    #[must_use]
    pub fn rotation(mut self, degrees: f64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Sets the registration point.
    #[must_use]
    pub fn registration(mut self, reg_x: f64, reg_y: f64) -> Self {
        self.reg_x = Some(reg_x);
        self.reg_y = Some(reg_y);
        self
    }

    /// Sets the opacity.
    #[must_use]
    pub fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    /// Sets visibility.
    #[must_use]
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Sets pointer eligibility.
    #[must_use]
    pub fn mouse_enabled(mut self, enabled: bool) -> Self {
        self.mouse_enabled = Some(enabled);
        self
    }

    /// Sets or clears the blend mode.
    #[must_use]
    pub fn blend_mode(mut self, mode: Option<BlendMode>) -> Self {
        self.blend_mode = Some(mode);
        self
    }

    /// Sets or clears the shadow.
    #[must_use]
    pub fn shadow(mut self, shadow: Option<Shadow>) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// Sets or clears the name.
    #[must_use]
    pub fn name(mut self, name: Option<&str>) -> Self {
        self.name = Some(name.map(String::from));
        self
    }

    /// Sets or clears the cursor.
    #[must_use]
    pub fn cursor(mut self, cursor: Option<&str>) -> Self {
        self.cursor = Some(cursor.map(String::from));
        self
    }
}

/// Error returned by [`Scene::set_mask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskError {
    /// The proposed mask is not a shape node.
    NotMaskable(NodeId),
    /// One of the ids does not refer to a live node.
    StaleNode(NodeId),
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMaskable(id) => write!(f, "node {id:?} is not a shape and cannot mask"),
            Self::StaleNode(id) => write!(f, "node {id:?} is not alive"),
        }
    }
}

impl core::error::Error for MaskError {}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena owning every node of a display list.
///
/// Besides storage, the scene holds the [`SurfaceFactory`] used to allocate
/// cache surfaces and the global pixel-snapping switch.
#[derive(Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    next_uid: u64,
    factory: Box<dyn SurfaceFactory>,
    snap_to_pixel: bool,
}

impl Scene {
    /// Creates an empty scene whose caches are allocated by `factory`.
    pub fn new(factory: Box<dyn SurfaceFactory>) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            next_uid: 1,
            factory,
            snap_to_pixel: false,
        }
    }

    /// The factory used for cache surfaces.
    pub fn factory(&self) -> &dyn SurfaceFactory {
        self.factory.as_ref()
    }

    /// Whether translations of snapping nodes are rounded while drawing.
    pub fn snap_to_pixel_enabled(&self) -> bool {
        self.snap_to_pixel
    }

    /// Enables or disables pixel snapping for nodes that opt in.
    pub fn set_snap_to_pixel_enabled(&mut self, enabled: bool) {
        self.snap_to_pixel = enabled;
    }

    /// Inserts a detached node and returns its id.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(self.next_uid, kind);
        self.next_uid += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId::new(idx, slot.generation)
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 1,
                node: Some(node),
            });
            NodeId::new(idx, 1)
        }
    }

    /// Inserts an empty container.
    pub fn create_container(&mut self) -> NodeId {
        self.insert(NodeKind::Container(ContainerState::default()))
    }

    /// Inserts an empty container that anchors the global frame.
    pub fn create_root(&mut self) -> NodeId {
        let id = self.create_container();
        if let Some(node) = self.node_mut(id) {
            node.root = true;
        }
        id
    }

    /// Inserts a shape.
    pub fn create_shape(&mut self, graphics: Graphics) -> NodeId {
        self.insert(NodeKind::Shape(graphics))
    }

    /// Inserts a bitmap.
    pub fn create_bitmap(&mut self, bitmap: Bitmap) -> NodeId {
        self.insert(NodeKind::Bitmap(bitmap))
    }

    /// Inserts custom content.
    pub fn create_custom(&mut self, content: Box<dyn Content>) -> NodeId {
        self.insert(NodeKind::Custom(content))
    }

    /// Detaches `id` and frees it together with its whole subtree.
    ///
    /// Returns false if `id` is stale.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.detach(id);
        let mut stack = alloc::vec![id];
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.idx()];
            if let Some(node) = slot.node.take() {
                stack.extend_from_slice(node.children());
                self.free_list.push(next.0);
            }
        }
        true
    }

    /// Whether `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Whether the scene holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.node.as_ref()
    }

    /// Mutably borrows a node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.node.as_mut()
    }

    /// Applies `patch` to `id`. Returns false if `id` is stale.
    pub fn apply(&mut self, id: NodeId, patch: &DisplayPatch) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.apply(patch);
                true
            }
            None => false,
        }
    }

    /// The parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Iterates from `id` up through its ancestors.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.is_alive(id).then_some(id);
        core::iter::successors(start, |&cur| self.parent(cur))
    }

    /// Whether the parent chain of `id` reaches a root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.ancestors(id)
            .any(|a| self.node(a).is_some_and(|n| n.root))
    }

    /// Uses the geometry of shape `mask` to clip `id`, or clears the mask.
    ///
    /// The mask is positioned in the parent's coordinate space of `id` and
    /// does not need to be in the display list.
    pub fn set_mask(&mut self, id: NodeId, mask: Option<NodeId>) -> Result<(), MaskError> {
        if !self.is_alive(id) {
            return Err(MaskError::StaleNode(id));
        }
        if let Some(m) = mask {
            let node = self.node(m).ok_or(MaskError::StaleNode(m))?;
            if m == id || !matches!(node.kind, NodeKind::Shape(_)) {
                log::warn!("rejected {m:?} as mask for {id:?}: only shapes can mask");
                return Err(MaskError::NotMaskable(m));
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.mask = mask;
        }
        Ok(())
    }

    /// Uses `hit_area` in place of `id`'s own content for pointer hit tests.
    ///
    /// The hit area is positioned in `id`'s local space. Returns false if
    /// either id is stale.
    pub fn set_hit_area(&mut self, id: NodeId, hit_area: Option<NodeId>) -> bool {
        if hit_area.is_some_and(|h| !self.is_alive(h)) {
            return false;
        }
        match self.node_mut(id) {
            Some(node) => {
                node.hit_area = hit_area;
                true
            }
            None => false,
        }
    }

    /// Whether `id` or one of its ancestors has any of `interest`.
    pub fn chain_has_interest(&self, id: NodeId, interest: Interest) -> bool {
        self.ancestors(id)
            .any(|a| self.node(a).is_some_and(|n| n.interest.intersects(interest)))
    }

    /// Whether `id` or one of its descendants has any of `interest`.
    pub fn subtree_has_interest(&self, id: NodeId, interest: Interest) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.interest.intersects(interest)
            || node
                .children()
                .iter()
                .any(|&c| self.subtree_has_interest(c, interest))
    }

    /// Whether drawing `id` could produce visible output.
    ///
    /// Requires the node to be visible, non-transparent, non-degenerate in
    /// scale and to have content.
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| {
            n.visible && n.opacity > 0.0 && n.scale_x != 0.0 && n.scale_y != 0.0 && n.has_content()
        })
    }

    /// Draws `id` in its local space.
    ///
    /// A populated cache is blitted instead of redrawing the content unless
    /// `ignore_cache` is set. Visibility, transform and effects of `id`
    /// itself are the caller's job (see [`Scene::update_transform_context`]).
    /// Returns false only for a stale id.
    pub fn draw(&self, id: NodeId, surface: &mut dyn Surface, ignore_cache: bool) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !ignore_cache && node.draw_cache(surface) {
            return true;
        }
        match &node.kind {
            NodeKind::Container(c) => self.draw_children(c, surface),
            NodeKind::Shape(g) => g.draw(surface),
            NodeKind::Bitmap(b) => b.draw(surface),
            NodeKind::Custom(c) => c.draw(surface),
        }
        true
    }

    /// Applies `id`'s mask clip, local transform and effects to `surface`.
    ///
    /// Call between [`Surface::save`] and [`Scene::draw`].
    pub fn update_transform_context(&self, id: NodeId, surface: &mut dyn Surface) {
        let Some(node) = self.node(id) else {
            return;
        };

        if let Some(mask) = node.mask.and_then(|m| self.node(m))
            && let NodeKind::Shape(graphics) = &mask.kind
            && !graphics.is_empty()
        {
            let saved = surface.transform();
            surface.concat_transform(mask.matrix().to_affine());
            graphics.draw_as_path(surface);
            surface.set_transform(saved);
        }

        let m = node.matrix();
        let (mut tx, mut ty) = (m.tx, m.ty);
        if self.snap_to_pixel && node.snap_to_pixel {
            tx = tx.round();
            ty = ty.round();
        }
        surface.concat_transform(Affine::new([m.a, m.b, m.c, m.d, tx, ty]));

        #[expect(
            clippy::cast_possible_truncation,
            reason = "opacity is a unit fraction"
        )]
        let effects = Effects {
            opacity: node.opacity as f32,
            blend: node.blend_mode,
            shadow: node.shadow,
        };
        if !effects.is_noop() {
            surface.push_effects(&effects);
        }
    }

    /// The world matrix of `id` together with its effective display
    /// properties.
    ///
    /// Composes local matrices from `id` up to the top of its parent chain.
    /// Opacity multiplies, visibility is and-ed, and the shadow and blend
    /// mode of the nearest node that sets one win.
    pub fn concatenated_matrix(&self, id: NodeId) -> Option<Matrix2D> {
        self.node(id)?;
        let mut m = Matrix2D::IDENTITY;
        for a in self.ancestors(id) {
            let node = self.node(a)?;
            m.prepend_transform(&node.transform_parts()).prepend_properties(
                node.opacity,
                node.shadow,
                node.blend_mode,
                node.visible,
            );
        }
        Some(m)
    }

    /// Maps a point in `id`'s local space to global space.
    ///
    /// Returns `None` if `id` is not attached to a root.
    pub fn local_to_global(&self, id: NodeId, point: Point) -> Option<Point> {
        if !self.is_attached(id) {
            return None;
        }
        Some(self.concatenated_matrix(id)?.transform_point(point))
    }

    /// Maps a global point into `id`'s local space.
    ///
    /// Returns `None` if `id` is not attached or its world matrix is singular.
    pub fn global_to_local(&self, id: NodeId, point: Point) -> Option<Point> {
        if !self.is_attached(id) {
            return None;
        }
        let mut m = self.concatenated_matrix(id)?;
        if m.determinant() == 0.0 {
            return None;
        }
        m.invert();
        Some(m.transform_point(point))
    }

    /// Maps a point in `id`'s local space into `target`'s local space.
    pub fn local_to_local(&self, id: NodeId, point: Point, target: NodeId) -> Option<Point> {
        let global = self.local_to_global(id, point)?;
        self.global_to_local(target, global)
    }

    /// Local bounds of `id`.
    ///
    /// An explicit override wins, then the cache rectangle, then the content:
    /// graphics extents, bitmap size, or the union of the children's
    /// transformed bounds.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        let node = self.node(id)?;
        if let Some(bounds) = node.bounds_override {
            return Some(bounds);
        }
        if let Some(rect) = node.cache.as_ref().map(Cache::local_rect) {
            return Some(rect);
        }
        match &node.kind {
            NodeKind::Container(c) => c
                .children
                .iter()
                .filter(|&&child| self.node(child).is_some_and(|n| n.visible))
                .filter_map(|&child| self.transformed_bounds(child))
                .reduce(|a, b| a.union(b)),
            NodeKind::Shape(g) => g.bounds(),
            NodeKind::Bitmap(b) => b.bounds(),
            NodeKind::Custom(c) => c.bounds(),
        }
    }

    /// Bounds of `id` in its parent's space.
    pub fn transformed_bounds(&self, id: NodeId) -> Option<Rect> {
        let bounds = self.bounds(id)?;
        let m = self.node(id)?.matrix();
        Some(m.to_affine().transform_rect_bbox(bounds))
    }

    /// Tests whether `id` paints a non-transparent pixel at `point`, given in
    /// `id`'s local space.
    ///
    /// The node is drawn with its content and cache but without its own
    /// transform, opacity, shadow or blend mode.
    pub fn hit_test(
        &self,
        id: NodeId,
        point: Point,
        sampler: &mut HitSampler,
    ) -> Result<bool, HitTestError> {
        let surface = sampler.begin(Affine::translate((-point.x, -point.y)));
        self.draw(id, surface, false);
        sampler.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RecordingFactory;
    use peniko::Color;

    fn scene() -> Scene {
        Scene::new(Box::new(RecordingFactory))
    }

    fn circle(scene: &mut Scene, radius: f64) -> NodeId {
        let mut g = Graphics::new();
        g.fill_circle(0.0, 0.0, radius, Color::BLACK);
        scene.create_shape(g)
    }

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut s = scene();
        let a = s.create_container();
        assert!(s.destroy(a));
        let b = s.create_container();
        assert_eq!(a.0, b.0);
        assert!(!s.is_alive(a));
        assert!(s.is_alive(b));
        assert_ne!(s.node(b).map(Node::uid), Some(1));
        assert!(!s.destroy(a));
    }

    #[test]
    fn destroy_frees_subtree() {
        let mut s = scene();
        let root = s.create_root();
        let group = s.create_container();
        let leaf = circle(&mut s, 5.0);
        assert!(s.add_child(root, group));
        assert!(s.add_child(group, leaf));
        assert_eq!(s.len(), 3);
        assert!(s.destroy(group));
        assert_eq!(s.len(), 1);
        assert!(!s.is_alive(leaf));
        assert!(s.children(root).is_empty());
    }

    #[test]
    fn visibility_requires_content_and_nonzero_scale() {
        let mut s = scene();
        let empty = s.create_shape(Graphics::new());
        assert!(!s.is_visible(empty));

        let dot = circle(&mut s, 1.0);
        assert!(s.is_visible(dot));
        s.apply(dot, &DisplayPatch::new().scale(0.0, 1.0));
        assert!(!s.is_visible(dot));
        s.apply(dot, &DisplayPatch::new().scale(1.0, 1.0).opacity(0.0));
        assert!(!s.is_visible(dot));
        s.apply(dot, &DisplayPatch::new().opacity(1.0).visible(false));
        assert!(!s.is_visible(dot));

        let group = s.create_container();
        assert!(!s.is_visible(group));
    }

    #[test]
    fn concatenated_matrix_is_product_of_locals() {
        let mut s = scene();
        let root = s.create_root();
        let parent = s.create_container();
        let child = circle(&mut s, 1.0);
        s.add_child(root, parent);
        s.add_child(parent, child);
        s.apply(
            parent,
            &DisplayPatch::new().position(10.0, 20.0).rotation(30.0).opacity(0.5),
        );
        s.apply(
            child,
            &DisplayPatch::new()
                .position(3.0, -4.0)
                .scale(2.0, 0.5)
                .registration(1.0, 1.0)
                .opacity(0.5),
        );

        let expected = s.node(root).unwrap().matrix().to_affine()
            * s.node(parent).unwrap().matrix().to_affine()
            * s.node(child).unwrap().matrix().to_affine();
        let m = s.concatenated_matrix(child).unwrap();
        for (got, want) in m.to_affine().as_coeffs().iter().zip(expected.as_coeffs()) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert!((m.opacity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn global_local_round_trip() {
        let mut s = scene();
        let root = s.create_root();
        let child = circle(&mut s, 1.0);
        s.add_child(root, child);
        s.apply(
            child,
            &DisplayPatch::new()
                .position(50.0, 25.0)
                .rotation(45.0)
                .scale(2.0, 3.0),
        );
        let p = Point::new(7.0, -2.0);
        let global = s.local_to_global(child, p).unwrap();
        let back = s.global_to_local(child, global).unwrap();
        assert!((back - p).hypot() < 1e-9);
        assert_eq!(s.local_to_local(child, p, child).map(|q| (q - p).hypot() < 1e-9), Some(true));
    }

    #[test]
    fn unattached_nodes_have_no_global_position() {
        let mut s = scene();
        let loose = circle(&mut s, 1.0);
        assert_eq!(s.local_to_global(loose, Point::ZERO), None);
        assert!(s.concatenated_matrix(loose).is_some());
    }

    #[test]
    fn singular_matrix_has_no_local_position() {
        let mut s = scene();
        let root = s.create_root();
        let flat = circle(&mut s, 1.0);
        s.add_child(root, flat);
        s.apply(flat, &DisplayPatch::new().scale(0.0, 1.0));
        assert_eq!(s.global_to_local(flat, Point::ZERO), None);
    }

    #[test]
    fn only_shapes_can_mask() {
        let mut s = scene();
        let target = circle(&mut s, 5.0);
        let group = s.create_container();
        let shape = circle(&mut s, 2.0);
        assert_eq!(
            s.set_mask(target, Some(group)),
            Err(MaskError::NotMaskable(group))
        );
        assert_eq!(s.set_mask(target, Some(shape)), Ok(()));
        assert_eq!(s.node(target).unwrap().mask(), Some(shape));
        assert_eq!(s.set_mask(target, None), Ok(()));
    }

    #[test]
    fn patch_sets_and_clears_optional_fields() {
        let mut s = scene();
        let n = s.create_container();
        s.apply(n, &DisplayPatch::new().name(Some("menu")).cursor(Some("pointer")));
        assert_eq!(s.node(n).unwrap().name.as_deref(), Some("menu"));
        s.apply(n, &DisplayPatch::new().cursor(None));
        let node = s.node(n).unwrap();
        assert_eq!(node.cursor, None);
        assert_eq!(node.name.as_deref(), Some("menu"));
    }

    #[test]
    fn bitmap_source_rect_controls_bounds_and_blit() {
        let image = Image::solid(10, 10, crate::surface::Rgba::new(0, 0, 0, 255));
        let bitmap = Bitmap::new(image).with_source_rect(Rect::new(2.0, 2.0, 6.0, 12.0));
        assert_eq!(bitmap.bounds(), Some(Rect::new(0.0, 0.0, 4.0, 10.0)));
        let (_, src, dst) = bitmap.placement().unwrap();
        assert_eq!(src, Rect::new(2.0, 2.0, 6.0, 10.0));
        assert_eq!(dst, Rect::new(0.0, 0.0, 4.0, 8.0));
    }

    #[test]
    fn container_bounds_union_children() {
        let mut s = scene();
        let group = s.create_container();
        let a = circle(&mut s, 5.0);
        let b = circle(&mut s, 5.0);
        s.add_child(group, a);
        s.add_child(group, b);
        s.apply(b, &DisplayPatch::new().position(20.0, 0.0));
        let bounds = s.bounds(group).unwrap();
        assert!((bounds.x0 + 5.0).abs() < 0.1);
        assert!((bounds.x1 - 25.0).abs() < 0.1);
        s.node_mut(group).unwrap().set_bounds(Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(s.bounds(group), Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn snapping_rounds_translation_when_enabled() {
        use crate::reference::RecordingSurface;
        let mut s = scene();
        let dot = circle(&mut s, 1.0);
        s.apply(dot, &DisplayPatch::new().position(10.4, 3.6));
        let mut surface = RecordingSurface::new(20, 20);
        s.update_transform_context(dot, &mut surface);
        assert_eq!(surface.transform(), Affine::translate((10.4, 3.6)));

        s.set_snap_to_pixel_enabled(true);
        let mut surface = RecordingSurface::new(20, 20);
        s.update_transform_context(dot, &mut surface);
        assert_eq!(surface.transform(), Affine::translate((10.0, 4.0)));
    }
}
