// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container operations: child management, recursive draw and tick, and
//! depth-ordered hit testing.
//!
//! Child lists are in paint order: index 0 is drawn first and therefore sits
//! at the bottom. Hit tests walk the same lists in reverse so the topmost
//! node answers first.

use alloc::vec::Vec;
use core::cmp::Ordering;

use kurbo::{Affine, Point};
use smallvec::SmallVec;

use crate::event::TickParams;
use crate::hit::{HitMode, HitSampler, HitTestError};
use crate::matrix::Matrix2D;
use crate::node::{ContainerState, Interest, Node, NodeId, NodeKind, Scene};
use crate::surface::Surface;

type ChildSnapshot = SmallVec<[NodeId; 16]>;

impl Scene {
    fn container(&self, id: NodeId) -> Option<&ContainerState> {
        match &self.node(id)?.kind {
            NodeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    fn container_mut(&mut self, id: NodeId) -> Option<&mut ContainerState> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Removes `id` from its parent's child list, if it has a parent.
    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(c) = self.container_mut(parent) {
            c.children.retain(|&child| child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Appends `child` to the top of `parent`'s children.
    ///
    /// See [`Scene::add_child_at`].
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(len) = self.container(parent).map(|c| c.children.len()) else {
            return false;
        };
        self.add_child_at(parent, child, len)
    }

    /// Inserts `child` into `parent`'s children at `index`.
    ///
    /// The child is first detached from any previous parent; re-adding it to
    /// the same parent moves it. Returns false, changing nothing, if `parent`
    /// is not a live container, `index` is greater than the child count,
    /// `child` is stale or a root, or `child` is `parent` or one of its
    /// ancestors.
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        let Some(len) = self.container(parent).map(|c| c.children.len()) else {
            return false;
        };
        if index > len {
            return false;
        }
        match self.node(child) {
            Some(node) if !node.root => {}
            _ => return false,
        }
        if self.ancestors(parent).any(|a| a == child) {
            return false;
        }

        self.detach(child);
        let Some(c) = self.container_mut(parent) else {
            return false;
        };
        let index = index.min(c.children.len());
        c.children.insert(index, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        true
    }

    /// Removes `child` from `parent`. Returns false if it is not a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    /// Removes and returns the child at `index`, or `None` if out of range.
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let child = *self.container(parent)?.children.get(index)?;
        self.detach(child);
        Some(child)
    }

    /// Detaches every child of `parent`.
    pub fn remove_all_children(&mut self, parent: NodeId) {
        let Some(c) = self.container_mut(parent) else {
            return;
        };
        let children = core::mem::take(&mut c.children);
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
            }
        }
    }

    /// Children of `id` in paint order. Empty for leaves and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or_default()
    }

    /// Number of children of `id`.
    pub fn num_children(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// The child of `parent` at `index`.
    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    /// The first child of `parent` named `name`.
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.node(c).and_then(|n| n.name.as_deref()) == Some(name))
    }

    /// Paint-order index of `child` within `parent`.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Whether `id` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Moves `child` to `index` within `parent`.
    ///
    /// Returns false if `child` is not a child of `parent` or `index` is out
    /// of range.
    pub fn set_child_index(&mut self, parent: NodeId, child: NodeId, index: usize) -> bool {
        let Some(c) = self.container_mut(parent) else {
            return false;
        };
        let Some(from) = c.children.iter().position(|&x| x == child) else {
            return false;
        };
        if index >= c.children.len() {
            return false;
        }
        let moved = c.children.remove(from);
        c.children.insert(index, moved);
        true
    }

    /// Swaps the children at two indices. Returns false if either is out of
    /// range.
    pub fn swap_children_at(&mut self, parent: NodeId, a: usize, b: usize) -> bool {
        let Some(c) = self.container_mut(parent) else {
            return false;
        };
        if a >= c.children.len() || b >= c.children.len() {
            return false;
        }
        c.children.swap(a, b);
        true
    }

    /// Swaps two children by id. Returns false unless both are children of
    /// `parent`.
    pub fn swap_children(&mut self, parent: NodeId, a: NodeId, b: NodeId) -> bool {
        match (self.child_index(parent, a), self.child_index(parent, b)) {
            (Some(ia), Some(ib)) => self.swap_children_at(parent, ia, ib),
            _ => false,
        }
    }

    /// Stable-sorts the children of `parent` with `compare`.
    pub fn sort_children(
        &mut self,
        parent: NodeId,
        mut compare: impl FnMut(&Node, &Node) -> Ordering,
    ) -> bool {
        let Some(c) = self.container_mut(parent) else {
            return false;
        };
        let mut children = core::mem::take(&mut c.children);
        children.sort_by(|&a, &b| match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => compare(na, nb),
            _ => Ordering::Equal,
        });
        if let Some(c) = self.container_mut(parent) {
            c.children = children;
        }
        true
    }

    /// Draws every visible child with its own transform context.
    ///
    /// The child list is read through a shared borrow, so it cannot change
    /// while it is being drawn.
    pub(crate) fn draw_children(&self, container: &ContainerState, surface: &mut dyn Surface) {
        for &child in &container.children {
            if !self.is_visible(child) {
                continue;
            }
            surface.save();
            self.update_transform_context(child, surface);
            self.draw(child, surface, false);
            surface.restore();
        }
    }

    /// Ticks `id` and its subtree.
    ///
    /// Children are ticked before their parent, topmost first. Children
    /// with `tick_enabled` unset are skipped with their subtrees, and a
    /// container with `tick_children` unset does not descend. Custom content
    /// receives [`Content::tick`](crate::Content::tick). Every ticked node
    /// with [`Interest::TICK`] is appended to `ticked`.
    pub fn tick(&mut self, id: NodeId, params: &TickParams, ticked: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        let children: ChildSnapshot = if node.tick_children() {
            node.children().iter().copied().collect()
        } else {
            ChildSnapshot::new()
        };
        for &child in children.iter().rev() {
            if self.node(child).is_some_and(|n| n.tick_enabled) {
                self.tick(child, params, ticked);
            }
        }
        if let Some(node) = self.node_mut(id) {
            if let NodeKind::Custom(content) = &mut node.kind {
                content.tick(params);
            }
            if node.interest().contains(Interest::TICK) {
                ticked.push(id);
            }
        }
    }

    /// The topmost node of `container`'s subtree painting at `point`, given
    /// in `container`'s local space.
    pub fn object_under_point(
        &self,
        container: NodeId,
        point: Point,
        mode: HitMode,
        sampler: &mut HitSampler,
    ) -> Result<Option<NodeId>, HitTestError> {
        let Some(global) = self.chain_to_global(container, point) else {
            return Ok(None);
        };
        self.object_under_global_point(container, global, mode, sampler)
    }

    /// Every node of `container`'s subtree painting at `point`, topmost
    /// first. `point` is in `container`'s local space.
    pub fn objects_under_point(
        &self,
        container: NodeId,
        point: Point,
        mode: HitMode,
        sampler: &mut HitSampler,
    ) -> Result<Vec<NodeId>, HitTestError> {
        let mut out = Vec::new();
        if let Some(global) = self.chain_to_global(container, point) {
            self.collect_under_point(
                container,
                global,
                Some(&mut out),
                mode,
                mode == HitMode::MouseEnabled,
                0,
                sampler,
            )?;
        }
        Ok(out)
    }

    /// Like [`Scene::object_under_point`] with `point` already in global
    /// space.
    pub fn object_under_global_point(
        &self,
        container: NodeId,
        point: Point,
        mode: HitMode,
        sampler: &mut HitSampler,
    ) -> Result<Option<NodeId>, HitTestError> {
        self.collect_under_point(
            container,
            point,
            None,
            mode,
            mode == HitMode::MouseEnabled,
            0,
            sampler,
        )
    }

    fn chain_to_global(&self, id: NodeId, point: Point) -> Option<Point> {
        Some(self.concatenated_matrix(id)?.transform_point(point))
    }

    fn collect_under_point(
        &self,
        container: NodeId,
        global: Point,
        mut out: Option<&mut Vec<NodeId>>,
        mode: HitMode,
        active_listener: bool,
        depth: usize,
        sampler: &mut HitSampler,
    ) -> Result<Option<NodeId>, HitTestError> {
        let Some(node) = self.node(container) else {
            return Ok(None);
        };
        let NodeKind::Container(state) = &node.kind else {
            return Ok(None);
        };
        if depth == 0 && !self.mask_contains(container, global, sampler)? {
            return Ok(None);
        }
        let mouse = mode.is_mouse();
        let active_listener =
            active_listener || (mouse && node.interest().intersects(Interest::POINTER));
        let report = |hit: NodeId| {
            if mouse && !state.mouse_children {
                container
            } else {
                hit
            }
        };

        for &child in state.children.iter().rev() {
            let Some(child_node) = self.node(child) else {
                continue;
            };
            let hit_area = child_node.hit_area.filter(|&h| self.is_alive(h));
            if !child_node.visible
                || (hit_area.is_none() && !self.is_visible(child))
                || (mouse && !child_node.mouse_enabled)
            {
                continue;
            }
            if hit_area.is_none() && !self.mask_contains(child, global, sampler)? {
                continue;
            }

            if hit_area.is_none() && child_node.is_container() {
                let cached = child_node.cache_image().is_some();
                if cached
                    && mouse
                    && (active_listener || self.subtree_has_interest(child, Interest::POINTER))
                {
                    // The snapshot answers for the whole subtree, even if it
                    // is older than the live content.
                    if self.sample_node(child, None, global, sampler)? {
                        match out.as_deref_mut() {
                            Some(list) => list.push(child),
                            None => return Ok(Some(report(child))),
                        }
                    }
                    continue;
                }
                let hit = self.collect_under_point(
                    child,
                    global,
                    out.as_deref_mut(),
                    mode,
                    active_listener,
                    depth + 1,
                    sampler,
                )?;
                if out.is_none()
                    && let Some(hit) = hit
                {
                    return Ok(Some(report(hit)));
                }
            } else {
                if mouse
                    && !active_listener
                    && !child_node.interest().intersects(Interest::POINTER)
                {
                    continue;
                }
                if self.sample_node(child, hit_area, global, sampler)? {
                    match out.as_deref_mut() {
                        Some(list) => list.push(child),
                        None => return Ok(Some(report(child))),
                    }
                }
            }
        }
        Ok(None)
    }

    /// Samples `id` (or its hit area) at a global point.
    fn sample_node(
        &self,
        id: NodeId,
        hit_area: Option<NodeId>,
        global: Point,
        sampler: &mut HitSampler,
    ) -> Result<bool, HitTestError> {
        let Some(mut m) = self.concatenated_matrix(id) else {
            return Ok(false);
        };
        let target = match hit_area.and_then(|h| Some((h, self.node(h)?))) {
            Some((h, area)) => {
                m.append_matrix(&area.matrix());
                h
            }
            None => id,
        };
        let surface = sampler.begin(sample_transform(&m, global));
        self.draw(target, surface, false);
        sampler.finish()
    }

    /// Whether `id`'s mask, if any, covers a global point.
    fn mask_contains(
        &self,
        id: NodeId,
        global: Point,
        sampler: &mut HitSampler,
    ) -> Result<bool, HitTestError> {
        let Some(node) = self.node(id) else {
            return Ok(false);
        };
        let Some(mask) = node.mask.and_then(|m| self.node(m)) else {
            return Ok(true);
        };
        let NodeKind::Shape(graphics) = &mask.kind else {
            return Ok(true);
        };
        if graphics.is_empty() {
            return Ok(true);
        }
        let mut m = mask.matrix();
        if let Some(parent) = node.parent.and_then(|p| self.concatenated_matrix(p)) {
            m.prepend_matrix(&parent);
        }
        let surface = sampler.begin(sample_transform(&m, global));
        surface.fill_path(
            &graphics.to_path(),
            &peniko::Brush::Solid(peniko::Color::BLACK),
        );
        sampler.finish()
    }
}

/// Maps `m` so that `global` lands on the sampler's single pixel.
fn sample_transform(m: &Matrix2D, global: Point) -> Affine {
    Affine::new([m.a, m.b, m.c, m.d, m.tx - global.x, m.ty - global.y])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Graphics;
    use crate::node::DisplayPatch;
    use crate::reference::RecordingFactory;
    use alloc::boxed::Box;
    use kurbo::Rect;
    use peniko::Color;

    fn scene() -> Scene {
        Scene::new(Box::new(RecordingFactory))
    }

    fn sampler() -> HitSampler {
        HitSampler::from_factory(&RecordingFactory)
    }

    fn square(scene: &mut Scene, x0: f64, y0: f64, x1: f64, y1: f64) -> NodeId {
        let mut g = Graphics::new();
        g.fill_rect(Rect::new(x0, y0, x1, y1), Color::BLACK);
        scene.create_shape(g)
    }

    #[test]
    fn reparenting_keeps_single_parent() {
        let mut s = scene();
        let a = s.create_container();
        let b = s.create_container();
        let n = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        assert!(s.add_child(a, n));
        assert!(s.add_child(b, n));
        assert_eq!(s.parent(n), Some(b));
        assert_eq!(s.children(a), &[] as &[NodeId]);
        assert_eq!(s.children(b), &[n]);
    }

    #[test]
    fn add_child_at_rejects_out_of_range_index() {
        let mut s = scene();
        let group = s.create_container();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let b = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        assert!(s.add_child(group, a));
        assert!(!s.add_child_at(group, b, 2));
        assert_eq!(s.children(group), &[a]);
        assert_eq!(s.parent(b), None);
        assert!(s.add_child_at(group, b, 0));
        assert_eq!(s.children(group), &[b, a]);
    }

    #[test]
    fn readding_to_same_parent_moves_child() {
        let mut s = scene();
        let group = s.create_container();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let b = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        s.add_child(group, a);
        s.add_child(group, b);
        assert!(s.add_child(group, a));
        assert_eq!(s.children(group), &[b, a]);
    }

    #[test]
    fn cycles_and_non_containers_are_rejected() {
        let mut s = scene();
        let outer = s.create_container();
        let inner = s.create_container();
        let leaf = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let root = s.create_root();
        assert!(s.add_child(outer, inner));
        assert!(!s.add_child(inner, outer));
        assert!(!s.add_child(outer, outer));
        assert!(!s.add_child(leaf, outer));
        assert!(!s.add_child(outer, root));
        assert!(s.contains(outer, inner));
        assert!(!s.contains(inner, outer));
    }

    #[test]
    fn index_operations_validate_membership() {
        let mut s = scene();
        let group = s.create_container();
        let other = s.create_container();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let b = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let c = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        s.add_child(group, a);
        s.add_child(group, b);
        s.add_child(other, c);

        assert!(!s.swap_children(group, a, c));
        assert!(!s.swap_children_at(group, 0, 5));
        assert!(s.swap_children(group, a, b));
        assert_eq!(s.children(group), &[b, a]);
        assert!(!s.set_child_index(group, c, 0));
        assert!(!s.set_child_index(group, a, 2));
        assert!(s.set_child_index(group, a, 0));
        assert_eq!(s.children(group), &[a, b]);
        assert_eq!(s.remove_child_at(group, 7), None);
        assert!(!s.remove_child(group, c));
        assert_eq!(s.remove_child_at(group, 0), Some(a));
        assert_eq!(s.parent(a), None);
        s.remove_all_children(group);
        assert_eq!(s.num_children(group), 0);
        assert_eq!(s.parent(b), None);
    }

    #[test]
    fn lookup_by_name_and_sort() {
        let mut s = scene();
        let group = s.create_container();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let b = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        s.add_child(group, a);
        s.add_child(group, b);
        s.apply(a, &DisplayPatch::new().name(Some("a")).position(5.0, 0.0));
        s.apply(b, &DisplayPatch::new().name(Some("b")).position(1.0, 0.0));
        assert_eq!(s.child_by_name(group, "b"), Some(b));
        assert_eq!(s.child_by_name(group, "z"), None);
        assert!(s.sort_children(group, |l, r| l.x.total_cmp(&r.x)));
        assert_eq!(s.children(group), &[b, a]);
        assert_eq!(s.child_at(group, 1), Some(a));
    }

    #[test]
    fn topmost_of_overlapping_siblings_wins() {
        let mut s = scene();
        let root = s.create_root();
        let a = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        let b = square(&mut s, 5.0, 5.0, 15.0, 15.0);
        let c = square(&mut s, 20.0, 20.0, 30.0, 30.0);
        s.add_child(root, a);
        s.add_child(root, b);
        s.add_child(root, c);
        let mut sampler = sampler();

        let at = |s: &Scene, sampler: &mut HitSampler, x, y| {
            s.object_under_point(root, Point::new(x, y), HitMode::All, sampler)
                .unwrap()
        };
        assert_eq!(at(&s, &mut sampler, 7.0, 7.0), Some(b));
        assert_eq!(at(&s, &mut sampler, 2.0, 2.0), Some(a));
        assert_eq!(at(&s, &mut sampler, 17.0, 17.0), None);

        s.swap_children(root, a, b);
        assert_eq!(at(&s, &mut sampler, 7.0, 7.0), Some(a));

        let all = s
            .objects_under_point(root, Point::new(7.0, 7.0), HitMode::All, &mut sampler)
            .unwrap();
        assert_eq!(all, [a, b]);
    }

    #[test]
    fn removing_the_top_sibling_exposes_the_next() {
        let mut s = scene();
        let root = s.create_root();
        let a = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        let b = square(&mut s, 2.0, 2.0, 12.0, 12.0);
        let c = square(&mut s, 4.0, 4.0, 14.0, 14.0);
        for id in [a, b, c] {
            s.add_child(root, id);
        }
        let mut sampler = sampler();
        let point = Point::new(6.0, 6.0);

        let hit = s.object_under_point(root, point, HitMode::All, &mut sampler);
        assert_eq!(hit, Ok(Some(c)));

        assert!(s.remove_child(root, c));
        assert_eq!(s.parent(c), None);
        let hit = s.object_under_point(root, point, HitMode::All, &mut sampler);
        assert_eq!(hit, Ok(Some(b)));

        assert!(!s.remove_child(root, c));
        assert!(s.remove_child(root, b));
        let hit = s.object_under_point(root, point, HitMode::All, &mut sampler);
        assert_eq!(hit, Ok(Some(a)));
    }

    #[test]
    fn nested_transforms_are_resolved() {
        let mut s = scene();
        let root = s.create_root();
        let group = s.create_container();
        let dot = square(&mut s, -1.0, -1.0, 1.0, 1.0);
        s.add_child(root, group);
        s.add_child(group, dot);
        s.apply(group, &DisplayPatch::new().position(100.0, 0.0).scale(2.0, 2.0));
        s.apply(dot, &DisplayPatch::new().position(10.0, 10.0));
        let mut sampler = sampler();
        let hit = s
            .object_under_point(root, Point::new(120.5, 20.5), HitMode::All, &mut sampler)
            .unwrap();
        assert_eq!(hit, Some(dot));
        let miss = s
            .object_under_point(root, Point::new(10.5, 10.5), HitMode::All, &mut sampler)
            .unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn mouse_modes_filter_targets() {
        let mut s = scene();
        let root = s.create_root();
        let group = s.create_container();
        let under = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        let over = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        s.add_child(root, under);
        s.add_child(root, group);
        s.add_child(group, over);
        let mut sampler = sampler();
        let p = Point::new(5.0, 5.0);

        s.node_mut(under).unwrap().set_interest(Interest::CLICK);
        assert_eq!(
            s.object_under_point(root, p, HitMode::Listeners, &mut sampler),
            Ok(Some(under))
        );
        assert_eq!(
            s.object_under_point(root, p, HitMode::MouseEnabled, &mut sampler),
            Ok(Some(over))
        );

        s.node_mut(group).unwrap().set_interest(Interest::MOUSE_DOWN);
        s.node_mut(group).unwrap().set_mouse_children(false);
        assert_eq!(
            s.object_under_point(root, p, HitMode::Listeners, &mut sampler),
            Ok(Some(group))
        );
        assert_eq!(
            s.object_under_point(root, p, HitMode::All, &mut sampler),
            Ok(Some(over))
        );

        s.node_mut(over).unwrap().mouse_enabled = false;
        assert_eq!(
            s.object_under_point(root, p, HitMode::MouseEnabled, &mut sampler),
            Ok(Some(under))
        );
    }

    #[test]
    fn hit_area_replaces_content_for_picking() {
        let mut s = scene();
        let root = s.create_root();
        let small = square(&mut s, 0.0, 0.0, 2.0, 2.0);
        let area = square(&mut s, 0.0, 0.0, 50.0, 50.0);
        s.add_child(root, small);
        assert!(s.set_hit_area(small, Some(area)));
        let mut sampler = sampler();
        assert_eq!(
            s.object_under_point(root, Point::new(40.0, 40.0), HitMode::All, &mut sampler),
            Ok(Some(small))
        );
        assert_eq!(s.hit_test(small, Point::new(40.0, 40.0), &mut sampler), Ok(false));
    }

    #[test]
    fn masked_child_is_skipped_outside_mask() {
        let mut s = scene();
        let root = s.create_root();
        let big = square(&mut s, 0.0, 0.0, 20.0, 20.0);
        let mask = square(&mut s, 0.0, 0.0, 5.0, 5.0);
        s.add_child(root, big);
        s.set_mask(big, Some(mask)).unwrap();
        let mut sampler = sampler();
        assert_eq!(
            s.object_under_point(root, Point::new(2.0, 2.0), HitMode::All, &mut sampler),
            Ok(Some(big))
        );
        assert_eq!(
            s.object_under_point(root, Point::new(10.0, 10.0), HitMode::All, &mut sampler),
            Ok(None)
        );
    }

    #[test]
    fn cached_container_is_sampled_from_its_snapshot() {
        let mut s = scene();
        let root = s.create_root();
        let group = s.create_container();
        let leaf = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        s.add_child(root, group);
        s.add_child(group, leaf);
        s.node_mut(leaf).unwrap().set_interest(Interest::CLICK);
        s.cache(group, Rect::new(0.0, 0.0, 10.0, 10.0), 1.0).unwrap();

        // Move the live content away without refreshing the cache.
        s.apply(leaf, &DisplayPatch::new().position(50.0, 50.0));
        let mut sampler = sampler();
        let p = Point::new(5.0, 5.0);
        assert_eq!(
            s.object_under_point(root, p, HitMode::Listeners, &mut sampler),
            Ok(Some(group))
        );
        assert_eq!(
            s.object_under_point(root, p, HitMode::All, &mut sampler),
            Ok(None)
        );
    }

    #[test]
    fn hidden_and_transparent_children_are_skipped() {
        let mut s = scene();
        let root = s.create_root();
        let a = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        let b = square(&mut s, 0.0, 0.0, 10.0, 10.0);
        s.add_child(root, a);
        s.add_child(root, b);
        s.apply(b, &DisplayPatch::new().opacity(0.0));
        let mut sampler = sampler();
        assert_eq!(
            s.object_under_point(root, Point::new(5.0, 5.0), HitMode::All, &mut sampler),
            Ok(Some(a))
        );
        s.apply(a, &DisplayPatch::new().visible(false));
        assert_eq!(
            s.object_under_point(root, Point::new(5.0, 5.0), HitMode::All, &mut sampler),
            Ok(None)
        );
    }

    #[test]
    fn tick_visits_children_topmost_first_then_parent() {
        let mut s = scene();
        let root = s.create_root();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let b = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let skipped = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        for id in [a, b, skipped] {
            s.add_child(root, id);
            s.node_mut(id).unwrap().add_interest(Interest::TICK);
        }
        s.node_mut(root).unwrap().add_interest(Interest::TICK);
        s.node_mut(skipped).unwrap().tick_enabled = false;

        let mut ticked = Vec::new();
        s.tick(root, &TickParams::default(), &mut ticked);
        assert_eq!(ticked, [b, a, root]);

        s.node_mut(root).unwrap().set_tick_children(false);
        ticked.clear();
        s.tick(root, &TickParams::default(), &mut ticked);
        assert_eq!(ticked, [root]);
    }

    #[test]
    fn draw_wraps_each_visible_child_in_save_restore() {
        use crate::reference::{Op, RecordingSurface};
        let mut s = scene();
        let root = s.create_root();
        let a = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        let hidden = square(&mut s, 0.0, 0.0, 1.0, 1.0);
        s.add_child(root, a);
        s.add_child(root, hidden);
        s.apply(hidden, &DisplayPatch::new().visible(false));
        let mut surface = RecordingSurface::new(4, 4);
        assert!(s.draw(root, &mut surface, false));
        let kinds: Vec<_> = surface
            .events()
            .iter()
            .map(|e| match e.op {
                Op::Save => "save",
                Op::Restore => "restore",
                Op::Fill { .. } => "fill",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, ["save", "fill", "restore"]);
    }
}
