// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bitmap caching of node subtrees.
//!
//! A cached node keeps an offscreen surface holding its rendered content.
//! While the cache is populated, [`Scene::draw`] blits the snapshot instead
//! of drawing the content, and hit tests sample the snapshot as well. The
//! cache is only refreshed by an explicit [`Scene::update_cache`].

use alloc::boxed::Box;
use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Affine, Rect, Vec2};
use peniko::BlendMode;

use crate::filter::filter_bounds;
use crate::node::{Node, NodeId, Scene};
use crate::surface::{Effects, Image, Surface};

/// Errors from cache operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// [`Scene::update_cache`] was called on a node without a cache.
    NotCached(NodeId),
    /// The id does not refer to a live node.
    StaleNode(NodeId),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCached(id) => write!(f, "node {id:?} has no cache; call cache() first"),
            Self::StaleNode(id) => write!(f, "node {id:?} is not alive"),
        }
    }
}

impl core::error::Error for CacheError {}

/// Read-only view of a node's cache geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheInfo {
    /// Cached region in local space, before filter padding.
    pub rect: Rect,
    /// Resolution multiplier.
    pub scale: f64,
    /// Cache surface width in pixels.
    pub pixel_width: u32,
    /// Cache surface height in pixels.
    pub pixel_height: u32,
    /// Padding offset added by filters, in cache pixels.
    pub filter_offset: Vec2,
}

#[derive(Debug)]
pub(crate) struct Cache {
    surface: Box<dyn Surface>,
    image: Option<Image>,
    rect: Rect,
    scale: f64,
    filter_offset: Vec2,
}

impl Cache {
    pub(crate) fn is_populated(&self) -> bool {
        self.image.is_some()
    }

    /// The area the blitted snapshot covers, in local space.
    pub(crate) fn local_rect(&self) -> Rect {
        let origin = self.rect.origin() + self.filter_offset / self.scale;
        let size = kurbo::Size::new(
            f64::from(self.surface.width()) / self.scale,
            f64::from(self.surface.height()) / self.scale,
        );
        Rect::from_origin_size(origin, size)
    }

    fn info(&self) -> CacheInfo {
        CacheInfo {
            rect: self.rect,
            scale: self.scale,
            pixel_width: self.surface.width(),
            pixel_height: self.surface.height(),
            filter_offset: self.filter_offset,
        }
    }
}

impl Node {
    /// Blits the cache snapshot, if there is one.
    pub(crate) fn draw_cache(&self, surface: &mut dyn Surface) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let Some(image) = &cache.image else {
            return false;
        };
        surface.draw_image(image, None, cache.local_rect());
        true
    }

    /// Whether the node has a bitmap cache.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Incremented by every cache update. Never reset.
    pub fn cache_id(&self) -> u64 {
        self.cache_id
    }

    /// Geometry of the current cache.
    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.cache.as_ref().map(Cache::info)
    }

    /// The latest cache snapshot.
    pub fn cache_image(&self) -> Option<&Image> {
        self.cache.as_ref()?.image.as_ref()
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to the u32 range before the cast"
)]
fn pixel_extent(length: f64, scale: f64, padding: f64) -> u32 {
    ((length * scale).ceil() + padding).clamp(1.0, f64::from(u32::MAX)) as u32
}

impl Scene {
    /// Renders `id` into an offscreen bitmap covering `rect` (local space) at
    /// `scale` times resolution, and draws from that bitmap from now on.
    ///
    /// Calling it again replaces the cache geometry.
    pub fn cache(&mut self, id: NodeId, rect: Rect, scale: f64) -> Result<(), CacheError> {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        if !self.is_alive(id) {
            return Err(CacheError::StaleNode(id));
        }
        let surface = self.factory().create_surface(
            pixel_extent(rect.width(), scale, 0.0),
            pixel_extent(rect.height(), scale, 0.0),
        );
        let node = self.node_mut(id).ok_or(CacheError::StaleNode(id))?;
        node.cache = Some(Cache {
            surface,
            image: None,
            rect,
            scale,
            filter_offset: Vec2::ZERO,
        });
        self.update_cache(id, None)
    }

    /// Redraws the cache of `id` from its current content.
    ///
    /// With `blend` set the previous contents are kept and the new rendering
    /// is composited over them with that mode. Every successful call bumps
    /// [`Node::cache_id`].
    pub fn update_cache(&mut self, id: NodeId, blend: Option<BlendMode>) -> Result<(), CacheError> {
        let node = self.node_mut(id).ok_or(CacheError::StaleNode(id))?;
        let mut cache = node.cache.take().ok_or(CacheError::NotCached(id))?;

        let scale = cache.scale;
        let padding = filter_bounds(node.filters.iter().map(|f| f.as_ref()))
            .unwrap_or(Rect::ZERO);
        let width = pixel_extent(cache.rect.width(), scale, padding.width());
        let height = pixel_extent(cache.rect.height(), scale, padding.height());
        let offset = Vec2::new(
            cache.rect.x0 * scale + padding.x0,
            cache.rect.y0 * scale + padding.y0,
        );
        cache.filter_offset = Vec2::new(padding.x0, padding.y0);

        if width != cache.surface.width() || height != cache.surface.height() {
            log::debug!("allocating {width}x{height} cache surface for {id:?}");
            cache.surface = self.factory().create_surface(width, height);
        } else if blend.is_none() {
            cache.surface.clear();
        }

        let surface = cache.surface.as_mut();
        surface.save();
        surface.set_transform(
            Affine::translate((-offset.x, -offset.y)) * Affine::scale(scale),
        );
        if let Some(mode) = blend {
            surface.push_effects(&Effects::blend(mode));
        }
        self.draw(id, surface, true);
        surface.restore();

        if let Some(node) = self.node(id) {
            for filter in &node.filters {
                filter.apply_filter(surface, 0, 0, width, height);
            }
        }
        cache.image = Some(surface.snapshot());

        let node = self.node_mut(id).ok_or(CacheError::StaleNode(id))?;
        node.cache = Some(cache);
        node.cache_id += 1;
        Ok(())
    }

    /// Drops the cache of `id`. [`Node::cache_id`] is kept.
    ///
    /// Returns false if `id` is stale.
    pub fn uncache(&mut self, id: NodeId) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.cache = None;
                true
            }
            None => false,
        }
    }
}
