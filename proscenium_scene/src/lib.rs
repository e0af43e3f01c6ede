// Copyright 2026 the Proscenium Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Proscenium Scene: a retained-mode 2D display list.
//!
//! A [`Scene`] is an arena of nodes arranged in a tree of containers. Each
//! node carries a 2D transform (position, scale, rotation, skew and
//! registration point) plus compositing properties (opacity, shadow, blend
//! mode, visibility). The tree is drawn onto any [`Surface`], which keeps the
//! crate independent of a particular rasterizer.
//!
//! - **Transforms** ([`Matrix2D`]): affine matrices that also carry the
//!   compositing side-channel, so concatenating down a chain yields both
//!   the global transform and the effective opacity.
//! - **Nodes** ([`Node`], [`NodeKind`]): shapes built from [`Graphics`]
//!   commands, [`Bitmap`]s, containers, and host [`Content`].
//! - **Caching** ([`Scene::cache`]): renders a subtree into an offscreen
//!   bitmap that is blitted until explicitly refreshed.
//! - **Hit testing** ([`Scene::object_under_point`]): pixel-accurate picking
//!   that draws candidates into a 1×1 scratch surface and reads its alpha.
//! - **Stage** ([`Stage`]): binds a root container to an output surface and
//!   turns raw pointer input into queued [`StageEvent`]s.
//!
//! ## Quick Start
//!
//! ```rust
//! use kurbo::Point;
//! use peniko::Color;
//! use proscenium_scene::pointer::PointerId;
//! use proscenium_scene::reference::RecordingFactory;
//! use proscenium_scene::{DisplayPatch, EventKind, Graphics, Interest, Stage, TickParams};
//!
//! let mut stage = Stage::new(Box::new(RecordingFactory), 100, 100);
//! let root = stage.root();
//!
//! let mut circle = Graphics::new();
//! circle.fill_circle(0.0, 0.0, 10.0, Color::BLACK);
//! let scene = stage.scene_mut();
//! let a = scene.create_shape(circle.clone());
//! let b = scene.create_shape(circle);
//! scene.add_child(root, a);
//! scene.add_child(root, b);
//! scene.apply(a, &DisplayPatch::new().position(20.0, 20.0));
//! scene.apply(b, &DisplayPatch::new().position(25.0, 20.0));
//! scene.node_mut(b).unwrap().add_interest(Interest::CLICK);
//!
//! stage.update(&TickParams::default());
//!
//! // B was added last, so it is on top where the circles overlap.
//! stage.pointer_down(PointerId::MOUSE, Point::new(25.0, 20.0))?;
//! stage.pointer_up(PointerId::MOUSE, false)?;
//! let events = stage.drain_events();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].kind, EventKind::Click);
//! assert_eq!(events[0].target, b);
//! # Ok::<(), proscenium_scene::HitTestError>(())
//! ```
//!
//! ## Features
//!
//! - `std` (default): enables `std` in Kurbo and Peniko.
//! - `libm`: floating point support for `no_std` builds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod cache;
mod container;
mod event;
mod filter;
mod graphics;
pub mod hit;
mod matrix;
mod node;
pub mod pointer;
pub mod reference;
mod stage;
mod surface;

pub use kurbo;
pub use peniko;

pub use cache::{CacheError, CacheInfo};
pub use event::{EventKind, PointerInfo, StageEvent, TickParams};
pub use filter::{Filter, TintFilter};
pub use graphics::{Graphics, PATH_TOLERANCE};
pub use hit::{HitMode, HitSampler, HitTestError};
pub use matrix::{DEG_TO_RAD, Matrix2D, Shadow, TransformParts};
pub use node::{
    Bitmap, Content, ContainerState, DisplayPatch, Interest, MaskError, Node, NodeId, NodeKind,
    Scene,
};
pub use stage::{Stage, StageConfig};
pub use surface::{Effects, Image, Rgba, Surface, SurfaceError, SurfaceFactory};
