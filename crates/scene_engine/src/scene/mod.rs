//! Scene graph
//!
//! Nodes live in an arena ([`SceneGraph`]) and are addressed by generational
//! [`NodeId`] handles. Each node carries a local transform, tree linkage
//! (parent, first child, next sibling, previous sibling) and a
//! [`NodeClass`] tag that the per-frame passes match on instead of doing
//! dynamic type checks.
//!
//! ## Layout
//!
//! ```text
//! SceneGraph (arena)
//!   ├── Node { transform, class, body: Plain | Camera | Light | Visual }
//!   ├── ViewFrustum      (plane extraction + intersection tests)
//!   └── LightSorter      (nearest-N light queries)
//! ```
//!
//! Per-frame caches (world transforms, frustum hints) are kept outside the
//! nodes, in the render layer.

pub mod frustum;
pub mod graph;
pub mod light;
pub mod light_sorter;
pub mod node;
pub mod visual;

pub use frustum::{Plane, PlaneTest, ViewFrustum};
pub use graph::{Descendants, SceneGraph};
pub use light::{Light, LightType};
pub use light_sorter::{LightEntry, LightSorter, MAX_LIGHTS};
pub use node::{Node, NodeBody, NodeClass, NodeId};
pub use visual::{Bound, BoundFlags, Visual, VisualSlot, MAX_BOUND_EXTENT};

use thiserror::Error;

/// Errors raised at the scene graph API boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The handle refers to a node that was destroyed (or never existed)
    #[error("Node {0:?} does not exist")]
    StaleNode(NodeId),

    /// A node was asked to become its own parent
    #[error("Node {0:?} cannot be linked to itself")]
    SelfLink(NodeId),

    /// Linking would make a node its own ancestor
    #[error("Linking {child:?} under {parent:?} would create a cycle")]
    CyclicLink {
        /// Node being linked
        child: NodeId,
        /// Requested parent, a descendant of `child`
        parent: NodeId,
    },

    /// `release` was called on a node without outstanding owner references
    #[error("Node {0:?} has no owner references to release")]
    NotOwned(NodeId),

    /// A frustum parameter was outside its accepted range
    #[error("Invalid frustum parameter: {0}")]
    InvalidFrustum(String),

    /// More nodes than the 16-bit transform cache can index
    #[error("Transform cache overflow: {0} nodes exceed the 16-bit slot range")]
    TransformCacheOverflow(usize),

    /// A transform that must be inverted has a (near) zero determinant
    #[error("Transform of node {0:?} is singular")]
    SingularTransform(NodeId),
}
