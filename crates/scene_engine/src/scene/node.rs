//! Scene graph nodes
//!
//! A [`Node`] is plain data: transform, linkage, flags and a body. All
//! mutation goes through [`SceneGraph`](super::SceneGraph) so that the graph
//! can keep its linkage consistent and bump its revision counter.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::foundation::math::Mat4;
use crate::scene::light::Light;
use crate::scene::visual::{Bound, VisualSlot};

slotmap::new_key_type! {
    /// Generational handle of a node inside a [`SceneGraph`](super::SceneGraph)
    pub struct NodeId;
}

/// Concrete kind of a node
///
/// Used by the hot per-frame loops in place of runtime type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    /// Plain grouping/transform node
    Node,
    /// Camera node
    Camera,
    /// Light source
    Light,
    /// Triangle mesh visual
    Mesh,
    /// Line list visual
    Lines,
    /// Particle system visual (usually world-space bounds)
    ParticleSystem,
    /// Text console overlay visual
    Console,
    /// Any other drawable
    OtherVisual,
}

impl NodeClass {
    /// Whether nodes of this class carry a [`Visual`](super::Visual) body
    pub const fn is_visual(self) -> bool {
        matches!(
            self,
            Self::Mesh | Self::Lines | Self::ParticleSystem | Self::Console | Self::OtherVisual
        )
    }
}

/// Class-specific payload of a node
#[derive(Debug)]
pub enum NodeBody {
    /// No payload
    Plain,
    /// Camera marker; the camera state itself lives in `render::Camera`
    Camera,
    /// Light parameters
    Light(Light),
    /// Drawable object and its bounds
    Visual(VisualSlot),
}

impl NodeBody {
    fn duplicate(&self) -> Self {
        match self {
            Self::Plain => Self::Plain,
            Self::Camera => Self::Camera,
            Self::Light(light) => Self::Light(light.clone()),
            Self::Visual(slot) => Self::Visual(slot.duplicate()),
        }
    }
}

/// A scene graph node
pub struct Node {
    pub(crate) transform: Mat4,
    pub(crate) enabled: bool,
    pub(crate) class: NodeClass,
    pub(crate) name: String,
    pub(crate) user_data: Option<Rc<dyn Any>>,
    pub(crate) user_id: i32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) previous: Option<NodeId>,
    pub(crate) owners: u32,
    pub(crate) body: NodeBody,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, class: NodeClass, body: NodeBody) -> Self {
        Self {
            transform: Mat4::identity(),
            enabled: true,
            class,
            name: name.into(),
            user_data: None,
            user_id: 0,
            parent: None,
            first_child: None,
            next_sibling: None,
            previous: None,
            owners: 0,
            body,
        }
    }

    /// Copy of the node's own state with no linkage and no owners
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            transform: self.transform,
            enabled: self.enabled,
            class: self.class,
            name: self.name.clone(),
            user_data: self.user_data.clone(),
            user_id: self.user_id,
            parent: None,
            first_child: None,
            next_sibling: None,
            previous: None,
            owners: 0,
            body: self.body.duplicate(),
        }
    }

    /// Local-to-parent transform
    pub const fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Whether the node takes part in culling, lighting and rendering
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Class tag
    pub const fn class(&self) -> NodeClass {
        self.class
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque user data
    pub fn user_data(&self) -> Option<&Rc<dyn Any>> {
        self.user_data.as_ref()
    }

    /// Integer user id
    pub const fn user_id(&self) -> i32 {
        self.user_id
    }

    /// Parent node, if linked
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Head of the child list
    pub const fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    /// Next node in the parent's child list
    pub const fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    /// Previous node in the parent's child list
    pub const fn previous(&self) -> Option<NodeId> {
        self.previous
    }

    /// Outstanding owner references (not counting the parent link)
    pub const fn owners(&self) -> u32 {
        self.owners
    }

    /// Class payload
    pub const fn body(&self) -> &NodeBody {
        &self.body
    }

    /// Light payload for light nodes
    pub const fn light(&self) -> Option<&Light> {
        match &self.body {
            NodeBody::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Visual payload for visual nodes
    pub const fn visual(&self) -> Option<&VisualSlot> {
        match &self.body {
            NodeBody::Visual(slot) => Some(slot),
            _ => None,
        }
    }

    /// Bounding volume for visual nodes
    pub fn bound(&self) -> Option<&Bound> {
        self.visual().map(VisualSlot::bound)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("enabled", &self.enabled)
            .field("parent", &self.parent)
            .field("first_child", &self.first_child)
            .field("next_sibling", &self.next_sibling)
            .field("owners", &self.owners)
            .finish_non_exhaustive()
    }
}
