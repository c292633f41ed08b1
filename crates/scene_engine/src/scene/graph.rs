//! Scene graph arena
//!
//! [`SceneGraph`] owns every node and implements linkage, traversal and
//! transform composition.
//!
//! ## Ownership
//!
//! A node stays alive while it has a parent or at least one owner reference.
//! `create_*` hands out one owner reference; [`SceneGraph::retain`] and
//! [`SceneGraph::release`] add and drop more. Parent links do not count as
//! owners of the parent: destroying a parent force-unlinks its children, and
//! a child that still has owners survives as a new root while an unowned
//! child is destroyed with it.
//!
//! ## Revision
//!
//! Every structural or transform mutation bumps [`SceneGraph::revision`].
//! Per-frame caches record the revision they were built against, which is how
//! stale cache use is detected.

use std::any::Any;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::foundation::math::{AffineExt, Mat4, Vec3};
use crate::scene::light::Light;
use crate::scene::node::{Node, NodeBody, NodeClass, NodeId};
use crate::scene::visual::{Bound, Visual, VisualSlot};
use crate::scene::SceneError;

/// Minimum look-at distance and basis length accepted by [`SceneGraph::look_at`]
const LOOK_AT_EPSILON: f32 = 1e-6;

/// Arena of scene nodes
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    revision: u64,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Mutation counter
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Borrow a node
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::StaleNode(id))
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ------------------------------------------------------------------
    // Creation and ownership
    // ------------------------------------------------------------------

    fn insert(&mut self, mut node: Node) -> NodeId {
        node.owners = 1;
        self.touch();
        let id = self.nodes.insert(node);
        log::trace!("Created node {:?}", id);
        id
    }

    /// Create a plain grouping node
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        self.insert(Node::new(name, NodeClass::Node, NodeBody::Plain))
    }

    /// Create a light node
    pub fn create_light(&mut self, name: impl Into<String>, light: Light) -> NodeId {
        self.insert(Node::new(name, NodeClass::Light, NodeBody::Light(light)))
    }

    /// Create a visual node; its bound is computed immediately
    pub fn create_visual(&mut self, name: impl Into<String>, visual: Box<dyn Visual>) -> NodeId {
        let class = visual.class();
        debug_assert!(
            class.is_visual(),
            "Visual reported non-visual class {class:?}"
        );
        let body = NodeBody::Visual(VisualSlot::new(visual));
        self.insert(Node::new(name, class, body))
    }

    pub(crate) fn create_camera_node(&mut self, name: impl Into<String>) -> NodeId {
        self.insert(Node::new(name, NodeClass::Camera, NodeBody::Camera))
    }

    /// Add an owner reference
    pub fn retain(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.node_mut(id)?.owners += 1;
        Ok(())
    }

    /// Drop an owner reference, destroying the node when nothing keeps it alive
    pub fn release(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.owners == 0 {
            return Err(SceneError::NotOwned(id));
        }
        node.owners -= 1;
        if node.owners == 0 && node.parent.is_none() {
            self.destroy(id);
        }
        Ok(())
    }

    /// Owner references held on `id`
    pub fn owner_count(&self, id: NodeId) -> Option<u32> {
        self.get(id).map(Node::owners)
    }

    /// Destroy `id`: unlink it, orphan owned children, destroy unowned ones
    fn destroy(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            self.detach(current);

            let mut child = self.nodes.get(current).and_then(|n| n.first_child);
            while let Some(c) = child {
                child = self.nodes.get(c).and_then(|n| n.next_sibling);
                self.detach(c);
                if self.nodes.get(c).is_some_and(|n| n.owners == 0) {
                    pending.push(c);
                } else {
                    log::debug!("Node {:?} orphaned by destruction of {:?}", c, current);
                }
            }

            if let Some(node) = self.nodes.remove(current) {
                log::trace!("Destroyed node {:?} ({})", current, node.name);
            }
        }
        self.touch();
    }

    // ------------------------------------------------------------------
    // Linkage
    // ------------------------------------------------------------------

    /// Link `child` as the first child of `parent`
    ///
    /// A node that already has a parent is moved. Linking a node to itself or
    /// under one of its own descendants is rejected.
    pub fn link_to(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        self.node(child)?;
        self.node(parent)?;
        if child == parent {
            return Err(SceneError::SelfLink(child));
        }
        if self.is_ancestor_of(child, parent) {
            return Err(SceneError::CyclicLink { child, parent });
        }

        self.detach(child);

        let old_head = self.node(parent)?.first_child;
        if let Some(head) = old_head {
            self.node_mut(head)?.previous = Some(child);
        }
        {
            let node = self.node_mut(child)?;
            node.parent = Some(parent);
            node.previous = None;
            node.next_sibling = old_head;
        }
        self.node_mut(parent)?.first_child = Some(child);
        self.touch();
        Ok(())
    }

    /// Remove `id` from its parent's child list
    ///
    /// No-op for unparented nodes. A node left with no owner references is
    /// destroyed.
    pub fn unlink(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.node(id)?;
        if node.parent.is_none() {
            return Ok(());
        }
        self.detach(id);
        if self.node(id)?.owners == 0 {
            self.destroy(id);
        }
        Ok(())
    }

    /// O(1) removal from the parent's child list, never destroys
    fn detach(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(parent) = node.parent.take() else {
            return;
        };
        let previous = node.previous.take();
        let next = node.next_sibling.take();

        match previous {
            Some(prev) => {
                if let Some(prev_node) = self.nodes.get_mut(prev) {
                    prev_node.next_sibling = next;
                }
            }
            None => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.first_child = next;
                }
            }
        }
        if let Some(next) = next {
            if let Some(next_node) = self.nodes.get_mut(next) {
                next_node.previous = previous;
            }
        }
        self.touch();
    }

    /// Parent of `id`
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// First child of `id`
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    /// Next sibling of `id`
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    /// Direct children of `id`, head first
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.first_child(id), move |&c| self.next_sibling(c))
    }

    /// Whether `ancestor` is `id` itself or one of its ancestors
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// Number of ancestors of `id`
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.parent(id), |&p| self.parent(p)).count()
    }

    /// Topmost ancestor of `id` (itself when unparented)
    pub fn root(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        self.get(current)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Pre-order successor of `id` inside the subtree rooted at `root`
    ///
    /// Children come before siblings. Returns `None` once the traversal
    /// climbs back to `root`. No stack is needed: the parent chain is the
    /// stack.
    pub fn next(&self, id: NodeId, root: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        if let Some(child) = node.first_child {
            return Some(child);
        }

        let mut current = id;
        while current != root {
            let node = self.get(current)?;
            if let Some(sibling) = node.next_sibling {
                return Some(sibling);
            }
            current = node.parent?;
        }
        None
    }

    /// Pre-order iterator over `root` and all its descendants
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            graph: self,
            root,
            next: self.contains(root).then_some(root),
        }
    }

    /// Replace `out` with the pre-order listing of the subtree at `root`
    ///
    /// Parents always precede their children in the result.
    pub fn flatten(&self, root: NodeId, out: &mut Vec<NodeId>) {
        out.clear();
        out.extend(self.descendants(root));
    }

    /// First node named `name` in the subtree at `root`
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root).find(|&id| self.get(id).is_some_and(|n| n.name == name))
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// Local-to-parent transform
    pub fn transform(&self, id: NodeId) -> Option<&Mat4> {
        self.get(id).map(Node::transform)
    }

    /// Set the local-to-parent transform
    pub fn set_transform(&mut self, id: NodeId, transform: Mat4) -> Result<(), SceneError> {
        self.node_mut(id)?.transform = transform;
        self.touch();
        Ok(())
    }

    /// Set the translation of the local transform
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.node_mut(id)?.transform.set_translation_part(position);
        self.touch();
        Ok(())
    }

    /// Model-to-world transform, composed up the parent chain on every call
    pub fn world_transform(&self, id: NodeId) -> Option<Mat4> {
        let node = self.get(id)?;
        let mut world = node.transform;
        let mut parent = node.parent;
        while let Some(p) = parent {
            let parent_node = self.get(p)?;
            world = parent_node.transform * world;
            parent = parent_node.parent;
        }
        Some(world)
    }

    /// World-space position of `id`
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_transform(id).map(|w| w.translation_part())
    }

    /// Turn `id` so that its local +Z axis points at `target` in world space
    ///
    /// `up` resolves the roll. Degenerate requests (target at the node
    /// position, `up` parallel to the look direction, singular parent
    /// transform) leave the node untouched.
    pub fn look_at(&mut self, id: NodeId, target: Vec3, up: Vec3) -> Result<(), SceneError> {
        let world = self.world_transform(id).ok_or(SceneError::StaleNode(id))?;
        let position = world.translation_part();

        let direction = target - position;
        if direction.norm_squared() < LOOK_AT_EPSILON * LOOK_AT_EPSILON {
            log::trace!("look_at on {:?}: target coincides with node position", id);
            return Ok(());
        }
        let forward = direction.normalize();
        let right = up.cross(&forward);
        if right.norm_squared() < LOOK_AT_EPSILON {
            log::trace!("look_at on {:?}: up vector parallel to view direction", id);
            return Ok(());
        }
        let right = right.normalize();
        let true_up = forward.cross(&right);

        let desired_world = Mat4::from_basis(right, true_up, forward, position);
        let parent_inverse = match self.parent(id) {
            Some(parent) => {
                let parent_world =
                    self.world_transform(parent).ok_or(SceneError::StaleNode(parent))?;
                match parent_world.affine_inverse() {
                    Some(inverse) => inverse,
                    None => {
                        log::warn!("look_at on {:?}: parent transform is singular", id);
                        return Ok(());
                    }
                }
            }
            None => Mat4::identity(),
        };

        let old_local = self.node(id)?.transform;
        let mut local = parent_inverse * desired_world;
        // Keep the node's own scale, only the orientation changes
        for axis in 0..3 {
            let scale = old_local.basis(axis).norm();
            let column = local.basis(axis);
            let length = column.norm();
            if length > LOOK_AT_EPSILON {
                local.set_basis(axis, column * (scale / length));
            }
        }
        local.set_translation_part(old_local.translation_part());

        self.set_transform(id, local)
    }

    /// [`look_at`](Self::look_at) the world position of another node
    pub fn look_at_node(&mut self, id: NodeId, target: NodeId, up: Vec3) -> Result<(), SceneError> {
        let target_position = self.world_position(target).ok_or(SceneError::StaleNode(target))?;
        self.look_at(id, target_position, up)
    }

    // ------------------------------------------------------------------
    // Node state
    // ------------------------------------------------------------------

    /// Enable or disable a node
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), SceneError> {
        self.node_mut(id)?.enabled = enabled;
        self.touch();
        Ok(())
    }

    /// Whether a node is enabled (`false` for stale handles)
    pub fn enabled(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(Node::enabled)
    }

    /// Node name
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(Node::name)
    }

    /// Rename a node
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// Set the integer user id
    pub fn set_user_id(&mut self, id: NodeId, user_id: i32) -> Result<(), SceneError> {
        self.node_mut(id)?.user_id = user_id;
        Ok(())
    }

    /// Attach opaque user data
    pub fn set_user_data(
        &mut self,
        id: NodeId,
        data: Option<Rc<dyn Any>>,
    ) -> Result<(), SceneError> {
        self.node_mut(id)?.user_data = data;
        Ok(())
    }

    /// Light payload of a light node
    pub fn light(&self, id: NodeId) -> Option<&Light> {
        self.get(id)?.light()
    }

    /// Mutable light payload of a light node
    ///
    /// Counts as a mutation: prepared frames collected before the call are
    /// no longer valid.
    pub fn light_mut(&mut self, id: NodeId) -> Option<&mut Light> {
        self.get(id)?.light()?;
        self.touch();
        match &mut self.nodes.get_mut(id)?.body {
            NodeBody::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Visual payload of a visual node
    pub fn visual(&self, id: NodeId) -> Option<&VisualSlot> {
        self.get(id)?.visual()
    }

    fn visual_slot_mut(&mut self, id: NodeId) -> Result<&mut VisualSlot, SceneError> {
        match &mut self.node_mut(id)?.body {
            NodeBody::Visual(slot) => Ok(slot),
            _ => Err(SceneError::StaleNode(id)),
        }
    }

    /// Recompute a visual's bound with [`Visual::compute_bound`]
    pub fn update_bound(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.visual_slot_mut(id)?.refresh_bound();
        self.touch();
        Ok(())
    }

    /// Override a visual's bound
    pub fn set_bound(&mut self, id: NodeId, bound: Bound) -> Result<(), SceneError> {
        self.visual_slot_mut(id)?.set_bound(bound);
        self.touch();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cloning
    // ------------------------------------------------------------------

    /// Deep copy of the subtree rooted at `id`
    ///
    /// The copy has the same class, transform, name and body (visuals are
    /// copied with [`Visual::clone_visual`]); children are cloned and linked
    /// in the original order. The returned root is unparented and carries one
    /// owner reference.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        let copy = self.node(id)?.duplicate();
        let copy_id = self.insert(copy);

        let children: Vec<NodeId> = self.children(id).collect();
        // link_to prepends, so link in reverse to keep the original order
        for child in children.into_iter().rev() {
            let child_copy = self.clone_subtree(child)?;
            self.link_to(child_copy, copy_id)?;
            self.node_mut(child_copy)?.owners = 0;
        }
        Ok(copy_id)
    }
}

/// Pre-order subtree iterator returned by [`SceneGraph::descendants`]
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    graph: &'a SceneGraph,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.next(current, self.root);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::LightType;
    use approx::assert_relative_eq;

    fn chain(graph: &mut SceneGraph) -> (NodeId, NodeId, NodeId) {
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let c = graph.create_node("c");
        graph.link_to(b, a).unwrap();
        graph.link_to(c, b).unwrap();
        (a, b, c)
    }

    /// Walk the child list of `parent` checking previous/next agree
    fn assert_sibling_list_consistent(graph: &SceneGraph, parent: NodeId) {
        let mut previous = None;
        for child in graph.children(parent) {
            let node = graph.get(child).unwrap();
            assert_eq!(node.previous(), previous);
            assert_eq!(node.parent(), Some(parent));
            previous = Some(child);
        }
    }

    #[test]
    fn test_link_prepends_and_sets_parent() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let first = graph.create_node("first");
        let second = graph.create_node("second");

        graph.link_to(first, root).unwrap();
        graph.link_to(second, root).unwrap();

        let children: Vec<_> = graph.children(root).collect();
        assert_eq!(children, vec![second, first]);
        assert_eq!(graph.parent(first), Some(root));
        assert_sibling_list_consistent(&graph, root);
    }

    #[test]
    fn test_cycle_rejection() {
        let mut graph = SceneGraph::new();
        let (a, b, c) = chain(&mut graph);

        assert_eq!(
            graph.link_to(a, c),
            Err(SceneError::CyclicLink {
                child: a,
                parent: c
            })
        );
        assert_eq!(
            graph.link_to(a, b),
            Err(SceneError::CyclicLink {
                child: a,
                parent: b
            })
        );
        assert_eq!(graph.link_to(b, b), Err(SceneError::SelfLink(b)));

        // Tree is untouched
        assert_eq!(graph.parent(c), Some(b));
        assert_eq!(graph.parent(b), Some(a));
        assert_eq!(graph.parent(a), None);
        assert_eq!(graph.depth(c), 2);
        assert_eq!(graph.root(c), Some(a));
    }

    #[test]
    fn test_link_moves_existing_child() {
        let mut graph = SceneGraph::new();
        let old_parent = graph.create_node("old");
        let new_parent = graph.create_node("new");
        let child = graph.create_node("child");

        graph.link_to(child, old_parent).unwrap();
        graph.link_to(child, new_parent).unwrap();

        assert_eq!(graph.first_child(old_parent), None);
        assert_eq!(graph.first_child(new_parent), Some(child));
    }

    #[test]
    fn test_unlink_idempotent_and_keeps_siblings_consistent() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let kids: Vec<_> = (0..4).map(|i| graph.create_node(format!("kid{i}"))).collect();
        for &kid in &kids {
            graph.link_to(kid, parent).unwrap();
        }

        // Remove one from the middle of the list
        graph.unlink(kids[2]).unwrap();
        assert_sibling_list_consistent(&graph, parent);
        assert_eq!(graph.children(parent).count(), 3);

        // Second unlink is a no-op
        graph.unlink(kids[2]).unwrap();
        assert_sibling_list_consistent(&graph, parent);
        assert_eq!(graph.children(parent).count(), 3);
        assert!(graph.contains(kids[2]));

        // Head and tail removal
        graph.unlink(kids[3]).unwrap();
        graph.unlink(kids[0]).unwrap();
        assert_sibling_list_consistent(&graph, parent);
        assert_eq!(graph.children(parent).collect::<Vec<_>>(), vec![kids[1]]);
    }

    #[test]
    fn test_unlink_destroys_unowned_node() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let child = graph.create_node("child");
        graph.link_to(child, parent).unwrap();
        graph.release(child).unwrap();
        assert!(graph.contains(child), "parent link keeps the child alive");

        graph.unlink(child).unwrap();
        assert!(!graph.contains(child));
    }

    #[test]
    fn test_destroying_parent_orphans_owned_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let kept = graph.create_node("kept");
        let dropped = graph.create_node("dropped");
        let grandchild = graph.create_node("grandchild");
        graph.link_to(kept, parent).unwrap();
        graph.link_to(dropped, parent).unwrap();
        graph.link_to(grandchild, dropped).unwrap();
        graph.release(dropped).unwrap();
        graph.release(grandchild).unwrap();

        graph.release(parent).unwrap();

        assert!(!graph.contains(parent));
        assert!(!graph.contains(dropped));
        assert!(!graph.contains(grandchild));
        assert!(graph.contains(kept));
        assert_eq!(graph.parent(kept), None);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_release_without_owner_fails() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let child = graph.create_node("child");
        graph.link_to(child, parent).unwrap();
        graph.release(child).unwrap();
        assert_eq!(graph.release(child), Err(SceneError::NotOwned(child)));
    }

    #[test]
    fn test_next_preorder_traversal() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let a1 = graph.create_node("a1");
        let a2 = graph.create_node("a2");
        graph.link_to(b, root).unwrap();
        graph.link_to(a, root).unwrap();
        graph.link_to(a2, a).unwrap();
        graph.link_to(a1, a).unwrap();

        let order: Vec<_> = graph.descendants(root).collect();
        assert_eq!(order, vec![root, a, a1, a2, b]);

        // Sub-traversal does not escape into the root's siblings
        let sub: Vec<_> = graph.descendants(a).collect();
        assert_eq!(sub, vec![a, a1, a2]);
        assert_eq!(graph.next(a2, a), None);
    }

    #[test]
    fn test_flatten_parent_before_child() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let mut parents = vec![root];
        for i in 0..20 {
            let node = graph.create_node(format!("n{i}"));
            let parent = parents[i % parents.len()];
            graph.link_to(node, parent).unwrap();
            parents.push(node);
        }

        let mut order = Vec::new();
        graph.flatten(root, &mut order);
        assert_eq!(order.len(), 21);
        for (index, &id) in order.iter().enumerate() {
            if let Some(parent) = graph.parent(id) {
                let parent_index = order.iter().position(|&n| n == parent).unwrap();
                assert!(parent_index < index);
            }
        }
    }

    #[test]
    fn test_world_transform_composes_chain() {
        let mut graph = SceneGraph::new();
        let (a, b, c) = chain(&mut graph);
        graph.set_position(b, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        graph
            .set_transform(c, Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)))
            .unwrap();
        let quarter_turn = Mat4::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2);
        graph.set_transform(a, quarter_turn).unwrap();

        let world = graph.world_transform(c).unwrap();
        // Rotating +X by 90 degrees about Y gives -Z
        assert_relative_eq!(
            world.translation_part(),
            Vec3::new(0.0, 5.0, -10.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_look_at_points_forward_axis_at_target() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_node("parent");
        let eye = graph.create_node("eye");
        graph.link_to(eye, parent).unwrap();
        graph
            .set_transform(parent, Mat4::from_axis_angle(&Vec3::x_axis(), 0.4))
            .unwrap();
        graph.set_position(eye, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        let target = Vec3::new(-4.0, 0.0, 9.0);
        graph.look_at(eye, target, Vec3::y()).unwrap();

        let world = graph.world_transform(eye).unwrap();
        let expected = (target - world.translation_part()).normalize();
        assert_relative_eq!(world.basis(2).normalize(), expected, epsilon = 1e-5);
        // Roll: right axis stays horizontal
        assert_relative_eq!(world.basis(0).y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_degenerate_is_noop() {
        let mut graph = SceneGraph::new();
        let eye = graph.create_node("eye");
        graph.set_position(eye, Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let before = *graph.transform(eye).unwrap();

        graph.look_at(eye, Vec3::new(1.0, 1.0, 1.0), Vec3::y()).unwrap();
        assert_eq!(*graph.transform(eye).unwrap(), before);

        graph.look_at(eye, Vec3::new(1.0, 5.0, 1.0), Vec3::y()).unwrap();
        assert_eq!(*graph.transform(eye).unwrap(), before);
    }

    #[test]
    fn test_look_at_node_faces_other_node() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let eye = graph.create_node("eye");
        let target = graph.create_node("target");
        graph.link_to(eye, root).unwrap();
        graph.link_to(target, root).unwrap();
        graph.set_position(root, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        graph.set_position(target, Vec3::new(10.0, 0.0, 0.0)).unwrap();

        graph.look_at_node(eye, target, Vec3::y()).unwrap();
        let world = graph.world_transform(eye).unwrap();
        assert_relative_eq!(world.basis(2).normalize(), Vec3::x(), epsilon = 1e-5);

        graph.release(target).unwrap();
        graph.unlink(target).unwrap();
        assert_eq!(
            graph.look_at_node(eye, target, Vec3::y()),
            Err(SceneError::StaleNode(target))
        );
    }

    #[test]
    fn test_user_id_and_data() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("tagged");
        assert_eq!(graph.get(node).unwrap().user_id(), 0);
        assert!(graph.get(node).unwrap().user_data().is_none());

        let payload: Rc<dyn Any> = Rc::new(String::from("payload"));
        graph.set_user_id(node, 42).unwrap();
        graph.set_user_data(node, Some(payload)).unwrap();

        let stored = graph.get(node).unwrap();
        assert_eq!(stored.user_id(), 42);
        let data = stored.user_data().and_then(|d| d.downcast_ref::<String>());
        assert_eq!(data.map(String::as_str), Some("payload"));

        // Copies keep the id
        let copy = graph.clone_subtree(node).unwrap();
        assert_eq!(graph.get(copy).unwrap().user_id(), 42);

        graph.release(node).unwrap();
        assert_eq!(graph.set_user_id(node, 1), Err(SceneError::StaleNode(node)));
    }

    #[test]
    fn test_light_mut_bumps_revision() {
        let mut graph = SceneGraph::new();
        let lamp = graph.create_light("lamp", Light::default());
        let plain = graph.create_node("plain");

        let before = graph.revision();
        graph.light_mut(lamp).unwrap().light_type = LightType::Directional;
        assert!(graph.revision() > before);
        let light_type = graph.light(lamp).map(|light| light.light_type);
        assert_eq!(light_type, Some(LightType::Directional));

        let before = graph.revision();
        assert!(graph.light_mut(plain).is_none());
        assert_eq!(graph.revision(), before);
    }

    #[test]
    fn test_clone_subtree_preserves_structure() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let left = graph.create_node("left");
        let right = graph.create_node("right");
        let light = graph.create_light("lamp", Light::default());
        graph.link_to(right, root).unwrap();
        graph.link_to(left, root).unwrap();
        graph.link_to(light, left).unwrap();
        graph.set_position(left, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        let copy = graph.clone_subtree(root).unwrap();
        assert_ne!(copy, root);
        assert_eq!(graph.parent(copy), None);
        assert_eq!(graph.owner_count(copy), Some(1));

        let names: Vec<_> = graph
            .descendants(copy)
            .map(|id| graph.name(id).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["root", "left", "lamp", "right"]);

        let left_copy = graph.find_by_name(copy, "left").unwrap();
        assert_ne!(left_copy, left);
        assert_eq!(graph.transform(left_copy), graph.transform(left));
        let lamp_copy = graph.find_by_name(copy, "lamp").unwrap();
        assert_eq!(graph.get(lamp_copy).unwrap().class(), NodeClass::Light);
        assert_eq!(graph.owner_count(lamp_copy), Some(0));
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("n");
        let before = graph.revision();
        graph.set_position(node, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(graph.revision() > before);

        let before = graph.revision();
        graph.set_name(node, "renamed").unwrap();
        assert_eq!(graph.revision(), before);
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("n");
        let other = graph.create_node("other");
        graph.release(node).unwrap();

        assert!(!graph.contains(node));
        assert_eq!(graph.link_to(node, other), Err(SceneError::StaleNode(node)));
        assert!(graph.world_transform(node).is_none());
        assert_eq!(graph.descendants(node).count(), 0);
    }
}
