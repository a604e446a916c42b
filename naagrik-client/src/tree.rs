use std::{collections::HashMap, sync::Arc};

use crate::{
    api::{self, CommentId},
    Comment, CommentNode,
};

/// The discussion thread of one issue.
///
/// Comments live in an arena keyed by id, each node knowing its parent and
/// the ordered ids of its replies. The collections are persistent, so a
/// mutation returns a new tree that shares every untouched node with the old
/// one, and the old tree stays valid as-is.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentTree {
    nodes: im::HashMap<CommentId, CommentNode>,
    roots: im::Vector<CommentId>,
}

impl CommentTree {
    /// Builds the arena from the server's nested forest.
    ///
    /// The nesting is authoritative, the `parent_id` fields of the input are
    /// ignored. A comment whose id was already seen is dropped along with its
    /// replies.
    pub fn from_forest(forest: Vec<api::Comment>) -> CommentTree {
        let mut tree = CommentTree::default();
        for c in forest {
            tree.attach(None, c, false);
        }
        tree
    }

    /// Materializes the nested shape back, e.g. for serialization
    pub fn to_forest(&self) -> Vec<api::Comment> {
        let preorder = self.depth_first().map(|(_, n)| n).collect::<Vec<_>>();
        let mut built = HashMap::with_capacity(preorder.len());
        // in reverse preorder, every reply is built before its parent
        for node in preorder.into_iter().rev() {
            let replies = node
                .children
                .iter()
                .filter_map(|c| built.remove(c))
                .collect::<Vec<_>>();
            built.insert(node.id().clone(), node.to_api(replies));
        }
        self.roots.iter().filter_map(|r| built.remove(r)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &CommentId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &CommentId) -> Option<&CommentNode> {
        self.nodes.get(id)
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Arc<Comment>> {
        self.nodes.get(id).map(|n| &n.comment)
    }

    pub fn parent_of(&self, id: &CommentId) -> Option<&CommentId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    pub fn roots(&self) -> impl Iterator<Item = &CommentNode> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn children<'a>(&'a self, id: &CommentId) -> impl Iterator<Item = &'a CommentNode> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|n| n.children.iter())
            .filter_map(|c| self.nodes.get(c))
    }

    /// Number of direct replies
    pub fn reply_count(&self, id: &CommentId) -> Option<usize> {
        self.nodes.get(id).map(|n| n.reply_count())
    }

    /// Number of transitive replies, not counting the comment itself
    pub fn descendant_count(&self, id: &CommentId) -> Option<usize> {
        self.subtree_ids(id).map(|ids| ids.len() - 1)
    }

    /// 0 for a top-level comment
    pub fn depth(&self, id: &CommentId) -> Option<usize> {
        let mut node = self.nodes.get(id)?;
        let mut depth = 0;
        while let Some(p) = &node.parent {
            node = self.nodes.get(p)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Ids of the comment and of all its transitive replies, in preorder
    pub fn subtree_ids(&self, id: &CommentId) -> Option<Vec<CommentId>> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let mut res = Vec::new();
        let mut todo = vec![id];
        while let Some(id) = todo.pop() {
            if let Some(node) = self.nodes.get(id) {
                res.push(id.clone());
                todo.extend(node.children.iter().rev());
            }
        }
        Some(res)
    }

    /// Walks the whole thread depth-first, yielding each comment with its depth
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            todo: self.roots.iter().rev().map(|id| (0, id)).collect(),
        }
    }

    /// Returns a tree where `reply` is the last reply of `parent_id`.
    ///
    /// If `parent_id` is not in the tree, or `reply`'s id already is, the
    /// returned tree is the same as `self`.
    pub fn insert_reply(&self, parent_id: &CommentId, reply: api::Comment) -> CommentTree {
        if !self.contains(parent_id) {
            tracing::debug!(?parent_id, reply_id = ?reply.id, "reply to a comment not in the tree, ignoring");
            return self.clone();
        }
        let mut res = self.clone();
        match res.attach(Some(parent_id.clone()), reply, false) {
            true => res,
            false => self.clone(),
        }
    }

    /// Returns a tree where `comment` is the first top-level comment
    pub fn insert_root(&self, comment: api::Comment) -> CommentTree {
        let mut res = self.clone();
        match res.attach(None, comment, true) {
            true => res,
            false => self.clone(),
        }
    }

    /// Returns a tree without `target_id` and all of its transitive replies.
    ///
    /// The parent's reply list shrinks by one. If `target_id` is not in the
    /// tree, the returned tree is the same as `self`.
    pub fn remove_subtree(&self, target_id: &CommentId) -> CommentTree {
        let removed = match self.subtree_ids(target_id) {
            Some(ids) => ids,
            None => return self.clone(),
        };
        let mut res = self.clone();
        let siblings = match self.parent_of(target_id) {
            Some(p) => match res.nodes.get_mut(p) {
                Some(parent) => &mut parent.children,
                None => {
                    tracing::error!(?target_id, parent_id = ?p, "comment has a parent that is not in the tree");
                    return self.clone();
                }
            },
            None => &mut res.roots,
        };
        if let Some(idx) = siblings.index_of(target_id) {
            siblings.remove(idx);
        }
        for id in removed.iter() {
            res.nodes.remove(id);
        }
        res
    }

    /// Inserts `comment` and its nested replies, below `parent` or as a root.
    ///
    /// Returns false, leaving `self` untouched, if `comment`'s own id is
    /// already taken. Nested replies with a taken id are skipped.
    fn attach(&mut self, parent: Option<CommentId>, comment: api::Comment, at_front: bool) -> bool {
        if self.nodes.contains_key(&comment.id) {
            tracing::warn!(comment_id = ?comment.id, "comment is already in the tree, not inserting it twice");
            return false;
        }
        let mut is_top = true;
        let mut todo = vec![(parent, comment)];
        while let Some((parent, c)) = todo.pop() {
            if self.nodes.contains_key(&c.id) {
                tracing::warn!(comment_id = ?c.id, "dropping repeated comment and its replies");
                continue;
            }
            let (comment, replies) = Comment::split(c);
            let id = comment.id.clone();
            match &parent {
                Some(p) => match self.nodes.get_mut(p) {
                    Some(p) => p.children.push_back(id.clone()),
                    None => continue,
                },
                None if is_top && at_front => self.roots.push_front(id.clone()),
                None => self.roots.push_back(id.clone()),
            }
            is_top = false;
            todo.extend(replies.into_iter().rev().map(|r| (Some(id.clone()), r)));
            self.nodes.insert(
                id,
                CommentNode {
                    comment: Arc::new(comment),
                    parent,
                    children: im::Vector::new(),
                },
            );
        }
        true
    }
}

pub struct DepthFirst<'a> {
    tree: &'a CommentTree,
    todo: Vec<(usize, &'a CommentId)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a CommentNode);

    fn next(&mut self) -> Option<(usize, &'a CommentNode)> {
        loop {
            let (depth, id) = self.todo.pop()?;
            if let Some(node) = self.tree.nodes.get(id) {
                self.todo
                    .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
                return Some((depth, node));
            }
        }
    }
}
