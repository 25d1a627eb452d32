//! Arena-indexed red-black tree.
//!
//! The classic Linux kernel layout steals two bits from the parent pointer
//! to store the node's color, which needs raw pointers and unsafe casts to
//! reconstruct. Here every link is an `Option<u32>` index into a fixed
//! `[Node<K>; N]` array owned by the tree, and the color sits in its own
//! field — same rebalancing algorithm, no pointer arithmetic.
//!
//! A node's slot index is chosen by the caller (the scheduler uses the
//! task id directly) so a task's tree membership can be looked up without
//! a separate id-to-slot table.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

#[derive(Clone, Copy)]
struct Node<K> {
    key: K,
    parent: Option<u32>,
    left: Option<u32>,
    right: Option<u32>,
    color: Color,
    linked: bool,
}

impl<K: Copy + Default> Default for Node<K> {
    fn default() -> Self {
        Self {
            key: K::default(),
            parent: None,
            left: None,
            right: None,
            color: Color::Red,
            linked: false,
        }
    }
}

/// A fixed-capacity red-black tree ordered by `K`. `N` is the slot count;
/// callers insert at a slot index of their choosing (must be `< N`).
pub struct RbTree<K, const N: usize> {
    nodes: [Node<K>; N],
    root: Option<u32>,
}

impl<K: Ord + Copy + Default, const N: usize> RbTree<K, N> {
    pub fn new() -> Self {
        Self {
            nodes: [Node::default(); N],
            root: None,
        }
    }

    pub fn is_linked(&self, slot: usize) -> bool {
        self.nodes[slot].linked
    }

    fn is_red(&self, n: Option<u32>) -> bool {
        n.is_some_and(|i| self.nodes[i as usize].color == Color::Red)
    }

    fn is_black(&self, n: Option<u32>) -> bool {
        !self.is_red(n)
    }

    fn set_color(&mut self, n: u32, c: Color) {
        self.nodes[n as usize].color = c;
    }

    fn parent_of(&self, n: u32) -> Option<u32> {
        self.nodes[n as usize].parent
    }

    fn set_parent(&mut self, n: u32, p: Option<u32>) {
        self.nodes[n as usize].parent = p;
    }

    /// Inserts `key` at `slot`, taking ownership of that arena slot.
    pub fn insert(&mut self, slot: usize, key: K) {
        let slot = slot as u32;
        debug_assert!(!self.nodes[slot as usize].linked);

        let mut parent = None;
        let mut link = self.root;
        let mut go_left = false;
        while let Some(cur) = link {
            parent = Some(cur);
            go_left = key < self.nodes[cur as usize].key;
            link = if go_left {
                self.nodes[cur as usize].left
            } else {
                self.nodes[cur as usize].right
            };
        }

        self.nodes[slot as usize] = Node {
            key,
            parent,
            left: None,
            right: None,
            color: Color::Red,
            linked: true,
        };

        match parent {
            None => self.root = Some(slot),
            Some(p) if go_left => self.nodes[p as usize].left = Some(slot),
            Some(p) => self.nodes[p as usize].right = Some(slot),
        }

        self.insert_fixup(slot);
    }

    fn rotate_left(&mut self, node: u32) {
        let right = self.nodes[node as usize].right.expect("rotate_left needs right child");
        let parent = self.parent_of(node);

        self.nodes[node as usize].right = self.nodes[right as usize].left;
        if let Some(l) = self.nodes[right as usize].left {
            self.set_parent(l, Some(node));
        }

        self.nodes[right as usize].left = Some(node);
        self.set_parent(right, parent);

        match parent {
            Some(p) if self.nodes[p as usize].left == Some(node) => {
                self.nodes[p as usize].left = Some(right)
            }
            Some(p) => self.nodes[p as usize].right = Some(right),
            None => self.root = Some(right),
        }
        self.set_parent(node, Some(right));
    }

    fn rotate_right(&mut self, node: u32) {
        let left = self.nodes[node as usize].left.expect("rotate_right needs left child");
        let parent = self.parent_of(node);

        self.nodes[node as usize].left = self.nodes[left as usize].right;
        if let Some(r) = self.nodes[left as usize].right {
            self.set_parent(r, Some(node));
        }

        self.nodes[left as usize].right = Some(node);
        self.set_parent(left, parent);

        match parent {
            Some(p) if self.nodes[p as usize].right == Some(node) => {
                self.nodes[p as usize].right = Some(left)
            }
            Some(p) => self.nodes[p as usize].left = Some(left),
            None => self.root = Some(left),
        }
        self.set_parent(node, Some(left));
    }

    fn insert_fixup(&mut self, mut node: u32) {
        while let Some(parent) = self.parent_of(node) {
            if self.is_black(Some(parent)) {
                break;
            }
            let gparent = self.parent_of(parent).expect("red node must have a black parent and grandparent");

            if Some(parent) == self.nodes[gparent as usize].left {
                let uncle = self.nodes[gparent as usize].right;
                if self.is_red(uncle) {
                    self.set_color(uncle.unwrap(), Color::Black);
                    self.set_color(parent, Color::Black);
                    self.set_color(gparent, Color::Red);
                    node = gparent;
                    continue;
                }
                if self.nodes[parent as usize].right == Some(node) {
                    self.rotate_left(parent);
                    node = parent;
                }
                let parent = self.parent_of(node).unwrap();
                let gparent = self.parent_of(parent).unwrap();
                self.set_color(parent, Color::Black);
                self.set_color(gparent, Color::Red);
                self.rotate_right(gparent);
            } else {
                let uncle = self.nodes[gparent as usize].left;
                if self.is_red(uncle) {
                    self.set_color(uncle.unwrap(), Color::Black);
                    self.set_color(parent, Color::Black);
                    self.set_color(gparent, Color::Red);
                    node = gparent;
                    continue;
                }
                if self.nodes[parent as usize].left == Some(node) {
                    self.rotate_right(parent);
                    node = parent;
                }
                let parent = self.parent_of(node).unwrap();
                let gparent = self.parent_of(parent).unwrap();
                self.set_color(parent, Color::Black);
                self.set_color(gparent, Color::Red);
                self.rotate_left(gparent);
            }
        }
        if let Some(root) = self.root {
            self.set_color(root, Color::Black);
        }
    }

    pub fn remove(&mut self, slot: usize) {
        let node = slot as u32;
        if !self.nodes[node as usize].linked {
            return;
        }

        let (child, parent, color);
        if self.nodes[node as usize].left.is_none() {
            child = self.nodes[node as usize].right;
            parent = self.parent_of(node);
            color = self.nodes[node as usize].color;
            self.replace_child(node, parent, child);
        } else if self.nodes[node as usize].right.is_none() {
            child = self.nodes[node as usize].left;
            parent = self.parent_of(node);
            color = self.nodes[node as usize].color;
            self.replace_child(node, parent, child);
        } else {
            // Successor: leftmost node in the right subtree.
            let mut succ = self.nodes[node as usize].right.unwrap();
            while let Some(l) = self.nodes[succ as usize].left {
                succ = l;
            }

            let succ_child = self.nodes[succ as usize].right;
            color = self.nodes[succ as usize].color;
            let succ_parent = if self.parent_of(succ) == Some(node) {
                node
            } else {
                let p = self.parent_of(succ).unwrap();
                self.nodes[p as usize].left = succ_child;
                if let Some(c) = succ_child {
                    self.set_parent(c, Some(p));
                }
                self.nodes[succ as usize].right = self.nodes[node as usize].right;
                self.set_parent(self.nodes[succ as usize].right.unwrap(), Some(succ));
                p
            };

            self.nodes[succ as usize].left = self.nodes[node as usize].left;
            self.set_parent(self.nodes[succ as usize].left.unwrap(), Some(succ));
            self.nodes[succ as usize].color = self.nodes[node as usize].color;

            let node_parent = self.parent_of(node);
            self.set_parent(succ, node_parent);
            match node_parent {
                Some(p) if self.nodes[p as usize].left == Some(node) => {
                    self.nodes[p as usize].left = Some(succ)
                }
                Some(p) => self.nodes[p as usize].right = Some(succ),
                None => self.root = Some(succ),
            }

            child = succ_child;
            parent = Some(succ_parent);
        }

        self.nodes[node as usize] = Node::default();

        if color == Color::Black {
            self.remove_fixup(child, parent);
        }
    }

    fn replace_child(&mut self, node: u32, parent: Option<u32>, child: Option<u32>) {
        if let Some(c) = child {
            self.set_parent(c, parent);
        }
        match parent {
            Some(p) if self.nodes[p as usize].left == Some(node) => {
                self.nodes[p as usize].left = child
            }
            Some(p) => self.nodes[p as usize].right = child,
            None => self.root = child,
        }
    }

    fn remove_fixup(&mut self, mut node: Option<u32>, mut parent: Option<u32>) {
        while node != self.root && self.is_black(node) {
            let Some(p) = parent else { break };
            if self.nodes[p as usize].left == node {
                let mut sibling = self.nodes[p as usize].right.expect("sibling must exist");
                if self.is_red(Some(sibling)) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p);
                    sibling = self.nodes[p as usize].right.unwrap();
                }
                if self.is_black(self.nodes[sibling as usize].left)
                    && self.is_black(self.nodes[sibling as usize].right)
                {
                    self.set_color(sibling, Color::Red);
                    node = Some(p);
                    parent = self.parent_of(p);
                } else {
                    if self.is_black(self.nodes[sibling as usize].right) {
                        if let Some(l) = self.nodes[sibling as usize].left {
                            self.set_color(l, Color::Black);
                        }
                        self.set_color(sibling, Color::Red);
                        self.rotate_right(sibling);
                        sibling = self.nodes[p as usize].right.unwrap();
                    }
                    self.set_color(sibling, self.nodes[p as usize].color);
                    self.set_color(p, Color::Black);
                    if let Some(r) = self.nodes[sibling as usize].right {
                        self.set_color(r, Color::Black);
                    }
                    self.rotate_left(p);
                    node = self.root;
                    break;
                }
            } else {
                let mut sibling = self.nodes[p as usize].left.expect("sibling must exist");
                if self.is_red(Some(sibling)) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p);
                    sibling = self.nodes[p as usize].left.unwrap();
                }
                if self.is_black(self.nodes[sibling as usize].left)
                    && self.is_black(self.nodes[sibling as usize].right)
                {
                    self.set_color(sibling, Color::Red);
                    node = Some(p);
                    parent = self.parent_of(p);
                } else {
                    if self.is_black(self.nodes[sibling as usize].left) {
                        if let Some(r) = self.nodes[sibling as usize].right {
                            self.set_color(r, Color::Black);
                        }
                        self.set_color(sibling, Color::Red);
                        self.rotate_left(sibling);
                        sibling = self.nodes[p as usize].left.unwrap();
                    }
                    self.set_color(sibling, self.nodes[p as usize].color);
                    self.set_color(p, Color::Black);
                    if let Some(l) = self.nodes[sibling as usize].left {
                        self.set_color(l, Color::Black);
                    }
                    self.rotate_right(p);
                    node = self.root;
                    break;
                }
            }
        }
        if let Some(n) = node {
            self.set_color(n, Color::Black);
        }
    }

    /// The slot holding the minimum key, i.e. the next task due.
    pub fn first(&self) -> Option<usize> {
        let mut n = self.root?;
        while let Some(l) = self.nodes[n as usize].left {
            n = l;
        }
        Some(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tracks_minimum_after_inserts_and_removes() {
        let mut t: RbTree<u64, 8> = RbTree::new();
        for (slot, key) in [(0, 50), (1, 10), (2, 30), (3, 5), (4, 40)] {
            t.insert(slot, key);
        }
        assert_eq!(t.first(), Some(3));

        t.remove(3);
        assert_eq!(t.first(), Some(1));

        t.remove(1);
        assert_eq!(t.first(), Some(2));
    }

    #[test]
    fn reinsert_after_remove_reuses_slot() {
        let mut t: RbTree<u64, 4> = RbTree::new();
        t.insert(0, 10);
        t.insert(1, 20);
        t.remove(0);
        assert!(!t.is_linked(0));
        t.insert(0, 5);
        assert_eq!(t.first(), Some(0));
    }

    #[test]
    fn many_inserts_keep_minimum_correct() {
        let mut t: RbTree<u64, 64> = RbTree::new();
        let keys: Vec<u64> = (0..64).map(|i| (i * 2654435761) % 1000).collect();
        for (slot, &key) in keys.iter().enumerate() {
            t.insert(slot, key);
        }
        let min = *keys.iter().min().unwrap();
        let first_slot = t.first().unwrap();
        assert_eq!(keys[first_slot], min);
    }
}
