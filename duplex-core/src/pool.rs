//! List arena: fixed pools of list heads and nodes, linked by index, with free chains.
//!
//! Every list lives inside one `ListPool`. Nodes and heads are allocated from the pool's free
//! chains and returned to them on removal, so memory is bounded by the capacities chosen at
//! construction and exhaustion shows up as `PoolExhausted` instead of growth.
//!
//! The pool does no locking; the owner serializes access.

/// Default number of list heads in a pool.
pub const LIST_MAX_NUM_HEADS: usize = 100;
/// Default number of nodes in a pool.
pub const LIST_MAX_NUM_NODES: usize = 1000;

/// Pool capacity reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolExhausted {
    #[error("list head pool exhausted")]
    Heads,
    #[error("list node pool exhausted")]
    Nodes,
}

/// Handle to a list allocated from a `ListPool`. Move-only: `free` and `concat` consume it.
#[derive(Debug, PartialEq, Eq)]
pub struct ListId(usize);

/// Iteration cursor. Out-of-bounds states remember which side was passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeStart,
    At(usize),
    BeyondEnd,
}

#[derive(Debug)]
struct Head {
    first: Option<usize>,
    last: Option<usize>,
    cursor: Cursor,
    count: usize,
    /// Free chain link while the head is unallocated.
    next_free: Option<usize>,
}

impl Head {
    fn vacant(next_free: Option<usize>) -> Self {
        Self {
            first: None,
            last: None,
            cursor: Cursor::BeforeStart,
            count: 0,
            next_free,
        }
    }
}

#[derive(Debug)]
struct Node<T> {
    item: Option<T>,
    /// Next node in the list, or next free node while unallocated.
    next: Option<usize>,
    prev: Option<usize>,
}

/// Fixed-capacity arena of doubly-linked lists.
#[derive(Debug)]
pub struct ListPool<T> {
    heads: Vec<Head>,
    nodes: Vec<Node<T>>,
    free_head: Option<usize>,
    free_node: Option<usize>,
    free_heads: usize,
    free_nodes: usize,
}

impl<T> ListPool<T> {
    /// Pool with the default capacities (`LIST_MAX_NUM_HEADS`, `LIST_MAX_NUM_NODES`).
    pub fn new() -> Self {
        Self::with_capacity(LIST_MAX_NUM_HEADS, LIST_MAX_NUM_NODES)
    }

    /// Pool with `heads` list heads and `nodes` nodes, all allocated up front.
    pub fn with_capacity(heads: usize, nodes: usize) -> Self {
        let heads_vec = (0..heads)
            .map(|i| Head::vacant(if i + 1 < heads { Some(i + 1) } else { None }))
            .collect();
        let nodes_vec = (0..nodes)
            .map(|i| Node {
                item: None,
                next: if i + 1 < nodes { Some(i + 1) } else { None },
                prev: None,
            })
            .collect();
        Self {
            heads: heads_vec,
            nodes: nodes_vec,
            free_head: if heads > 0 { Some(0) } else { None },
            free_node: if nodes > 0 { Some(0) } else { None },
            free_heads: heads,
            free_nodes: nodes,
        }
    }

    pub fn free_heads(&self) -> usize {
        self.free_heads
    }

    pub fn free_nodes(&self) -> usize {
        self.free_nodes
    }

    /// Allocate an empty list.
    pub fn create(&mut self) -> Result<ListId, PoolExhausted> {
        let idx = self.free_head.ok_or(PoolExhausted::Heads)?;
        self.free_head = self.heads[idx].next_free;
        self.heads[idx] = Head::vacant(None);
        self.free_heads -= 1;
        Ok(ListId(idx))
    }

    pub fn count(&self, list: &ListId) -> usize {
        self.heads[list.0].count
    }

    /// Move the cursor to the first item and return it.
    pub fn first(&mut self, list: &ListId) -> Option<&T> {
        let head = &mut self.heads[list.0];
        head.cursor = head.first.map_or(Cursor::BeforeStart, Cursor::At);
        self.current(list)
    }

    /// Move the cursor to the last item and return it.
    pub fn last(&mut self, list: &ListId) -> Option<&T> {
        let head = &mut self.heads[list.0];
        head.cursor = head.last.map_or(Cursor::BeyondEnd, Cursor::At);
        self.current(list)
    }

    /// Advance the cursor. Past the last item the cursor goes beyond the end and `None` is returned.
    pub fn next(&mut self, list: &ListId) -> Option<&T> {
        let head = &self.heads[list.0];
        let cursor = match head.cursor {
            Cursor::BeforeStart => head.first.map_or(Cursor::BeyondEnd, Cursor::At),
            Cursor::At(idx) => self.nodes[idx].next.map_or(Cursor::BeyondEnd, Cursor::At),
            Cursor::BeyondEnd => Cursor::BeyondEnd,
        };
        self.heads[list.0].cursor = cursor;
        self.current(list)
    }

    /// Move the cursor back. Before the first item the cursor goes before the start and `None` is returned.
    pub fn prev(&mut self, list: &ListId) -> Option<&T> {
        let head = &self.heads[list.0];
        let cursor = match head.cursor {
            Cursor::BeyondEnd => head.last.map_or(Cursor::BeforeStart, Cursor::At),
            Cursor::At(idx) => self.nodes[idx].prev.map_or(Cursor::BeforeStart, Cursor::At),
            Cursor::BeforeStart => Cursor::BeforeStart,
        };
        self.heads[list.0].cursor = cursor;
        self.current(list)
    }

    /// Item under the cursor, if the cursor is in bounds.
    pub fn current(&self, list: &ListId) -> Option<&T> {
        match self.heads[list.0].cursor {
            Cursor::At(idx) => self.nodes[idx].item.as_ref(),
            _ => None,
        }
    }

    /// Insert after the cursor; the new item becomes current.
    /// Before the start inserts at the front, beyond the end inserts at the back.
    pub fn insert_after(&mut self, list: &ListId, item: T) -> Result<(), PoolExhausted> {
        let head = &self.heads[list.0];
        let (prev, next) = match head.cursor {
            Cursor::BeforeStart => (None, head.first),
            Cursor::At(idx) => (Some(idx), self.nodes[idx].next),
            Cursor::BeyondEnd => (head.last, None),
        };
        self.insert_between(list, item, prev, next)
    }

    /// Insert before the cursor; the new item becomes current.
    /// Before the start inserts at the front, beyond the end inserts at the back.
    pub fn insert_before(&mut self, list: &ListId, item: T) -> Result<(), PoolExhausted> {
        let head = &self.heads[list.0];
        let (prev, next) = match head.cursor {
            Cursor::BeforeStart => (None, head.first),
            Cursor::At(idx) => (self.nodes[idx].prev, Some(idx)),
            Cursor::BeyondEnd => (head.last, None),
        };
        self.insert_between(list, item, prev, next)
    }

    /// Add to the back; the new item becomes current.
    pub fn append(&mut self, list: &ListId, item: T) -> Result<(), PoolExhausted> {
        let last = self.heads[list.0].last;
        self.insert_between(list, item, last, None)
    }

    /// Add to the front; the new item becomes current.
    pub fn prepend(&mut self, list: &ListId, item: T) -> Result<(), PoolExhausted> {
        let first = self.heads[list.0].first;
        self.insert_between(list, item, None, first)
    }

    /// Remove the current item and return it. The next item becomes current.
    pub fn remove(&mut self, list: &ListId) -> Option<T> {
        match self.heads[list.0].cursor {
            Cursor::At(idx) => Some(self.unlink(list, idx)),
            _ => None,
        }
    }

    /// Remove the first item.
    pub fn remove_front(&mut self, list: &ListId) -> Option<T> {
        let idx = self.heads[list.0].first?;
        Some(self.unlink(list, idx))
    }

    /// Remove the last item. The new last item becomes current.
    pub fn trim(&mut self, list: &ListId) -> Option<T> {
        let idx = self.heads[list.0].last?;
        let item = self.unlink(list, idx);
        let head = &mut self.heads[list.0];
        head.cursor = head.last.map_or(Cursor::BeforeStart, Cursor::At);
        Some(item)
    }

    /// Move every item of `other` to the back of `list` and return `other`'s head to the pool.
    /// The cursor of `list` is unchanged.
    pub fn concat(&mut self, list: &ListId, other: ListId) {
        let (o_first, o_last, o_count) = {
            let o = &self.heads[other.0];
            (o.first, o.last, o.count)
        };
        if let Some(o_first) = o_first {
            match self.heads[list.0].last {
                Some(last) => {
                    self.nodes[last].next = Some(o_first);
                    self.nodes[o_first].prev = Some(last);
                }
                None => self.heads[list.0].first = Some(o_first),
            }
            let head = &mut self.heads[list.0];
            head.last = o_last;
            head.count += o_count;
        }
        self.release_head(other.0);
    }

    /// Scan from the cursor for the first item matching `pred`; the match becomes current.
    /// Without a match the cursor goes beyond the end.
    pub fn search<F>(&mut self, list: &ListId, mut pred: F) -> Option<&T>
    where
        F: FnMut(&T) -> bool,
    {
        let head = &self.heads[list.0];
        let mut at = match head.cursor {
            Cursor::BeforeStart => head.first,
            Cursor::At(idx) => Some(idx),
            Cursor::BeyondEnd => None,
        };
        while let Some(idx) = at {
            let node = &self.nodes[idx];
            if node.item.as_ref().is_some_and(&mut pred) {
                self.heads[list.0].cursor = Cursor::At(idx);
                return self.current(list);
            }
            at = node.next;
        }
        self.heads[list.0].cursor = Cursor::BeyondEnd;
        None
    }

    /// Return every node and the head to the pool, handing each item to `item_free`.
    pub fn free<F>(&mut self, list: ListId, mut item_free: F)
    where
        F: FnMut(T),
    {
        while let Some(item) = self.remove_front(&list) {
            item_free(item);
        }
        self.release_head(list.0);
    }

    fn insert_between(
        &mut self,
        list: &ListId,
        item: T,
        prev: Option<usize>,
        next: Option<usize>,
    ) -> Result<(), PoolExhausted> {
        let idx = self.free_node.ok_or(PoolExhausted::Nodes)?;
        self.free_node = self.nodes[idx].next;
        self.free_nodes -= 1;
        self.nodes[idx] = Node {
            item: Some(item),
            next,
            prev,
        };
        let head = &mut self.heads[list.0];
        match prev {
            Some(p) => self.nodes[p].next = Some(idx),
            None => head.first = Some(idx),
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(idx),
            None => head.last = Some(idx),
        }
        head.count += 1;
        head.cursor = Cursor::At(idx);
        Ok(())
    }

    /// Unlink `idx` from `list` and return its item. A cursor on `idx` moves to the next node.
    fn unlink(&mut self, list: &ListId, idx: usize) -> T {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        let head = &mut self.heads[list.0];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => head.first = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => head.last = prev,
        }
        head.count -= 1;
        if head.cursor == Cursor::At(idx) {
            head.cursor = next.map_or(Cursor::BeyondEnd, Cursor::At);
        }
        let node = &mut self.nodes[idx];
        let item = node.item.take();
        node.prev = None;
        node.next = self.free_node;
        self.free_node = Some(idx);
        self.free_nodes += 1;
        // Linked nodes always carry an item.
        match item {
            Some(item) => item,
            None => unreachable!("linked node without item"),
        }
    }

    fn release_head(&mut self, idx: usize) {
        self.heads[idx] = Head::vacant(self.free_head);
        self.free_head = Some(idx);
        self.free_heads += 1;
    }
}

impl<T> Default for ListPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
