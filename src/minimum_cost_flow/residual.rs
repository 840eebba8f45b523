//! Residual network arena used by the cost-scaling kernel.
//!
//! Every user arc is stored as a pair of half-arcs linked through `sister`
//! indices. The outgoing half-arcs of a node (forward halves of its outgoing
//! arcs plus reverse halves of its incoming ones) occupy one contiguous
//! block, partitioned as `[active | suspended | closed]` by the `susp` and
//! `closed` boundaries. Arcs move across a boundary by an in-block exchange
//! that patches the sister links and the user-arc position map, so the
//! sister of a half-arc is an explicit index rather than an XOR neighbour.

use crate::numeric::Scalar;

pub(crate) const NONE: usize = usize::MAX;

#[derive(Clone, Debug)]
pub(crate) struct HalfArc<F, C> {
    pub head: usize,
    pub sister: usize,
    pub r_cap: F,
    /// Scaled by the node count of the instance; negated on reverse halves.
    pub cost: C,
    /// `k + 1` for the forward half of user arc `k`, `-k - 1` for the
    /// reverse half.
    pub position: isize,
}

impl<F: Scalar, C: Scalar> HalfArc<F, C> {
    #[inline]
    pub fn arc_id(&self) -> usize {
        (self.position.unsigned_abs()) - 1
    }

    #[inline]
    pub fn is_forward(&self) -> bool {
        self.position > 0
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Node<F, C> {
    pub excess: F,
    pub price: C,
    /// Block bounds: active `[first, susp)`, suspended `[susp, closed)`,
    /// closed `[closed, stop)`.
    pub first: usize,
    pub susp: usize,
    pub closed: usize,
    pub stop: usize,
    /// Scan pointer of `discharge`, within the active region.
    pub current: usize,
}

/// Per-arc data carried across an adjacency rebuild.
#[derive(Clone, Debug)]
pub(crate) struct ArcSnap<F, C> {
    pub tail: usize,
    pub head: usize,
    pub r_cap: F,
    pub flow: F,
    pub cost: C,
    pub closed: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Residual<F, C> {
    pub nodes: Vec<Node<F, C>>,
    pub arcs: Vec<HalfArc<F, C>>,
    /// User arc id to forward half-arc index.
    pub pos: Vec<usize>,
    /// User arcs loaded or re-capacitated with `F::inf()`.
    pub uncapped: Vec<bool>,
}

impl<F: Scalar, C: Scalar> Residual<F, C> {
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.arcs.clear();
        self.pos.clear();
        self.uncapped.clear();
    }

    pub fn reserve(&mut self, nmax: usize, mmax: usize) {
        self.nodes.reserve(nmax);
        self.arcs.reserve(2 * mmax);
        self.pos.reserve(mmax);
        self.uncapped.reserve(mmax);
    }

    /// Lays the half-arc pairs out in per-node blocks, preserving node
    /// excesses and prices. Closed snapshots end up behind the closed
    /// boundary of both endpoint blocks (their flow is zero by then).
    pub fn layout(&mut self, num_nodes: usize, snaps: &[ArcSnap<F, C>]) {
        let m = snaps.len();
        self.nodes.resize(num_nodes, Node::default());
        self.arcs.clear();
        self.arcs.resize(
            2 * m,
            HalfArc { head: 0, sister: 0, r_cap: F::zero(), cost: C::zero(), position: 0 },
        );
        self.pos.clear();
        self.pos.resize(m, NONE);

        // inp: per-node count of half-arcs, then prefix sums into blocks
        let mut inp = vec![0usize; num_nodes];
        for snap in snaps {
            inp[snap.tail] += 1;
            inp[snap.head] += 1;
        }
        let mut start = 0;
        for (v, node) in self.nodes.iter_mut().enumerate() {
            node.first = start;
            node.current = start;
            start += inp[v];
            node.susp = start;
            node.closed = start;
            node.stop = start;
        }

        let mut cursor = vec![0usize; num_nodes];
        for (k, snap) in snaps.iter().enumerate() {
            let fwd = self.nodes[snap.tail].first + cursor[snap.tail];
            cursor[snap.tail] += 1;
            let rev = self.nodes[snap.head].first + cursor[snap.head];
            cursor[snap.head] += 1;

            self.arcs[fwd] = HalfArc {
                head: snap.head,
                sister: rev,
                r_cap: snap.r_cap,
                cost: snap.cost,
                position: k as isize + 1,
            };
            self.arcs[rev] = HalfArc {
                head: snap.tail,
                sister: fwd,
                r_cap: snap.flow,
                cost: -snap.cost,
                position: -(k as isize) - 1,
            };
            self.pos[k] = fwd;
        }

        for (k, snap) in snaps.iter().enumerate() {
            if snap.closed {
                self.close_pair(k);
            }
        }
    }

    /// Extracts the user-arc level view of the arena.
    pub fn snapshot(&self) -> Vec<ArcSnap<F, C>> {
        (0..self.pos.len())
            .map(|k| {
                let fwd = &self.arcs[self.pos[k]];
                let rev = &self.arcs[fwd.sister];
                ArcSnap {
                    tail: rev.head,
                    head: fwd.head,
                    r_cap: fwd.r_cap,
                    flow: rev.r_cap,
                    cost: fwd.cost,
                    closed: self.is_closed(k),
                }
            })
            .collect()
    }

    #[inline]
    pub fn tail_of_arc(&self, k: usize) -> usize {
        self.arcs[self.arcs[self.pos[k]].sister].head
    }

    #[inline]
    pub fn head_of_arc(&self, k: usize) -> usize {
        self.arcs[self.pos[k]].head
    }

    /// Flow currently on user arc `k` (the reverse half's residual).
    #[inline]
    pub fn flow_on(&self, k: usize) -> F {
        self.arcs[self.arcs[self.pos[k]].sister].r_cap
    }

    /// Capacity of user arc `k` as stored (clamped for uncapacitated arcs).
    #[inline]
    pub fn cap_raw(&self, k: usize) -> F {
        let fwd = &self.arcs[self.pos[k]];
        fwd.r_cap + self.arcs[fwd.sister].r_cap
    }

    /// Scaled cost of user arc `k`.
    #[inline]
    pub fn cost_of(&self, k: usize) -> C {
        self.arcs[self.pos[k]].cost
    }

    #[inline]
    pub fn is_closed(&self, k: usize) -> bool {
        let fwd = self.pos[k];
        fwd >= self.nodes[self.tail_of_arc(k)].closed
    }

    /// Reduced cost of the half-arc at `a`, outgoing from `tail`.
    #[inline]
    pub fn rc_at(&self, tail: usize, a: usize) -> C {
        let arc = &self.arcs[a];
        arc.cost + self.nodes[tail].price - self.nodes[arc.head].price
    }

    /// Moves `amount` units over the half-arc at `a`, updating both
    /// residuals and both endpoint excesses.
    #[inline]
    pub fn push(&mut self, tail: usize, a: usize, amount: F) {
        let sister = self.arcs[a].sister;
        let head = self.arcs[a].head;
        self.arcs[a].r_cap -= amount;
        self.arcs[sister].r_cap += amount;
        self.nodes[tail].excess -= amount;
        self.nodes[head].excess += amount;
    }

    /// Swaps two half-arc slots of the same block, patching sister links
    /// and the position map.
    pub fn exchange(&mut self, x: usize, y: usize) {
        if x == y {
            return;
        }
        self.arcs.swap(x, y);
        let sx = self.arcs[x].sister;
        self.arcs[sx].sister = x;
        let sy = self.arcs[y].sister;
        self.arcs[sy].sister = y;
        if self.arcs[x].is_forward() {
            self.pos[self.arcs[x].arc_id()] = x;
        }
        if self.arcs[y].is_forward() {
            self.pos[self.arcs[y].arc_id()] = y;
        }
    }

    /// Active -> suspended; `a` must lie in the active region of `v`.
    /// Returns the new index of the half-arc.
    pub fn suspend_half(&mut self, v: usize, a: usize) -> usize {
        let s = self.nodes[v].susp - 1;
        debug_assert!(a <= s && a >= self.nodes[v].first);
        self.exchange(a, s);
        self.nodes[v].susp = s;
        s
    }

    /// Suspended -> active; `a` must lie in the suspended region of `v`.
    pub fn activate_half(&mut self, v: usize, a: usize) -> usize {
        let s = self.nodes[v].susp;
        debug_assert!(a >= s && a < self.nodes[v].closed);
        self.exchange(a, s);
        self.nodes[v].susp = s + 1;
        s
    }

    /// Rotates a half-arc from anywhere in `[first, closed)` of `v` into
    /// the closed region.
    fn retire_half(&mut self, v: usize, mut a: usize) {
        if a < self.nodes[v].susp {
            a = self.suspend_half(v, a);
        }
        let c = self.nodes[v].closed - 1;
        debug_assert!(a <= c);
        self.exchange(a, c);
        self.nodes[v].closed = c;
    }

    /// Closed -> suspended.
    fn unretire_half(&mut self, v: usize, a: usize) {
        let c = self.nodes[v].closed;
        debug_assert!(a >= c && a < self.nodes[v].stop);
        self.exchange(a, c);
        self.nodes[v].closed = c + 1;
    }

    /// Moves both halves of user arc `k` behind the closed boundaries of
    /// their blocks. The arc must carry no flow.
    pub fn close_pair(&mut self, k: usize) {
        debug_assert!(self.flow_on(k) == F::zero());
        let tail = self.tail_of_arc(k);
        self.retire_half(tail, self.pos[k]);
        let fwd = self.pos[k];
        let head = self.arcs[fwd].head;
        let rev = self.arcs[fwd].sister;
        self.retire_half(head, rev);
    }

    /// Brings both halves of a closed arc back, into the suspended regions;
    /// refine or price-in re-admits them.
    pub fn reopen_pair(&mut self, k: usize) {
        let tail = self.tail_of_arc(k);
        self.unretire_half(tail, self.pos[k]);
        let fwd = self.pos[k];
        let head = self.arcs[fwd].head;
        let rev = self.arcs[fwd].sister;
        self.unretire_half(head, rev);
    }

    /// Whether any block has a non-empty suspended region.
    pub fn any_suspended(&self) -> bool {
        self.nodes.iter().any(|node| node.susp < node.closed)
    }

    /// Re-admits every suspended half-arc; regions are contiguous, so this
    /// is a pure boundary move.
    pub fn activate_all_suspended(&mut self) {
        for node in &mut self.nodes {
            node.susp = node.closed;
            node.current = node.first;
        }
    }
}

/// FIFO of nodes with positive excess; O(1) insert and pop through a
/// `next` side table.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExcessQueue {
    first: usize,
    last: usize,
    next: Vec<usize>,
}

impl ExcessQueue {
    pub fn reset(&mut self, num_nodes: usize) {
        self.first = NONE;
        self.last = NONE;
        self.next.clear();
        self.next.resize(num_nodes, NONE);
    }

    pub fn push_back(&mut self, v: usize) {
        self.next[v] = NONE;
        if self.last == NONE {
            self.first = v;
        } else {
            self.next[self.last] = v;
        }
        self.last = v;
    }

    pub fn push_front(&mut self, v: usize) {
        self.next[v] = self.first;
        self.first = v;
        if self.last == NONE {
            self.last = v;
        }
    }

    pub fn pop_front(&mut self) -> Option<usize> {
        if self.first == NONE {
            return None;
        }
        let v = self.first;
        self.first = self.next[v];
        if self.first == NONE {
            self.last = NONE;
        }
        Some(v)
    }
}

/// Dial's-algorithm buckets: `first`/`last` per rank, doubly-linked node
/// side tables. Ties are served in FIFO order.
#[derive(Clone, Debug, Default)]
pub(crate) struct Buckets {
    first: Vec<usize>,
    last: Vec<usize>,
    next: Vec<usize>,
    prev: Vec<usize>,
}

impl Buckets {
    pub fn reset(&mut self, num_ranks: usize, num_nodes: usize) {
        self.first.clear();
        self.first.resize(num_ranks, NONE);
        self.last.clear();
        self.last.resize(num_ranks, NONE);
        self.next.clear();
        self.next.resize(num_nodes, NONE);
        self.prev.clear();
        self.prev.resize(num_nodes, NONE);
    }

    pub fn insert(&mut self, rank: usize, v: usize) {
        self.next[v] = NONE;
        self.prev[v] = self.last[rank];
        if self.last[rank] == NONE {
            self.first[rank] = v;
        } else {
            self.next[self.last[rank]] = v;
        }
        self.last[rank] = v;
    }

    pub fn remove(&mut self, rank: usize, v: usize) {
        let (p, n) = (self.prev[v], self.next[v]);
        if p == NONE {
            self.first[rank] = n;
        } else {
            self.next[p] = n;
        }
        if n == NONE {
            self.last[rank] = p;
        } else {
            self.prev[n] = p;
        }
    }

    pub fn pop(&mut self, rank: usize) -> Option<usize> {
        let v = self.first[rank];
        if v == NONE {
            return None;
        }
        self.remove(rank, v);
        Some(v)
    }
}
