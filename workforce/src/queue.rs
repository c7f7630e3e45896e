//! Doubly linked chunk queues threaded through an index array.
//!
//! Node 0 and node 1 are the sentinels of the pending and completed queues;
//! chunk `i` lives at node `i + 2`. Every chunk node is linked into exactly one
//! of the two queues.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Queue {
    Pending,
    Completed,
}

impl Queue {
    fn sentinel(self) -> usize {
        match self {
            Queue::Pending => 0,
            Queue::Completed => 1,
        }
    }
}

/// Where the next inserted chunk goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    /// Append to the tail of the pending queue.
    Tail,
    /// Insert right before this chunk.
    Before(usize),
}

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: usize,
    next: usize,
}

const SENTINELS: usize = 2;

#[derive(Debug)]
pub(crate) struct Queues {
    links: Vec<Link>,
    lens: [usize; 2],
}

impl Queues {
    pub fn new() -> Self {
        let mut queues = Self {
            links: Vec::new(),
            lens: [0; 2],
        };
        queues.reset();
        queues
    }

    /// Empties both queues, keeping the allocated capacity.
    pub fn reset(&mut self) {
        self.links.clear();
        self.links.push(Link { prev: 0, next: 0 });
        self.links.push(Link { prev: 1, next: 1 });
        self.lens = [0; 2];
    }

    /// Adds chunk `chunk`, which must be the next unused index, at `cursor`.
    pub fn insert(&mut self, chunk: usize, cursor: Cursor) {
        debug_assert_eq!(chunk + SENTINELS, self.links.len());

        let node = self.links.len();
        self.links.push(Link {
            prev: node,
            next: node,
        });

        let at = match cursor {
            Cursor::Tail => Queue::Pending.sentinel(),
            Cursor::Before(other) => other + SENTINELS,
        };
        self.link_before(node, at);
        self.lens[Queue::Pending as usize] += 1;
    }

    /// Moves `chunk` from wherever it is to the tail of `queue`.
    pub fn move_to_tail(&mut self, chunk: usize, from: Queue, to: Queue) {
        let node = chunk + SENTINELS;

        self.unlink(node);
        self.lens[from as usize] -= 1;
        self.link_before(node, to.sentinel());
        self.lens[to as usize] += 1;
    }

    pub fn head(&self, queue: Queue) -> Option<usize> {
        let sentinel = queue.sentinel();
        let first = self.links[sentinel].next;
        (first != sentinel).then(|| first - SENTINELS)
    }

    /// Returns the chunks of `queue` from head to tail.
    pub fn iter(&self, queue: Queue) -> impl Iterator<Item = usize> + '_ {
        let sentinel = queue.sentinel();
        let mut node = self.links[sentinel].next;

        std::iter::from_fn(move || {
            if node == sentinel {
                return None;
            }

            let chunk = node - SENTINELS;
            node = self.links[node].next;
            Some(chunk)
        })
    }

    pub fn len(&self, queue: Queue) -> usize {
        self.lens[queue as usize]
    }

    pub fn is_empty(&self, queue: Queue) -> bool {
        self.len(queue) == 0
    }

    fn unlink(&mut self, node: usize) {
        let Link { prev, next } = self.links[node];
        self.links[prev].next = next;
        self.links[next].prev = prev;
    }

    fn link_before(&mut self, node: usize, at: usize) {
        let prev = self.links[at].prev;
        self.links[node] = Link { prev, next: at };
        self.links[prev].next = node;
        self.links[at].prev = node;
    }
}
