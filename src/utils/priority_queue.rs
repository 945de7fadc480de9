//! Binary max-heap ordered by a numeric priority

#[derive(Debug, Clone)]
pub struct PriorityQueueNode<T> {
    pub value: T,
    pub priority: i64,
}

impl<T> PriorityQueueNode<T> {
    pub fn new(value: T, priority: i64) -> Self {
        Self { value, priority }
    }
}

/// Max-heap over a vector: every parent's priority is at least that of its
/// children, so the root is always the highest-priority node.
///
/// Nodes of equal priority come out in heap order, which is not guaranteed to
/// be insertion order.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    heap: Vec<PriorityQueueNode<T>>,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Value with the highest priority, without removing it
    pub fn peek(&self) -> Option<&T> {
        self.heap.first().map(|node| &node.value)
    }

    pub fn push(&mut self, node: PriorityQueueNode<T>) {
        self.heap.push(node);
        self.sift_up(self.heap.len() - 1);
    }

    pub fn add(&mut self, value: T, priority: i64) {
        self.push(PriorityQueueNode::new(value, priority));
    }

    /// Remove and return the highest-priority value
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        top.map(|node| node.value)
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].priority <= self.heap[parent].priority {
                break;
            }
            self.heap.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            if left >= len {
                break;
            }
            let child = if right < len && self.heap[right].priority > self.heap[left].priority {
                right
            } else {
                left
            };
            if self.heap[child].priority <= self.heap[index].priority {
                break;
            }
            self.heap.swap(index, child);
            index = child;
        }
    }
}
