/// Maximum keys per node (order-5 tree)
pub const MAX_KEYS: usize = 4;

/// Minimum keys in a non-root node
pub const MIN_KEYS: usize = MAX_KEYS / 2;

/// One node of the B-tree. Leaves carry key/value pairs; internal nodes
/// additionally carry `keys.len() + 1` children.
#[derive(Debug)]
pub struct BTreeNode<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
    pub children: Vec<Box<BTreeNode<K, V>>>,
}

impl<K, V> BTreeNode<K, V> {
    pub fn leaf() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_KEYS),
            values: Vec::with_capacity(MAX_KEYS),
            children: Vec::new(),
        }
    }

    pub fn internal() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_KEYS),
            values: Vec::with_capacity(MAX_KEYS),
            children: Vec::with_capacity(MAX_KEYS + 1),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.keys.len() >= MAX_KEYS
    }
}
