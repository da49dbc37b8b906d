use std::collections::BTreeMap;

/// Prefix tree from cleaned names to display names, used for autocomplete.
#[derive(Debug, Default)]
pub struct NameTrie {
    root: TrieNode,
    len: usize,
}

#[derive(Debug, Default)]
struct TrieNode {
    value: Option<String>,
    children: BTreeMap<char, TrieNode>,
}

impl NameTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&mut self, key: &str, value: &str) {
        let mut node = &mut self.root;
        for c in key.chars() {
            node = node.children.entry(c).or_default();
        }
        if node.value.replace(value.to_string()).is_none() {
            self.len += 1;
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).and_then(|node| node.value.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Values of every key starting with `prefix`, in key order.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(node) = self.find(prefix) {
            collect(node, &mut names);
        }
        names
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn find(&self, key: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for c in key.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }
}

fn collect(node: &TrieNode, out: &mut Vec<String>) {
    if let Some(value) = &node.value {
        out.push(value.clone());
    }
    for child in node.children.values() {
        collect(child, out);
    }
}
