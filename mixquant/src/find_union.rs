/// Union-find over `0..size`, used to split the transcript-fragment graph
/// into connected components.
#[derive(Debug, Clone, Default)]
pub struct FindUnion {
    /// The vector of parents. If parents[i] = j, the j-th node represents
    /// the component in which the i-th node resides.
    parents: Vec<usize>,
    /// The size of each component. Valid only at the representative of a component.
    sizes: Vec<Option<usize>>,
    /// Number of nodes.
    length: usize,
}

impl FindUnion {
    pub fn new(size: usize) -> Self {
        let parents = (0..size).collect();
        let sizes = (0..size).map(|_| Some(1)).collect();
        FindUnion {
            parents,
            sizes,
            length: size,
        }
    }
    pub fn len(&self) -> usize {
        self.length
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    /// Find the representative of the node `index`, compressing the path to it.
    /// Return None if `index` is out of range.
    pub fn find(&mut self, index: usize) -> Option<usize> {
        if index >= self.length {
            return None;
        }
        let mut root = index;
        while root != self.parents[root] {
            root = self.parents[root];
        }
        let mut index = index;
        while index != root {
            let next = self.parents[index];
            self.parents[index] = root;
            index = next;
        }
        Some(root)
    }
    /// Merge the components of `node1` and `node2`, the smaller under the larger.
    /// Return None if either index is out of range.
    pub fn unite(&mut self, node1: usize, node2: usize) -> Option<()> {
        if node1 >= self.length || node2 >= self.length {
            return None;
        }
        let parent1 = self.find(node1)?;
        let parent2 = self.find(node2)?;
        if parent1 != parent2 {
            let (large, small) = match self.sizes[parent1] > self.sizes[parent2] {
                true => (parent1, parent2),
                false => (parent2, parent1),
            };
            self.parents[small] = large;
            self.sizes[large] = Some(self.sizes[large]? + self.sizes[small]?);
            self.sizes[small] = None;
        }
        Some(())
    }
    /// Label every node with its component. Labels are 0-based and assigned in
    /// order of first appearance over `0..len`. Returns the labels and the number
    /// of components.
    pub fn labels(&mut self) -> (Vec<u32>, usize) {
        let mut root_label: Vec<Option<u32>> = vec![None; self.length];
        let mut count = 0;
        let mut labels = Vec::with_capacity(self.length);
        for node in 0..self.length {
            let root = match self.find(node) {
                Some(root) => root,
                None => continue,
            };
            let label = *root_label[root].get_or_insert_with(|| {
                count += 1;
                count - 1
            });
            labels.push(label);
        }
        (labels, count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn findunion_init() {
        assert!(FindUnion::new(0).is_empty());
        assert_eq!(FindUnion::new(10).len(), 10);
    }
    #[test]
    fn unite() {
        let mut fu = FindUnion::new(10);
        assert_eq!(Some(()), fu.unite(1, 3));
        assert_eq!(Some(()), fu.unite(3, 3));
        assert_eq!(None, fu.unite(100, 0));
        assert_eq!(None, fu.unite(10, 3));
        assert_eq!(None, fu.unite(3, 10));
    }
    #[test]
    fn find_out_of_range() {
        let mut fu = FindUnion::new(10);
        assert_eq!(fu.find(9), Some(9));
        assert_eq!(fu.find(10), None);
    }
    #[test]
    fn find() {
        let mut fu = FindUnion::new(10);
        fu.unite(0, 1);
        fu.unite(4, 2);
        fu.unite(1, 4);
        assert_eq!(fu.find(0), fu.find(2));
        assert_ne!(fu.find(0), fu.find(3));
    }
    #[test]
    fn chain() {
        let mut fu = FindUnion::new(10);
        for i in 0..9 {
            fu.unite(i, i + 1);
        }
        let root = fu.find(0);
        assert!((0..10).all(|i| fu.find(i) == root));
        assert_eq!(fu.labels(), (vec![0; 10], 1));
    }
    #[test]
    fn labels_in_first_appearance_order() {
        let mut fu = FindUnion::new(6);
        fu.unite(5, 1);
        fu.unite(2, 4);
        fu.unite(4, 0);
        let (labels, count) = fu.labels();
        assert_eq!(count, 3);
        assert_eq!(labels, vec![0, 1, 0, 2, 0, 1]);
    }
}
