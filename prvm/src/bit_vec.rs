/// A growable set of small integers, used for coverage marks.
#[derive(Default, Clone, Debug)]
pub struct BitVec {
    data: Vec<u64>,
}

impl BitVec {
    pub fn get(&self, bit: usize) -> bool {
        let word = bit / 64;
        let mask = 1 << (bit % 64);

        (self.data.get(word).unwrap_or(&0) & mask) != 0
    }

    /// Mark `bit`, returning whether it was already marked.
    pub fn set(&mut self, bit: usize) -> bool {
        let word = bit / 64;
        if word >= self.data.len() {
            self.data.resize(word + 1, 0);
        }
        let mask = 1 << (bit % 64);

        let result = (self.data[word] & mask) != 0;
        self.data[word] |= mask;
        result
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn count(&self) -> usize {
        self.data.iter().map(|word| word.count_ones() as usize).sum()
    }
}
