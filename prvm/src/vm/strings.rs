use bstr::{BStr, BString, ByteSlice};

/// The strings a program can see.
///
/// Non-negative handles are byte offsets into the program's NUL-separated string table. Negative
/// handles name strings the engine created at run time: handle `-1 - n` is slot `n`.
#[derive(Default, Debug)]
pub struct Strings {
    table: BString,
    known: Vec<Option<BString>>,
    free: Vec<usize>,
}

impl Strings {
    pub fn new(table: BString) -> Strings {
        Strings { table, known: Vec::new(), free: Vec::new() }
    }

    pub fn table_len(&self) -> usize { self.table.len() }

    /// Resolve a handle, or `None` if it names nothing.
    pub fn get(&self, handle: i32) -> Option<&BStr> {
        if handle >= 0 {
            let bytes = self.table.get(handle as usize..)?;
            let end = bytes.find_byte(0).unwrap_or(bytes.len());
            Some(bytes[..end].as_bstr())
        } else {
            let slot = (-1 - handle) as usize;
            self.known.get(slot)?.as_ref().map(|string| string.as_bstr())
        }
    }

    /// Store an engine string and return its handle.
    pub fn alloc(&mut self, string: impl Into<BString>) -> i32 {
        let string = Some(string.into());
        let slot = match self.free.pop() {
            Some(slot) => { self.known[slot] = string; slot }
            None => { self.known.push(string); self.known.len() - 1 }
        };
        -1 - slot as i32
    }

    /// Release an engine string. Returns `false` for table strings and stale handles.
    pub fn free(&mut self, handle: i32) -> bool {
        if handle >= 0 {
            return false;
        }
        let slot = (-1 - handle) as usize;
        match self.known.get_mut(slot) {
            Some(string) if string.is_some() => {
                *string = None;
                self.free.push(slot);
                true
            }
            _ => false,
        }
    }

    /// Append a string to the table and return its offset.
    pub(crate) fn push_table(&mut self, string: &[u8]) -> i32 {
        if self.table.is_empty() {
            self.table.push(0);
        }
        let handle = self.table.len() as i32;
        self.table.extend_from_slice(string);
        self.table.push(0);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        let strings = Strings::new(BString::from(&b"\0hello\0world\0"[..]));
        assert_eq!(strings.get(0), Some(BStr::new("")));
        assert_eq!(strings.get(1), Some(BStr::new("hello")));
        assert_eq!(strings.get(3), Some(BStr::new("llo")));
        assert_eq!(strings.get(7), Some(BStr::new("world")));
        assert_eq!(strings.get(13), Some(BStr::new("")));
        assert_eq!(strings.get(14), None);
        assert_eq!(strings.table_len(), 13);
    }

    #[test]
    fn engine() {
        let mut strings = Strings::default();
        let a = strings.alloc("a");
        let b = strings.alloc("b");
        assert_eq!((a, b), (-1, -2));
        assert_eq!(strings.get(b), Some(BStr::new("b")));

        assert!(strings.free(a));
        assert!(!strings.free(a));
        assert_eq!(strings.get(a), None);
        assert_eq!(strings.get(-3), None);

        let c = strings.alloc("c");
        assert_eq!(c, a);
        assert_eq!(strings.get(c), Some(BStr::new("c")));
    }

    #[test]
    fn push() {
        let mut strings = Strings::default();
        let hello = strings.push_table(b"hello");
        assert_eq!(hello, 1);
        assert_eq!(strings.get(0), Some(BStr::new("")));
        assert_eq!(strings.get(hello), Some(BStr::new("hello")));
    }
}
