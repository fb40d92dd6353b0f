use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Process-wide identifier interning table. Symbols are cheap to copy and
/// compare, and the backing strings live for the rest of the process.
#[derive(Debug, Default)]
struct InterningTable {
    inner: RwLock<InterningTableInner>,
}

#[derive(Debug, Default)]
struct InterningTableInner {
    strings: Vec<&'static str>,
    indices: hashbrown::HashMap<&'static str, u32>,
}

static INTERNING_TABLE: Lazy<InterningTable> = Lazy::new(Default::default);

impl InterningTable {
    fn get(&self, index: u32) -> Option<&'static str> {
        let inner = self.inner.read().unwrap();

        inner.strings.get(index as usize).copied()
    }

    fn insert_if_absent(&self, string: &str) -> u32 {
        {
            let inner = self.inner.read().unwrap();

            if let Some(index) = inner.indices.get(string) {
                return *index;
            }
        }

        let mut inner = self.inner.write().unwrap();

        if let Some(index) = inner.indices.get(string) {
            return *index;
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = inner.strings.len() as u32;

        inner.strings.push(leaked);
        inner.indices.insert(leaked, index);

        index
    }
}

/// An index into the identifier interning table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    pub fn new(value: &str) -> Self {
        Self(INTERNING_TABLE.insert_if_absent(value))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn value(self) -> &'static str {
        INTERNING_TABLE.get(self.0).expect(
            "Once an interned symbol is created, the string it references should never be removed from the table",
        )
    }
}

impl core::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Symbol")
            .field(&self.0)
            .field(&self.value())
            .finish()
    }
}

impl core::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = Symbol::new("ingress");
        let b = Symbol::new("ingress");
        let c = Symbol::new("egress");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.value(), "ingress");
        assert_eq!(c.value(), "egress");
    }
}
