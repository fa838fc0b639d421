use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Interned names. Keyed by the lower case spelling, storing the first spelling seen.
static NAME_TABLE: LazyLock<RwLock<IndexMap<String, String>>> = LazyLock::new(|| {
    let mut table = IndexMap::new();
    table.insert("none".to_string(), "None".to_string());
    RwLock::new(table)
});

pub const NAME_NONE: FName = FName {
    comparison_index: 0,
    number: 0,
};

/// Case insensitive interned name with an optional numeric suffix.
///
/// `number` is stored one higher than the suffix so `Foo` and `Foo_0` stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(C)]
pub struct FName {
    comparison_index: u32,
    number: u32,
}

fn split_number(name: &str) -> (&str, u32) {
    if let Some((plain, suffix)) = name.rsplit_once('_') {
        let digits_only = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
        let leading_zero = suffix.len() > 1 && suffix.starts_with('0');
        if digits_only && !leading_zero && !plain.is_empty() {
            if let Ok(n) = suffix.parse::<u32>() {
                if n < u32::MAX {
                    return (plain, n + 1);
                }
            }
        }
    }
    (name, 0)
}

impl FName {
    pub fn new(name: &str) -> Self {
        let (plain, number) = split_number(name);
        let key = plain.to_ascii_lowercase();
        if let Some(index) = NAME_TABLE.read().get_index_of(&key) {
            return Self {
                comparison_index: index as u32,
                number,
            };
        }
        let (index, _) = NAME_TABLE
            .write()
            .insert_full(key, plain.to_string());
        Self {
            comparison_index: index as u32,
            number,
        }
    }

    /// Looks up a name without adding it to the table.
    pub fn find(name: &str) -> Option<Self> {
        let (plain, number) = split_number(name);
        NAME_TABLE
            .read()
            .get_index_of(&plain.to_ascii_lowercase())
            .map(|index| Self {
                comparison_index: index as u32,
                number,
            })
    }

    pub fn with_number(self, number: u32) -> Self {
        Self { number, ..self }
    }

    pub fn is_none(&self) -> bool {
        self.comparison_index == 0 && self.number == 0
    }

    pub fn comparison_index(&self) -> u32 {
        self.comparison_index
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn plain_name(&self) -> String {
        NAME_TABLE
            .read()
            .get_index(self.comparison_index as usize)
            .map(|(_, display)| display.clone())
            .unwrap_or_default()
    }

    /// Compares against a string ignoring case, including the number suffix.
    pub fn eq_str(&self, other: &str) -> bool {
        FName::find(other) == Some(*self)
    }
}

impl fmt::Display for FName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = NAME_TABLE.read();
        let plain = table
            .get_index(self.comparison_index as usize)
            .map(|(_, display)| display.as_str())
            .unwrap_or("None");
        if self.number == 0 {
            write!(f, "{plain}")
        } else {
            write!(f, "{plain}_{}", self.number - 1)
        }
    }
}

impl From<&str> for FName {
    fn from(value: &str) -> Self {
        FName::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none() {
        assert!(FName::default().is_none());
        assert!(FName::new("None").is_none());
        assert!(FName::new("none").is_none());
        assert_eq!(NAME_NONE.to_string(), "None");
    }

    #[test]
    fn test_case_insensitive() {
        let a = FName::new("NameTestHealth");
        let b = FName::new("nametesthealth");
        assert_eq!(a, b);
        assert_eq!(b.to_string(), "NameTestHealth");
    }

    #[test]
    fn test_number_suffix() {
        let name = FName::new("NameTestActor_2");
        assert_eq!(name.number(), 3);
        assert_eq!(name.plain_name(), "NameTestActor");
        assert_eq!(name.to_string(), "NameTestActor_2");
        assert_ne!(name, FName::new("NameTestActor"));

        let zero = FName::new("NameTestActor_0");
        assert_eq!(zero.number(), 1);
        assert_eq!(zero.to_string(), "NameTestActor_0");

        let padded = FName::new("NameTestActor_01");
        assert_eq!(padded.number(), 0);
        assert_eq!(padded.to_string(), "NameTestActor_01");

        let trailing = FName::new("NameTest_");
        assert_eq!(trailing.number(), 0);
    }

    #[test]
    fn test_find_does_not_insert() {
        assert_eq!(FName::find("NameTestNeverInterned"), None);
        let interned = FName::new("NameTestInterned");
        assert_eq!(FName::find("NAMETESTINTERNED"), Some(interned));
        assert!(interned.eq_str("nametestinterned"));
    }
}
