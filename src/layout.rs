//! The layout oracle: a static, read-only table describing how to walk the
//! child pointers of a heap object. Produced by the (out-of-scope) code
//! generator, consumed here read-only, grounded on `original_source/
//! include/runtime/header.h`'s `layoutitem`/`layout` structs.

use ahash::AHashMap;

/// The category of a single field of a block, dispatched during evacuation
/// per §4.4's child-walk table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Map,
    Set,
    List,
    StringBuffer,
    Symbol,
    Variable,
    Int,
    Float,
    Bool,
    MInt,
}

impl Category {
    /// An out-of-range category value falls through to the unboxed case
    /// with no error, per §7 ("layout oracle inconsistency ... fall through
    /// to the 'unboxed' case; no error").
    pub fn from_raw(raw: u16) -> Category {
        match raw {
            0 => Category::Map,
            1 => Category::Set,
            2 => Category::List,
            3 => Category::StringBuffer,
            4 => Category::Symbol,
            5 => Category::Variable,
            6 => Category::Int,
            7 => Category::Float,
            8 => Category::Bool,
            _ => Category::MInt,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct LayoutItem {
    pub offset: usize,
    pub category: Category,
}

#[derive(Clone, Debug, Default)]
pub struct LayoutData {
    pub args: Vec<LayoutItem>,
}

/// Owns the layout-id -> descriptor mapping. Layout id zero is reserved
/// (tokens never consult the oracle) and is never present in the table.
#[derive(Default)]
pub struct LayoutOracle {
    table: AHashMap<u16, LayoutData>,
}

impl LayoutOracle {
    pub fn new() -> Self {
        Self {
            table: AHashMap::new(),
        }
    }

    pub fn register(&mut self, layout_id: u16, data: LayoutData) {
        assert_ne!(layout_id, 0, "layout id 0 is reserved for tokens");
        self.table.insert(layout_id, data);
    }

    /// Returns the field descriptors for `layout_id`, or `None` if it is
    /// unknown (treated the same as an empty descriptor list by callers:
    /// an object with no known children is simply not walked further).
    pub fn get(&self, layout_id: u16) -> Option<&LayoutData> {
        self.table.get(&layout_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_raw_values_fall_through_to_unboxed() {
        assert_eq!(Category::from_raw(250), Category::MInt);
    }

    #[test]
    fn register_and_lookup() {
        let mut oracle = LayoutOracle::new();
        oracle.register(
            1,
            LayoutData {
                args: vec![LayoutItem {
                    offset: 8,
                    category: Category::Symbol,
                }],
            },
        );
        let data = oracle.get(1).unwrap();
        assert_eq!(data.args.len(), 1);
        assert_eq!(data.args[0].offset, 8);
    }

    #[test]
    fn unregistered_layout_id_is_none() {
        let oracle = LayoutOracle::new();
        assert!(oracle.get(99).is_none());
    }
}
