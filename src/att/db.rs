//! The attribute database: an ordered map from handle to attribute.

use crate::att::{Attribute, Handle, HandleRange};

/// All attributes hosted by the server, ordered by strictly increasing
/// handle.
///
/// The database is immutable after construction and is shared (behind an
/// `Arc`) by every connection. Handles may be sparse; lookups use binary
/// search.
pub struct AttributeDb {
    attrs: Vec<Attribute>,
}

impl AttributeDb {
    /// Creates a database from attributes sorted by handle.
    ///
    /// Panics if handles are not strictly increasing or contain the `NULL`
    /// handle; the schema builder in [`gatt`] upholds this by construction.
    ///
    /// [`gatt`]: ../gatt/index.html
    pub fn new(attrs: Vec<Attribute>) -> Self {
        for pair in attrs.windows(2) {
            assert!(
                pair[0].handle < pair[1].handle,
                "attribute handles must be strictly increasing"
            );
        }
        if let Some(first) = attrs.first() {
            assert!(first.handle != Handle::NULL, "handle 0x0000 is reserved");
        }
        Self { attrs }
    }

    /// Point lookup by handle.
    pub fn at(&self, handle: Handle) -> Option<&Attribute> {
        self.attrs
            .binary_search_by_key(&handle, |a| a.handle)
            .ok()
            .map(|i| &self.attrs[i])
    }

    /// All attributes with `range.start() <= handle <= range.end()`, in
    /// ascending handle order.
    pub fn subrange(&self, range: &HandleRange) -> &[Attribute] {
        let lo = self.attrs.partition_point(|a| a.handle < range.start());
        let hi = self.attrs.partition_point(|a| a.handle <= range.end());
        &self.attrs[lo..hi]
    }

    /// Iterates over all attributes in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::{Owner, Props, RawHandleRange};
    use crate::bytes::{ByteReader, FromBytes};
    use crate::uuid::Uuid16;

    fn attr(handle: u16) -> Attribute {
        Attribute {
            handle: Handle::from_raw(handle),
            att_type: Uuid16(0x2800).into(),
            value: None,
            props: Props::READ,
            secure: Props::empty(),
            owner: Owner::Service {
                start: Handle::from_raw(handle),
                end: Handle::from_raw(handle),
            },
        }
    }

    fn range(start: u16, end: u16) -> HandleRange {
        let bytes = [start.to_le_bytes(), end.to_le_bytes()].concat();
        let mut r = ByteReader::new(&bytes);
        RawHandleRange::from_bytes(&mut r).unwrap().check().unwrap()
    }

    #[test]
    fn point_lookup() {
        let db = AttributeDb::new(vec![attr(1), attr(2), attr(5)]);
        assert_eq!(db.at(Handle::from_raw(2)).map(|a| a.handle.as_u16()), Some(2));
        assert!(db.at(Handle::from_raw(3)).is_none());
        assert!(db.at(Handle::from_raw(6)).is_none());
    }

    #[test]
    fn subrange_clamps_and_preserves_order() {
        let db = AttributeDb::new(vec![attr(1), attr(2), attr(5), attr(9)]);

        let handles: Vec<u16> = db
            .subrange(&range(2, 5))
            .iter()
            .map(|a| a.handle.as_u16())
            .collect();
        assert_eq!(handles, vec![2, 5]);

        assert_eq!(db.subrange(&range(1, 0xFFFF)).len(), 4);
        assert!(db.subrange(&range(6, 8)).is_empty());
        assert!(db.subrange(&range(10, 0xFFFF)).is_empty());
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn rejects_duplicate_handles() {
        AttributeDb::new(vec![attr(1), attr(1)]);
    }
}
