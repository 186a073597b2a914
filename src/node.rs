//! Typed access to the nodes of a parsed [`Tree`].
//!
//! A [`Node`] is a small copyable handle (tree reference plus node index),
//! so it can be passed around and looked up repeatedly without lifetime
//! gymnastics. Extraction methods check the node's type and range; a
//! mismatch flags [`ErrorKind::Type`] on the tree, making it sticky for the
//! whole lookup sequence.
//!
//! [`Tree`]: ../tree/struct.Tree.html
//! [`Node`]: struct.Node.html
//! [`ErrorKind::Type`]: ../error/enum.ErrorKind.html

use codec;
use error::{Error, ErrorKind, Result};
use string;
use tag::{Tag, TagKind};
use time::{Timestamp, TIMESTAMP_TYPE};
use tree::{NodeData, NodeRef, NodeValue, Tree};

use std::fmt;

/// A handle to one value of a parsed message.
pub struct Node<'t, 'a: 't> {
    tree: &'t Tree<'a>,
    node: NodeRef,
}

impl<'t, 'a> Clone for Node<'t, 'a> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            node: self.node,
        }
    }
}

impl<'t, 'a> Copy for Node<'t, 'a> {}

macro_rules! node_unsigned {
    ($(#[$attr:meta])* $method:ident -> $t:ty) => {
        $(#[$attr])*
        pub fn $method(&self) -> Result<$t> {
            self.tree.check()?;
            match self.data().value {
                NodeValue::Uint(v) if v <= <$t>::max_value() as u64 => Ok(v as $t),
                NodeValue::Int(v) if v >= 0 && v as u64 <= <$t>::max_value() as u64 => {
                    Ok(v as $t)
                }
                _ => Err(self.type_error(stringify!($t))),
            }
        }
    };
}

macro_rules! node_signed {
    ($(#[$attr:meta])* $method:ident -> $t:ty) => {
        $(#[$attr])*
        pub fn $method(&self) -> Result<$t> {
            self.tree.check()?;
            match self.data().value {
                NodeValue::Int(v)
                    if v >= i64::from(<$t>::min_value()) && v <= i64::from(<$t>::max_value()) =>
                {
                    Ok(v as $t)
                }
                NodeValue::Uint(v) if v <= <$t>::max_value() as u64 => Ok(v as $t),
                _ => Err(self.type_error(stringify!($t))),
            }
        }
    };
}

impl<'t, 'a> Node<'t, 'a> {
    pub(crate) fn new(tree: &'t Tree<'a>, node: NodeRef) -> Self {
        Self { tree, node }
    }

    fn data(&self) -> &'t NodeData {
        self.tree.node_data(self.node)
    }

    fn type_error(&self, what: &str) -> Error {
        self.tree.fail(
            ErrorKind::Type,
            format!("expected {}, got a {} node", what, self.data().kind),
        )
    }

    /// The variant of this node.
    pub fn kind(&self) -> TagKind {
        self.data().kind
    }

    /// The tag this node was parsed from.
    pub fn tag(&self) -> Tag {
        let data = self.data();
        match data.value {
            NodeValue::Nil => Tag::Nil,
            NodeValue::Bool(v) => Tag::Bool(v),
            NodeValue::Int(v) => Tag::Int(v),
            NodeValue::Uint(v) => Tag::Uint(v),
            NodeValue::Float(v) => Tag::Float(v),
            NodeValue::Double(v) => Tag::Double(v),
            NodeValue::Bytes { .. } => match data.kind {
                TagKind::Str => Tag::Str(data.len),
                _ => Tag::Bin(data.len),
            },
            NodeValue::ExtBytes { exttype, .. } => Tag::Ext(exttype, data.len),
            NodeValue::Children(_) => match data.kind {
                TagKind::Array => Tag::Array(data.len),
                _ => Tag::Map(data.len),
            },
        }
    }

    /// Returns whether this node is nil.
    pub fn is_nil(&self) -> bool {
        self.kind() == TagKind::Nil
    }

    /// Returns whether this node is the missing sentinel.
    ///
    /// Parsed nodes are never missing; an absent optional lookup is `None`
    /// instead. This exists for symmetry with [`Tag::is_missing`].
    ///
    /// [`Tag::is_missing`]: ../tag/enum.Tag.html#method.is_missing
    pub fn is_missing(&self) -> bool {
        self.kind() == TagKind::Missing
    }

    /// Extracts a nil node.
    pub fn as_nil(&self) -> Result<()> {
        self.tree.check()?;
        match self.data().kind {
            TagKind::Nil => Ok(()),
            _ => Err(self.type_error("nil")),
        }
    }

    /// Extracts a bool node.
    pub fn as_bool(&self) -> Result<bool> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::Bool(v) => Ok(v),
            _ => Err(self.type_error("bool")),
        }
    }

    node_unsigned!(
        /// Extracts an integer node that fits a `u8`.
        as_u8 -> u8
    );
    node_unsigned!(
        /// Extracts an integer node that fits a `u16`.
        as_u16 -> u16
    );
    node_unsigned!(
        /// Extracts an integer node that fits a `u32`.
        as_u32 -> u32
    );
    node_unsigned!(
        /// Extracts a non-negative integer node.
        as_u64 -> u64
    );
    node_signed!(
        /// Extracts an integer node that fits an `i8`.
        as_i8 -> i8
    );
    node_signed!(
        /// Extracts an integer node that fits an `i16`.
        as_i16 -> i16
    );
    node_signed!(
        /// Extracts an integer node that fits an `i32`.
        as_i32 -> i32
    );
    node_signed!(
        /// Extracts an integer node that fits an `i64`.
        as_i64 -> i64
    );

    /// Extracts a non-negative integer node. Alias of [`as_u64`].
    ///
    /// [`as_u64`]: #method.as_u64
    pub fn as_uint(&self) -> Result<u64> {
        self.as_u64()
    }

    /// Extracts an integer node that fits an `i64`. Alias of [`as_i64`].
    ///
    /// [`as_i64`]: #method.as_i64
    pub fn as_int(&self) -> Result<i64> {
        self.as_i64()
    }

    /// Extracts any numeric node as an `f32`, converting if necessary.
    pub fn as_float(&self) -> Result<f32> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::Float(v) => Ok(v),
            NodeValue::Double(v) => Ok(v as f32),
            NodeValue::Uint(v) => Ok(v as f32),
            NodeValue::Int(v) => Ok(v as f32),
            _ => Err(self.type_error("a number")),
        }
    }

    /// Extracts any numeric node as an `f64`, converting if necessary.
    pub fn as_double(&self) -> Result<f64> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::Double(v) => Ok(v),
            NodeValue::Float(v) => Ok(f64::from(v)),
            NodeValue::Uint(v) => Ok(v as f64),
            NodeValue::Int(v) => Ok(v as f64),
            _ => Err(self.type_error("a number")),
        }
    }

    /// Extracts a float node, without conversion.
    pub fn as_float_strict(&self) -> Result<f32> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::Float(v) => Ok(v),
            _ => Err(self.type_error("float")),
        }
    }

    /// Extracts a double node, allowing lossless widening from float.
    pub fn as_double_strict(&self) -> Result<f64> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::Double(v) => Ok(v),
            NodeValue::Float(v) => Ok(f64::from(v)),
            _ => Err(self.type_error("double")),
        }
    }

    /// The payload of a str/bin/ext node, borrowed from the tree's data
    /// region.
    ///
    /// The slice stays valid until the tree parses its next message or is
    /// dropped.
    pub fn bytes(&self) -> Result<&'t [u8]> {
        self.tree.check()?;
        let data = self.data();
        match data.value {
            NodeValue::Bytes { offset } | NodeValue::ExtBytes { offset, .. } => {
                Ok(&self.tree.data()[offset..offset + data.len as usize])
            }
            _ => Err(self.type_error("str/bin/ext data")),
        }
    }

    /// The payload of a str node as UTF-8 text.
    ///
    /// Fails with [`ErrorKind::Type`] if the node is not a str or is not
    /// valid UTF-8.
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn str_slice(&self) -> Result<&'t str> {
        self.tree.check()?;
        if self.data().kind != TagKind::Str {
            return Err(self.type_error("str"));
        }
        let bytes = self.bytes()?;
        match string::check_utf8(bytes) {
            Ok(s) => Ok(s),
            Err(e) => Err(self.tree.absorb(e)),
        }
    }

    /// Copies the payload of a str/bin/ext node into an owned `Vec`,
    /// detaching it from the tree's lifetime.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.bytes()?.to_vec())
    }

    /// Copies the payload of a str node into an owned, UTF-8 validated
    /// `String`, detaching it from the tree's lifetime.
    pub fn to_string(&self) -> Result<String> {
        Ok(self.str_slice()?.to_string())
    }

    /// Copies the payload of a str/bin/ext node into `dst`, returning the
    /// number of bytes copied.
    ///
    /// Fails with [`ErrorKind::TooBig`] when `dst` is too small.
    ///
    /// [`ErrorKind::TooBig`]: ../error/enum.ErrorKind.html
    pub fn copy_bytes(&self, dst: &mut [u8]) -> Result<usize> {
        let bytes = self.bytes()?;
        if bytes.len() > dst.len() {
            return Err(self.tree.fail(
                ErrorKind::TooBig,
                format!("destination holds {} bytes, data is {}", dst.len(), bytes.len()),
            ));
        }
        dst[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// The application-defined type of an ext node.
    pub fn exttype(&self) -> Result<i8> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::ExtBytes { exttype, .. } => Ok(exttype),
            _ => Err(self.type_error("ext")),
        }
    }

    /// Extracts a timestamp from a node holding the reserved timestamp
    /// extension.
    pub fn timestamp(&self) -> Result<Timestamp> {
        self.tree.check()?;
        match self.data().value {
            NodeValue::ExtBytes { exttype, .. } if exttype == TIMESTAMP_TYPE => {
                let payload = self.bytes()?;
                match codec::decode_timestamp(payload) {
                    Ok(ts) => Ok(ts),
                    Err(e) => Err(self.tree.absorb(e)),
                }
            }
            _ => Err(self.type_error("timestamp")),
        }
    }

    /// The element count of an array node.
    pub fn array_length(&self) -> Result<u32> {
        self.tree.check()?;
        match self.data().kind {
            TagKind::Array => Ok(self.data().len),
            _ => Err(self.type_error("array")),
        }
    }

    /// The key/value pair count of a map node.
    pub fn map_count(&self) -> Result<u32> {
        self.tree.check()?;
        match self.data().kind {
            TagKind::Map => Ok(self.data().len),
            _ => Err(self.type_error("map")),
        }
    }

    /// The `index`-th element of an array node.
    ///
    /// Fails with [`ErrorKind::Data`] when the index is out of range.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn array_at(&self, index: u32) -> Result<Node<'t, 'a>> {
        let length = self.array_length()?;
        if index >= length {
            return Err(self.tree.fail(
                ErrorKind::Data,
                format!("array index {} out of range (length {})", index, length),
            ));
        }
        Ok(self.child(index))
    }

    /// The key of the `index`-th pair of a map node.
    ///
    /// Fails with [`ErrorKind::Data`] when the index is out of range.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn key_at(&self, index: u32) -> Result<Node<'t, 'a>> {
        let count = self.map_count()?;
        if index >= count {
            return Err(self.tree.fail(
                ErrorKind::Data,
                format!("map index {} out of range (count {})", index, count),
            ));
        }
        Ok(self.child(index * 2))
    }

    /// The value of the `index`-th pair of a map node.
    ///
    /// Fails with [`ErrorKind::Data`] when the index is out of range.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn value_at(&self, index: u32) -> Result<Node<'t, 'a>> {
        let count = self.map_count()?;
        if index >= count {
            return Err(self.tree.fail(
                ErrorKind::Data,
                format!("map index {} out of range (count {})", index, count),
            ));
        }
        Ok(self.child(index * 2 + 1))
    }

    /// Looks up the value under a string key.
    ///
    /// Fails with [`ErrorKind::Data`] when the key is absent or occurs more
    /// than once.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn map_str(&self, key: &str) -> Result<Node<'t, 'a>> {
        match self.map_str_optional(key)? {
            Some(node) => Ok(node),
            None => Err(self.tree.fail(
                ErrorKind::Data,
                format!("map key {:?} not found", key),
            )),
        }
    }

    /// Looks up the value under a string key, returning `None` when the key
    /// is absent.
    ///
    /// Duplicate keys still fail with [`ErrorKind::Data`].
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn map_str_optional(&self, key: &str) -> Result<Option<Node<'t, 'a>>> {
        self.map_find(|k| match k.data().value {
            NodeValue::Bytes { .. } if k.data().kind == TagKind::Str => {
                k.bytes().map(|b| b == key.as_bytes()).unwrap_or(false)
            }
            _ => false,
        })
    }

    /// Looks up the value under a signed integer key.
    ///
    /// Keys compare by value regardless of their wire signedness, so
    /// `map_int(5)` also finds a key encoded as uint 5. Fails with
    /// [`ErrorKind::Data`] when the key is absent or duplicated.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn map_int(&self, key: i64) -> Result<Node<'t, 'a>> {
        match self.map_int_optional(key)? {
            Some(node) => Ok(node),
            None => Err(self.tree.fail(
                ErrorKind::Data,
                format!("map key {} not found", key),
            )),
        }
    }

    /// Looks up the value under a signed integer key, returning `None` when
    /// the key is absent.
    pub fn map_int_optional(&self, key: i64) -> Result<Option<Node<'t, 'a>>> {
        self.map_find(|k| match k.data().value {
            NodeValue::Int(v) => v == key,
            NodeValue::Uint(v) => key >= 0 && v == key as u64,
            _ => false,
        })
    }

    /// Looks up the value under an unsigned integer key.
    ///
    /// Fails with [`ErrorKind::Data`] when the key is absent or duplicated.
    ///
    /// [`ErrorKind::Data`]: ../error/enum.ErrorKind.html
    pub fn map_uint(&self, key: u64) -> Result<Node<'t, 'a>> {
        match self.map_uint_optional(key)? {
            Some(node) => Ok(node),
            None => Err(self.tree.fail(
                ErrorKind::Data,
                format!("map key {} not found", key),
            )),
        }
    }

    /// Looks up the value under an unsigned integer key, returning `None`
    /// when the key is absent.
    pub fn map_uint_optional(&self, key: u64) -> Result<Option<Node<'t, 'a>>> {
        self.map_find(|k| match k.data().value {
            NodeValue::Uint(v) => v == key,
            NodeValue::Int(v) => v >= 0 && v as u64 == key,
            _ => false,
        })
    }

    /// Matches a str node against a list of allowed values, returning the
    /// index of the match.
    ///
    /// Fails with [`ErrorKind::Type`] when the node is no str or matches
    /// none of the `values`.
    ///
    /// [`ErrorKind::Type`]: ../error/enum.ErrorKind.html
    pub fn enum_index(&self, values: &[&str]) -> Result<usize> {
        match self.enum_index_optional(values)? {
            found if found < values.len() => Ok(found),
            _ => Err(self.tree.fail(
                ErrorKind::Type,
                "string does not match any of the allowed values",
            )),
        }
    }

    /// Like [`enum_index`], but returns `values.len()` instead of failing
    /// when nothing matches.
    ///
    /// [`enum_index`]: #method.enum_index
    pub fn enum_index_optional(&self, values: &[&str]) -> Result<usize> {
        let string = self.str_slice()?;
        Ok(values
            .iter()
            .position(|v| *v == string)
            .unwrap_or(values.len()))
    }

    fn child(&self, offset: u32) -> Node<'t, 'a> {
        let children = match self.data().value {
            NodeValue::Children(children) => children,
            _ => unreachable!("child() on a non-container node"),
        };
        Node::new(
            self.tree,
            NodeRef {
                page: children.page,
                index: children.index + offset,
            },
        )
    }

    /// Linear scan over the keys; exactly one key may match.
    fn map_find<F>(&self, matches: F) -> Result<Option<Node<'t, 'a>>>
    where
        F: Fn(&Node<'t, 'a>) -> bool,
    {
        let count = self.map_count()?;
        let mut found = None;
        for i in 0..count {
            let key = self.child(i * 2);
            if matches(&key) {
                if found.is_some() {
                    warn!("duplicate key in map node");
                    return Err(self.tree.fail(ErrorKind::Data, "duplicate key in map"));
                }
                found = Some(self.child(i * 2 + 1));
            }
        }
        Ok(found)
    }
}

impl<'t, 'a> fmt::Debug for Node<'t, 'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("len", &self.data().len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree::Tree;
    use writer::Writer;

    fn build<F: FnOnce(&mut Writer)>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = Writer::new(&mut buf);
            f(&mut writer);
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn scalar_extraction() {
        let data = build(|w| {
            w.start_array(6).unwrap();
            w.write_nil().unwrap();
            w.write_bool(true).unwrap();
            w.write_i32(-7).unwrap();
            w.write_u64(1 << 40).unwrap();
            w.write_float(1.5).unwrap();
            w.write_double(-2.5).unwrap();
            w.finish_array().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();

        root.array_at(0).unwrap().as_nil().unwrap();
        assert!(root.array_at(0).unwrap().is_nil());
        assert_eq!(root.array_at(1).unwrap().as_bool().unwrap(), true);
        assert_eq!(root.array_at(2).unwrap().as_i8().unwrap(), -7);
        assert_eq!(root.array_at(3).unwrap().as_u64().unwrap(), 1 << 40);
        assert_eq!(root.array_at(4).unwrap().as_float_strict().unwrap(), 1.5);
        assert_eq!(root.array_at(5).unwrap().as_double_strict().unwrap(), -2.5);

        // numeric coercion works from every numeric type
        assert_eq!(root.array_at(2).unwrap().as_double().unwrap(), -7.0);
        assert_eq!(root.array_at(4).unwrap().as_double().unwrap(), 1.5);
    }

    #[test]
    fn integer_range_checks_flag_type() {
        let data = build(|w| w.write_u16(300).unwrap());
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.as_u8().unwrap_err().kind(), ErrorKind::Type);
        // the error is sticky on the tree
        assert_eq!(root.as_u16().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn either_signedness_is_accepted_in_range() {
        // int8 encoding of a non-negative value
        let mut tree = Tree::new(&[0xd0, 0x05]);
        tree.parse().unwrap();
        assert_eq!(tree.root().unwrap().as_u8().unwrap(), 5);
    }

    #[test]
    fn bytes_and_strings() {
        let data = build(|w| {
            w.start_array(2).unwrap();
            w.write_str("hello").unwrap();
            w.write_bin(&[1, 2, 3]).unwrap();
            w.finish_array().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();

        let s = root.array_at(0).unwrap();
        assert_eq!(s.str_slice().unwrap(), "hello");
        assert_eq!(s.bytes().unwrap(), b"hello");
        assert_eq!(s.to_string().unwrap(), "hello");
        assert_eq!(s.to_vec().unwrap(), b"hello");
        let mut buf = [0u8; 8];
        assert_eq!(s.copy_bytes(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");

        let b = root.array_at(1).unwrap();
        assert_eq!(b.bytes().unwrap(), &[1, 2, 3]);
        assert_eq!(b.to_vec().unwrap(), vec![1, 2, 3]);
        // a bin is not a str
        assert_eq!(b.str_slice().unwrap_err().kind(), ErrorKind::Type);
        assert!(!b.is_missing());
    }

    #[test]
    fn copy_bytes_checks_destination_size() {
        let data = build(|w| w.write_bin(&[9; 10]).unwrap());
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let mut small = [0u8; 4];
        assert_eq!(
            tree.root()
                .unwrap()
                .copy_bytes(&mut small)
                .unwrap_err()
                .kind(),
            ErrorKind::TooBig
        );
    }

    #[test]
    fn ext_and_timestamp_nodes() {
        let data = build(|w| {
            w.start_array(2).unwrap();
            w.write_ext(7, &[0xde, 0xad]).unwrap();
            w.write_timestamp(1_500_000_000, 500).unwrap();
            w.finish_array().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();

        let ext = root.array_at(0).unwrap();
        assert_eq!(ext.exttype().unwrap(), 7);
        assert_eq!(ext.bytes().unwrap(), &[0xde, 0xad]);
        assert_eq!(ext.timestamp().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn timestamp_node_roundtrip() {
        let data = build(|w| w.write_timestamp(1_500_000_000, 500).unwrap());
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        assert_eq!(
            tree.root().unwrap().timestamp().unwrap(),
            Timestamp {
                seconds: 1_500_000_000,
                nanoseconds: 500
            }
        );
    }

    #[test]
    fn map_lookups() {
        let data = build(|w| {
            w.start_map(3).unwrap();
            w.write_str("name").unwrap();
            w.write_str("pulse").unwrap();
            w.write_u8(3).unwrap();
            w.write_str("three").unwrap();
            w.write_i8(-1).unwrap();
            w.write_str("minus one").unwrap();
            w.finish_map().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();

        assert_eq!(root.map_str("name").unwrap().str_slice().unwrap(), "pulse");
        // integer keys match across signedness
        assert_eq!(root.map_int(3).unwrap().str_slice().unwrap(), "three");
        assert_eq!(root.map_uint(3).unwrap().str_slice().unwrap(), "three");
        assert_eq!(
            root.map_int(-1).unwrap().str_slice().unwrap(),
            "minus one"
        );

        assert_eq!(root.map_str_optional("absent").unwrap().is_none(), true);
        assert!(tree.error().is_none());

        assert_eq!(
            root.map_str("absent").unwrap_err().kind(),
            ErrorKind::Data
        );
    }

    #[test]
    fn duplicate_map_keys_flag_data() {
        let data = build(|w| {
            w.start_map(2).unwrap();
            w.write_str("k").unwrap();
            w.write_u8(1).unwrap();
            w.write_str("k").unwrap();
            w.write_u8(2).unwrap();
            w.finish_map().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        assert_eq!(
            tree.root()
                .unwrap()
                .map_str_optional("k")
                .unwrap_err()
                .kind(),
            ErrorKind::Data
        );
    }

    #[test]
    fn array_index_out_of_range_flags_data() {
        let data = build(|w| {
            w.start_array(1).unwrap();
            w.write_nil().unwrap();
            w.finish_array().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        assert_eq!(
            tree.root().unwrap().array_at(1).unwrap_err().kind(),
            ErrorKind::Data
        );
    }

    #[test]
    fn map_pairs_by_index() {
        let data = build(|w| {
            w.start_map(1).unwrap();
            w.write_str("k").unwrap();
            w.write_u8(9).unwrap();
            w.finish_map().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.key_at(0).unwrap().str_slice().unwrap(), "k");
        assert_eq!(root.value_at(0).unwrap().as_u8().unwrap(), 9);
        assert_eq!(root.key_at(1).unwrap_err().kind(), ErrorKind::Data);
    }

    #[test]
    fn enum_lookup() {
        let data = build(|w| w.write_str("cold").unwrap());
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();

        assert_eq!(root.enum_index(&["hot", "cold"]).unwrap(), 1);
        assert_eq!(root.enum_index_optional(&["hot", "warm"]).unwrap(), 2);
        assert!(tree.error().is_none());
        assert_eq!(
            root.enum_index(&["hot", "warm"]).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn operations_on_a_failed_tree_short_circuit() {
        let data = build(|w| w.write_u16(300).unwrap());
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.as_u8().unwrap_err().kind(), ErrorKind::Type);
        // every later operation reports the stored error
        assert_eq!(root.as_u16().unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(root.bytes().unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(tree.finish().unwrap_err().kind(), ErrorKind::Type);
    }

    /// Serializes a parsed node back onto a writer, depth first.
    fn serialize(w: &mut Writer, node: Node) {
        match node.kind() {
            TagKind::Array => {
                let len = node.array_length().unwrap();
                w.start_array(len).unwrap();
                for i in 0..len {
                    serialize(w, node.array_at(i).unwrap());
                }
                w.finish_array().unwrap();
            }
            TagKind::Map => {
                let count = node.map_count().unwrap();
                w.start_map(count).unwrap();
                for i in 0..count {
                    serialize(w, node.key_at(i).unwrap());
                    serialize(w, node.value_at(i).unwrap());
                }
                w.finish_map().unwrap();
            }
            TagKind::Str | TagKind::Bin | TagKind::Ext => {
                w.write_tag(node.tag()).unwrap();
                w.write_bytes(node.bytes().unwrap()).unwrap();
                match node.kind() {
                    TagKind::Str => w.finish_str().unwrap(),
                    TagKind::Bin => w.finish_bin().unwrap(),
                    _ => w.finish_ext().unwrap(),
                }
            }
            _ => w.write_tag(node.tag()).unwrap(),
        }
    }

    #[test]
    fn reserializing_a_tree_reproduces_the_input() {
        let data = build(|w| {
            w.start_map(2).unwrap();
            w.write_str("values").unwrap();
            w.start_array(5).unwrap();
            w.write_i64(-100_000).unwrap();
            w.write_u64(u64::max_value()).unwrap();
            w.write_double(2.5).unwrap();
            w.write_bin(&[1, 2, 3]).unwrap();
            w.write_nil().unwrap();
            w.finish_array().unwrap();
            w.write_str("flag").unwrap();
            w.write_bool(false).unwrap();
            w.finish_map().unwrap();
        });

        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let reencoded = build(|w| serialize(w, tree.root().unwrap()));
        assert_eq!(reencoded, data);
    }

    #[test]
    fn tags_are_reconstructed() {
        let data = build(|w| {
            w.start_array(3).unwrap();
            w.write_str("ab").unwrap();
            w.write_u8(7).unwrap();
            w.write_nil().unwrap();
            w.finish_array().unwrap();
        });
        let mut tree = Tree::new(&data);
        tree.parse().unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.tag(), Tag::Array(3));
        assert_eq!(root.array_at(0).unwrap().tag(), Tag::Str(2));
        assert_eq!(root.array_at(1).unwrap().tag(), Tag::Uint(7));
        assert_eq!(root.array_at(2).unwrap().tag(), Tag::Nil);
    }
}
