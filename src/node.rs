//! The engine's recursive tagged-value structure ("node").
//!
//! Commands richer than flat string lists cross the boundary as a tree of
//! tagged nodes: scalars, arrays, and maps, nested arbitrarily. This module
//! owns both directions:
//!
//! - **Construction** ([`NodeTree::build`]): an owned [`NodeValue`] is laid
//!   out into the wire structs the engine reads
//! - **Destruction** (`NodeTree`'s drop): the mirror-image walk that releases
//!   every allocation construction made, exactly once
//! - **Decoding** ([`NodeValue::from_raw`]): a pure copy-out walk over an
//!   engine-populated tree; it never frees engine memory
//!
//! Engine-owned node contents are released through the engine's own
//! node-free entry point, never through this module.

use crate::codec;
use crate::error::Result;
use crate::ffi::{Format, RawByteArray, RawNode, RawNodeList, RawNodePayload};
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;

/// An owned recursive value, the caller-facing side of the node protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    None,
    String(String),
    Flag(bool),
    Int64(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<NodeValue>),
    Map(Vec<(String, NodeValue)>),
}

impl NodeValue {
    /// A flat array of strings, the shape used by string-list commands.
    pub fn strings<I, S>(args: I) -> NodeValue
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        NodeValue::Array(
            args.into_iter()
                .map(|s| NodeValue::String(s.as_ref().to_string()))
                .collect(),
        )
    }

    /// The format tag this value is marshaled under.
    pub fn format(&self) -> Format {
        match self {
            NodeValue::None => Format::None,
            NodeValue::String(_) => Format::String,
            NodeValue::Flag(_) => Format::Flag,
            NodeValue::Int64(_) => Format::Int64,
            NodeValue::Double(_) => Format::Double,
            NodeValue::Bytes(_) => Format::ByteArray,
            NodeValue::Array(_) => Format::NodeArray,
            NodeValue::Map(_) => Format::NodeMap,
        }
    }

    /// Copy an engine-populated node tree out into an owned value.
    ///
    /// A payload that yields no usable value (null string, unknown tag)
    /// decodes to [`NodeValue::None`] rather than failing.
    ///
    /// # Safety
    ///
    /// `node` must be a well-formed tree whose payloads match their format
    /// tags, and every referenced buffer must stay valid for the duration of
    /// the call.
    pub unsafe fn from_raw(node: &RawNode) -> NodeValue {
        match Format::from_raw(node.format) {
            Some(Format::String) | Some(Format::OsdString) => codec::decode(node.u.string)
                .map(NodeValue::String)
                .unwrap_or(NodeValue::None),
            Some(Format::Flag) => NodeValue::Flag(node.u.flag != 0),
            Some(Format::Int64) => NodeValue::Int64(node.u.int64),
            Some(Format::Double) => NodeValue::Double(node.u.double),
            Some(Format::ByteArray) => decode_bytes(node.u.byte_array),
            Some(Format::NodeArray) => NodeValue::Array(decode_values(node.u.list)),
            Some(Format::NodeMap) => NodeValue::Map(decode_pairs(node.u.list)),
            _ => NodeValue::None,
        }
    }
}

// ============================================================================
// JSON Bridging
// ============================================================================

impl From<&NodeValue> for serde_json::Value {
    /// Byte payloads are engine-defined binary and have no JSON
    /// representation; they map to `null`.
    fn from(value: &NodeValue) -> serde_json::Value {
        use serde_json::Value;
        match value {
            NodeValue::None | NodeValue::Bytes(_) => Value::Null,
            NodeValue::String(s) => Value::String(s.clone()),
            NodeValue::Flag(b) => Value::Bool(*b),
            NodeValue::Int64(i) => Value::from(*i),
            NodeValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            NodeValue::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            NodeValue::Map(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&serde_json::Value> for NodeValue {
    fn from(value: &serde_json::Value) -> NodeValue {
        use serde_json::Value;
        match value {
            Value::Null => NodeValue::None,
            Value::Bool(b) => NodeValue::Flag(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => NodeValue::Int64(i),
                None => NodeValue::Double(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => NodeValue::String(s.clone()),
            Value::Array(items) => NodeValue::Array(items.iter().map(NodeValue::from).collect()),
            Value::Object(map) => NodeValue::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), NodeValue::from(value)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Wire Tree Ownership
// ============================================================================

/// A wire-layout node tree owned by this side of the boundary.
///
/// Holds every allocation made while laying out a [`NodeValue`] and releases
/// all of them exactly once on drop, on every exit path of the call it was
/// built for, success or native-reported failure.
pub struct NodeTree {
    root: RawNode,
}

impl NodeTree {
    /// Lay out `value` into the engine's wire structs.
    pub fn build(value: &NodeValue) -> Result<NodeTree> {
        Ok(NodeTree {
            root: build_node(value)?,
        })
    }

    /// The root node, for inspection.
    pub fn root(&self) -> &RawNode {
        &self.root
    }

    /// Root pointer to hand to the engine.
    pub fn root_ptr(&mut self) -> *mut RawNode {
        &mut self.root
    }

    /// Give up ownership of the tree without releasing it.
    #[cfg(test)]
    pub(crate) fn into_raw(self) -> RawNode {
        let root = self.root;
        std::mem::forget(self);
        root
    }
}

impl Drop for NodeTree {
    fn drop(&mut self) {
        unsafe { free_node(&mut self.root) };
    }
}

// ============================================================================
// Construction
// ============================================================================

fn build_node(value: &NodeValue) -> Result<RawNode> {
    let u = match value {
        NodeValue::None => RawNodePayload { int64: 0 },
        NodeValue::String(s) => RawNodePayload {
            string: codec::encode(s)?.into_raw(),
        },
        NodeValue::Flag(b) => RawNodePayload {
            flag: if *b { 1 } else { 0 },
        },
        NodeValue::Int64(i) => RawNodePayload { int64: *i },
        NodeValue::Double(d) => RawNodePayload { double: *d },
        NodeValue::Bytes(bytes) => RawNodePayload {
            byte_array: build_bytes(bytes),
        },
        NodeValue::Array(items) => RawNodePayload {
            list: build_array(items)?,
        },
        NodeValue::Map(pairs) => RawNodePayload {
            list: build_map(pairs)?,
        },
    };
    Ok(RawNode {
        u,
        format: value.format() as c_int,
    })
}

fn build_array(items: &[NodeValue]) -> Result<*mut RawNodeList> {
    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        match build_node(item) {
            Ok(node) => nodes.push(node),
            Err(e) => {
                unsafe { release_partial(nodes, Vec::new()) };
                return Err(e);
            }
        }
    }
    Ok(finish_list(nodes, ptr::null_mut()))
}

fn build_map(pairs: &[(String, NodeValue)]) -> Result<*mut RawNodeList> {
    let mut keys: Vec<*mut c_char> = Vec::with_capacity(pairs.len());
    let mut nodes = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let encoded_key = match codec::encode(key) {
            Ok(k) => k,
            Err(e) => {
                unsafe { release_partial(nodes, keys) };
                return Err(e);
            }
        };
        match build_node(value) {
            Ok(node) => {
                keys.push(encoded_key.into_raw());
                nodes.push(node);
            }
            Err(e) => {
                unsafe { release_partial(nodes, keys) };
                return Err(e);
            }
        }
    }
    let keys = into_raw_array(keys);
    Ok(finish_list(nodes, keys))
}

fn finish_list(nodes: Vec<RawNode>, keys: *mut *mut c_char) -> *mut RawNodeList {
    let num = nodes.len() as i32;
    let values = into_raw_array(nodes);
    Box::into_raw(Box::new(RawNodeList { num, values, keys }))
}

fn build_bytes(bytes: &[u8]) -> *mut RawByteArray {
    let data = if bytes.is_empty() {
        ptr::null_mut()
    } else {
        Box::into_raw(bytes.to_vec().into_boxed_slice()) as *mut std::os::raw::c_void
    };
    Box::into_raw(Box::new(RawByteArray {
        data,
        size: bytes.len(),
    }))
}

// An empty sequence gets a null reference; the engine accepts either null or
// a zero-length allocation here.
fn into_raw_array<T>(items: Vec<T>) -> *mut T {
    if items.is_empty() {
        ptr::null_mut()
    } else {
        Box::into_raw(items.into_boxed_slice()) as *mut T
    }
}

unsafe fn release_partial(nodes: Vec<RawNode>, keys: Vec<*mut c_char>) {
    for mut node in nodes {
        free_node(&mut node);
    }
    for key in keys {
        if !key.is_null() {
            drop(CString::from_raw(key));
        }
    }
}

// ============================================================================
// Destruction
// ============================================================================

/// Release a tree built by this module, mirror-image to construction.
///
/// The node is re-tagged None afterward so a second walk finds nothing to
/// release.
///
/// # Safety
///
/// `node` must have been produced by this module's construction path and not
/// released before.
pub(crate) unsafe fn free_node(node: &mut RawNode) {
    match Format::from_raw(node.format) {
        Some(Format::String) | Some(Format::OsdString) => {
            if !node.u.string.is_null() {
                drop(CString::from_raw(node.u.string));
            }
        }
        Some(Format::NodeArray) | Some(Format::NodeMap) => {
            if !node.u.list.is_null() {
                free_list(node.u.list);
            }
        }
        Some(Format::ByteArray) => {
            if !node.u.byte_array.is_null() {
                let bytes = Box::from_raw(node.u.byte_array);
                if !bytes.data.is_null() && bytes.size > 0 {
                    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                        bytes.data as *mut u8,
                        bytes.size,
                    )));
                }
            }
        }
        _ => {}
    }
    node.format = Format::None as c_int;
    node.u = RawNodePayload { int64: 0 };
}

unsafe fn free_list(list: *mut RawNodeList) {
    let list = Box::from_raw(list);
    let num = list.num.max(0) as usize;
    if !list.values.is_null() {
        let mut values = Box::from_raw(ptr::slice_from_raw_parts_mut(list.values, num));
        for node in values.iter_mut() {
            free_node(node);
        }
    }
    if !list.keys.is_null() {
        let keys = Box::from_raw(ptr::slice_from_raw_parts_mut(list.keys, num));
        for &key in keys.iter() {
            if !key.is_null() {
                drop(CString::from_raw(key));
            }
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

unsafe fn decode_values(list: *const RawNodeList) -> Vec<NodeValue> {
    let Some(list) = list.as_ref() else {
        return Vec::new();
    };
    let num = list.num.max(0) as usize;
    if list.values.is_null() {
        return Vec::new();
    }
    (0..num)
        .map(|i| NodeValue::from_raw(&*list.values.add(i)))
        .collect()
}

unsafe fn decode_pairs(list: *const RawNodeList) -> Vec<(String, NodeValue)> {
    let Some(list) = list.as_ref() else {
        return Vec::new();
    };
    let num = list.num.max(0) as usize;
    if list.values.is_null() || list.keys.is_null() {
        return Vec::new();
    }
    (0..num)
        .map(|i| {
            let key = codec::decode(*list.keys.add(i)).unwrap_or_default();
            (key, NodeValue::from_raw(&*list.values.add(i)))
        })
        .collect()
}

unsafe fn decode_bytes(bytes: *const RawByteArray) -> NodeValue {
    let Some(bytes) = bytes.as_ref() else {
        return NodeValue::None;
    };
    if bytes.data.is_null() || bytes.size == 0 {
        return NodeValue::Bytes(Vec::new());
    }
    let slice = std::slice::from_raw_parts(bytes.data as *const u8, bytes.size);
    NodeValue::Bytes(slice.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_array_lays_out_count_values_and_no_keys() {
        let value = NodeValue::strings(["screenshot-raw", "video"]);
        let tree = NodeTree::build(&value).unwrap();

        let root = tree.root();
        assert_eq!(root.format, Format::NodeArray as c_int);
        let list = unsafe { &*root.u.list };
        assert_eq!(list.num, 2);
        assert!(list.keys.is_null());
        assert!(!list.values.is_null());

        for (i, expected) in ["screenshot-raw", "video"].iter().enumerate() {
            let node = unsafe { &*list.values.add(i) };
            assert_eq!(node.format, Format::String as c_int);
            let decoded = unsafe { codec::decode(node.u.string) };
            assert_eq!(decoded.as_deref(), Some(*expected));
        }
    }

    #[test]
    fn empty_array_yields_count_zero_and_null_values() {
        let tree = NodeTree::build(&NodeValue::Array(Vec::new())).unwrap();
        let list = unsafe { &*tree.root().u.list };
        assert_eq!(list.num, 0);
        assert!(list.values.is_null());
        assert!(list.keys.is_null());
    }

    #[test]
    fn nested_tree_round_trips_through_the_wire_layout() {
        let value = NodeValue::Map(vec![
            (
                "name".to_string(),
                NodeValue::String("screenshot-raw".to_string()),
            ),
            ("async".to_string(), NodeValue::Flag(false)),
            (
                "args".to_string(),
                NodeValue::Array(vec![
                    NodeValue::Int64(-3),
                    NodeValue::Double(0.5),
                    NodeValue::None,
                ]),
            ),
        ]);
        let tree = NodeTree::build(&value).unwrap();
        let decoded = unsafe { NodeValue::from_raw(tree.root()) };
        assert_eq!(decoded, value);
    }

    #[test]
    fn byte_payload_round_trips() {
        let value = NodeValue::Bytes(vec![0, 159, 146, 150]);
        let tree = NodeTree::build(&value).unwrap();
        assert_eq!(tree.root().format, Format::ByteArray as c_int);
        assert_eq!(unsafe { NodeValue::from_raw(tree.root()) }, value);
    }

    #[test]
    fn scalar_formats_carry_their_payload_inline() {
        let tree = NodeTree::build(&NodeValue::Int64(1 << 40)).unwrap();
        assert_eq!(tree.root().format, Format::Int64 as c_int);
        assert_eq!(unsafe { tree.root().u.int64 }, 1 << 40);

        let tree = NodeTree::build(&NodeValue::Flag(true)).unwrap();
        assert_eq!(unsafe { tree.root().u.flag }, 1);
    }

    #[test]
    fn interior_zero_byte_fails_the_build_and_releases_partial_nodes() {
        let value = NodeValue::Array(vec![
            NodeValue::String("ok".to_string()),
            NodeValue::String("bad\0".to_string()),
        ]);
        assert!(NodeTree::build(&value).is_err());
    }

    #[test]
    fn json_bridging_preserves_structure() {
        // Keys in sorted order: serde_json's object does not preserve
        // insertion order, ours does.
        let value = NodeValue::Map(vec![
            ("format".to_string(), NodeValue::String("bgr0".to_string())),
            ("stride".to_string(), NodeValue::Int64(2560)),
            ("w".to_string(), NodeValue::Int64(640)),
        ]);
        let json = serde_json::Value::from(&value);
        assert_eq!(json["w"], 640);
        assert_eq!(json["format"], "bgr0");
        assert_eq!(NodeValue::from(&json), value);
    }

    #[test]
    fn byte_payloads_have_no_json_representation() {
        let json = serde_json::Value::from(&NodeValue::Bytes(vec![1, 2, 3]));
        assert!(json.is_null());
    }
}
