//! Raw ABI surface of the native playback engine.
//!
//! This module defines the exact binary layouts the engine expects and the
//! typed signatures of every entry point this layer consumes. Nothing here
//! calls into the engine; resolution and invocation live in the safe layers
//! above.
//!
//! # Memory Management
//!
//! - Buffers this layer allocates to encode arguments are owned by the call
//!   that allocated them and freed before it returns
//! - Buffers the engine allocates and hands back are owned by the engine and
//!   MUST be released through its own `free` entry point, never through the
//!   caller's allocator

use libloading::Library;
use std::os::raw::{c_char, c_int, c_void};

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to one native engine instance.
///
/// Only ever used behind a raw pointer; the engine owns the allocation.
#[repr(C)]
pub struct RawHandle {
    _private: [u8; 0],
}

// ============================================================================
// Value Formats
// ============================================================================

/// Tag identifying how a node or property payload must be interpreted.
///
/// Every payload is read and written using the layout implied by its tag; a
/// mismatched tag/payload pair is undefined and must not be constructed.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    None = 0,
    String = 1,
    OsdString = 2,
    Flag = 3,
    Int64 = 4,
    Double = 5,
    Node = 6,
    NodeArray = 7,
    NodeMap = 8,
    ByteArray = 9,
}

impl Format {
    /// Interpret a raw tag read back from the engine.
    pub fn from_raw(raw: c_int) -> Option<Format> {
        match raw {
            0 => Some(Format::None),
            1 => Some(Format::String),
            2 => Some(Format::OsdString),
            3 => Some(Format::Flag),
            4 => Some(Format::Int64),
            5 => Some(Format::Double),
            6 => Some(Format::Node),
            7 => Some(Format::NodeArray),
            8 => Some(Format::NodeMap),
            9 => Some(Format::ByteArray),
            _ => None,
        }
    }
}

// ============================================================================
// Node Wire Layout
// ============================================================================

/// Payload of a [`RawNode`], interpreted per its format tag.
///
/// Scalars (flag, int64, double) live inline in these 8 bytes; strings, lists
/// and byte arrays are referenced through pointers.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawNodePayload {
    pub string: *mut c_char,
    pub flag: c_int,
    pub int64: i64,
    pub double: f64,
    pub list: *mut RawNodeList,
    pub byte_array: *mut RawByteArray,
}

/// Tagged value: payload first, format tag second, exactly as the engine
/// lays it out.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawNode {
    pub u: RawNodePayload,
    pub format: c_int,
}

impl RawNode {
    /// An empty node pre-tagged with `format` and a zeroed payload, ready for
    /// the engine to populate.
    pub fn empty(format: Format) -> RawNode {
        RawNode {
            u: RawNodePayload { int64: 0 },
            format: format as c_int,
        }
    }
}

/// Backing list of a NodeArray or NodeMap.
///
/// `num` matches the length of the `values` array; `keys` is null for arrays
/// and an array of `num` null-terminated names for maps.
#[repr(C)]
pub struct RawNodeList {
    pub num: i32,
    pub values: *mut RawNode,
    pub keys: *mut *mut c_char,
}

/// Backing storage of a ByteArray payload.
#[repr(C)]
pub struct RawByteArray {
    pub data: *mut c_void,
    pub size: usize,
}

// ============================================================================
// Entry Point Signatures
// ============================================================================

pub type CreateFn = unsafe extern "C" fn() -> *mut RawHandle;
pub type InitializeFn = unsafe extern "C" fn(*mut RawHandle) -> c_int;
pub type TerminateDestroyFn = unsafe extern "C" fn(*mut RawHandle);
pub type CommandFn = unsafe extern "C" fn(*mut RawHandle, *mut *mut c_char) -> c_int;
pub type CommandNodeFn = unsafe extern "C" fn(*mut RawHandle, *mut RawNode, *mut RawNode) -> c_int;
pub type SetOptionFn =
    unsafe extern "C" fn(*mut RawHandle, *const c_char, c_int, *mut c_void) -> c_int;
pub type SetOptionStringFn =
    unsafe extern "C" fn(*mut RawHandle, *const c_char, *const c_char) -> c_int;
pub type GetPropertyFn =
    unsafe extern "C" fn(*mut RawHandle, *const c_char, c_int, *mut c_void) -> c_int;
pub type SetPropertyFn =
    unsafe extern "C" fn(*mut RawHandle, *const c_char, c_int, *mut c_void) -> c_int;
pub type FreeFn = unsafe extern "C" fn(*mut c_void);
pub type FreeNodeContentsFn = unsafe extern "C" fn(*mut RawNode);

// ============================================================================
// Entry Point Set
// ============================================================================

/// The fixed set of entry points resolved from the loaded library.
///
/// Each is `None` when the symbol was absent at load time. An unresolved
/// entry point must never be invoked: every call site branches on
/// availability and degrades to a no-op or a documented failure signal.
#[derive(Clone, Copy, Default)]
pub struct EntryPoints {
    pub create: Option<CreateFn>,
    pub initialize: Option<InitializeFn>,
    pub terminate_destroy: Option<TerminateDestroyFn>,
    pub command: Option<CommandFn>,
    pub command_node: Option<CommandNodeFn>,
    pub set_option: Option<SetOptionFn>,
    pub set_option_string: Option<SetOptionStringFn>,
    pub get_property: Option<GetPropertyFn>,
    pub set_property: Option<SetPropertyFn>,
    pub free: Option<FreeFn>,
    pub free_node_contents: Option<FreeNodeContentsFn>,
}

impl EntryPoints {
    /// Resolve every entry point from `lib`, once.
    ///
    /// A missing symbol is recorded as `None`, never an error.
    ///
    /// # Safety
    ///
    /// The resolved function pointers are only valid while `lib` stays
    /// loaded; the caller must keep the library alive for as long as the
    /// returned set is used.
    pub unsafe fn resolve(lib: &Library) -> EntryPoints {
        EntryPoints {
            create: resolve_symbol(lib, b"mpv_create\0"),
            initialize: resolve_symbol(lib, b"mpv_initialize\0"),
            terminate_destroy: resolve_symbol(lib, b"mpv_terminate_destroy\0"),
            command: resolve_symbol(lib, b"mpv_command\0"),
            command_node: resolve_symbol(lib, b"mpv_command_node\0"),
            set_option: resolve_symbol(lib, b"mpv_set_option\0"),
            set_option_string: resolve_symbol(lib, b"mpv_set_option_string\0"),
            get_property: resolve_symbol(lib, b"mpv_get_property\0"),
            set_property: resolve_symbol(lib, b"mpv_set_property\0"),
            free: resolve_symbol(lib, b"mpv_free\0"),
            free_node_contents: resolve_symbol(lib, b"mpv_free_node_contents\0"),
        }
    }

    /// Names of required entry points that did not resolve.
    ///
    /// `mpv_free_node_contents` is optional (its absence only means
    /// engine-populated output trees are not released) and is not reported.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.create.is_none() {
            missing.push("mpv_create");
        }
        if self.initialize.is_none() {
            missing.push("mpv_initialize");
        }
        if self.terminate_destroy.is_none() {
            missing.push("mpv_terminate_destroy");
        }
        if self.command.is_none() {
            missing.push("mpv_command");
        }
        if self.command_node.is_none() {
            missing.push("mpv_command_node");
        }
        if self.set_option.is_none() {
            missing.push("mpv_set_option");
        }
        if self.set_option_string.is_none() {
            missing.push("mpv_set_option_string");
        }
        if self.get_property.is_none() {
            missing.push("mpv_get_property");
        }
        if self.set_property.is_none() {
            missing.push("mpv_set_property");
        }
        if self.free.is_none() {
            missing.push("mpv_free");
        }
        missing
    }
}

/// Copy a typed function pointer out of the library, or `None` if the symbol
/// is absent.
unsafe fn resolve_symbol<T: Copy>(lib: &Library, name: &'static [u8]) -> Option<T> {
    match lib.get::<T>(name) {
        Ok(symbol) => Some(*symbol),
        Err(_) => {
            let printable = std::str::from_utf8(&name[..name.len() - 1]).unwrap_or("?");
            tracing::debug!("entry point {} not found in engine library", printable);
            None
        }
    }
}
