//! Sentinel-terminated argument buffers for flat (string-only) commands.

use crate::codec;
use crate::error::Result;
use std::os::raw::c_char;

/// An encoded argument list in the layout the engine's command entry point
/// walks: `n` null-terminated string pointers followed by exactly one null
/// sentinel, total length `n + 1`.
///
/// Pure value construction: building one performs no native call. The buffer
/// owns every allocation it made (the `n` element buffers and the one root
/// pointer array) and releases each exactly once on drop, on every exit path
/// of the call it serves, whether or not the native call succeeded.
pub struct ArgBuffer {
    // Root array; the last slot is always the null sentinel.
    ptrs: Box<[*mut c_char]>,
}

impl ArgBuffer {
    /// Encode `args` in order and lay out the pointer array.
    pub fn new<S: AsRef<str>>(args: &[S]) -> Result<ArgBuffer> {
        let mut ptrs = Vec::with_capacity(args.len() + 1);
        for arg in args {
            match codec::encode(arg.as_ref()) {
                Ok(encoded) => ptrs.push(encoded.into_raw()),
                Err(e) => {
                    // Release the elements already encoded before bailing.
                    for ptr in ptrs {
                        unsafe { drop(std::ffi::CString::from_raw(ptr)) };
                    }
                    return Err(e);
                }
            }
        }
        ptrs.push(std::ptr::null_mut());
        Ok(ArgBuffer {
            ptrs: ptrs.into_boxed_slice(),
        })
    }

    /// Root pointer to hand to the engine.
    pub fn as_ptr(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }

    /// The pointer slots, sentinel included.
    pub fn pointers(&self) -> &[*mut c_char] {
        &self.ptrs
    }

    /// Total number of slots, always `args.len() + 1`.
    pub fn len(&self) -> usize {
        self.ptrs.len()
    }

    /// An argument buffer is never empty: it holds at least the sentinel.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Drop for ArgBuffer {
    fn drop(&mut self) {
        // n element buffers; the root array goes when the box does.
        for &ptr in self.ptrs.iter() {
            if !ptr.is_null() {
                unsafe { drop(std::ffi::CString::from_raw(ptr)) };
            }
        }
    }
}
