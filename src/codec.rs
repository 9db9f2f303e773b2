//! Text codec for the engine boundary: UTF-8 plus one trailing zero byte.

use crate::error::{Error, Result};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Encode `text` as the engine expects it: UTF-8 followed by a zero byte.
///
/// Text with an interior zero byte cannot be represented and is rejected
/// before anything crosses the boundary.
pub fn encode(text: &str) -> Result<CString> {
    CString::new(text).map_err(|_| Error::Encoding(text.to_string()))
}

/// Copy a null-terminated UTF-8 buffer out into an owned `String`.
///
/// Never retains the buffer: the caller still owns it and is responsible for
/// releasing it afterward (engine-owned buffers go through the engine's free
/// entry point). A null pointer or a buffer that is not valid UTF-8 decodes
/// to `None`.
///
/// # Safety
///
/// `ptr`, if non-null, must point to a null-terminated buffer that stays
/// valid for the duration of the call.
pub unsafe fn decode(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let encoded = encode("loadfile").unwrap();
        let decoded = unsafe { decode(encoded.as_ptr()) };
        assert_eq!(decoded.as_deref(), Some("loadfile"));
    }

    #[test]
    fn encode_appends_exactly_one_zero_byte() {
        let encoded = encode("pause").unwrap();
        assert_eq!(encoded.as_bytes_with_nul(), b"pause\0");
    }

    #[test]
    fn interior_zero_byte_is_rejected() {
        assert!(matches!(encode("a\0b"), Err(Error::Encoding(_))));
    }

    #[test]
    fn null_pointer_decodes_to_none() {
        assert_eq!(unsafe { decode(std::ptr::null()) }, None);
    }

    #[test]
    fn non_ascii_text_survives_the_boundary() {
        let encoded = encode("média – файл").unwrap();
        let decoded = unsafe { decode(encoded.as_ptr()) };
        assert_eq!(decoded.as_deref(), Some("média – файл"));
    }
}
