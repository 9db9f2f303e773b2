//! Typed property access on a live session.
//!
//! Values cross the boundary tagged with a [`Format`]; the payload layout
//! follows the tag. String reads hand back an engine-owned buffer that is
//! decoded by copy and then released through the engine's free entry point,
//! never through this side's allocator.

use crate::codec;
use crate::error::{Error, Result, Status};
use crate::ffi::Format;
use crate::session::Session;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

impl Session {
    /// Read a String-tagged property.
    ///
    /// A failed read or an undecodable buffer is an absent value, not an
    /// error.
    pub fn get_property_string(&self, name: &str) -> Result<Option<String>> {
        let handle = self.live_handle()?;
        let get_property = self
            .entry()
            .get_property
            .ok_or(Error::MissingEntryPoint("mpv_get_property"))?;
        let name = codec::encode(name)?;
        let mut out: *mut c_char = ptr::null_mut();
        let status = Status(unsafe {
            get_property(
                handle,
                name.as_ptr(),
                Format::String as c_int,
                &mut out as *mut *mut c_char as *mut c_void,
            )
        });
        if status.is_err() || out.is_null() {
            return Ok(None);
        }
        let value = unsafe { codec::decode(out) };
        if let Some(free) = self.entry().free {
            unsafe { free(out as *mut c_void) };
        }
        Ok(value)
    }

    /// Write a String-tagged property. The wire contract takes a pointer to
    /// the string pointer.
    pub fn set_property_string(&self, name: &str, value: &str) -> Result<Status> {
        let value = codec::encode(value)?;
        let mut value_ptr = value.as_ptr() as *mut c_char;
        self.set_property_raw(
            name,
            Format::String,
            &mut value_ptr as *mut *mut c_char as *mut c_void,
        )
    }

    pub fn get_property_int64(&self, name: &str) -> Result<Option<i64>> {
        let mut out: i64 = 0;
        let status = self.get_property_raw(name, Format::Int64, &mut out as *mut i64 as *mut c_void)?;
        Ok(status.is_ok().then_some(out))
    }

    pub fn set_property_int64(&self, name: &str, value: i64) -> Result<Status> {
        let mut value = value;
        self.set_property_raw(name, Format::Int64, &mut value as *mut i64 as *mut c_void)
    }

    pub fn get_property_double(&self, name: &str) -> Result<Option<f64>> {
        let mut out: f64 = 0.0;
        let status =
            self.get_property_raw(name, Format::Double, &mut out as *mut f64 as *mut c_void)?;
        Ok(status.is_ok().then_some(out))
    }

    pub fn set_property_double(&self, name: &str, value: f64) -> Result<Status> {
        let mut value = value;
        self.set_property_raw(name, Format::Double, &mut value as *mut f64 as *mut c_void)
    }

    pub fn get_property_flag(&self, name: &str) -> Result<Option<bool>> {
        let mut out: c_int = 0;
        let status =
            self.get_property_raw(name, Format::Flag, &mut out as *mut c_int as *mut c_void)?;
        Ok(status.is_ok().then_some(out != 0))
    }

    pub fn set_property_flag(&self, name: &str, value: bool) -> Result<Status> {
        let mut value: c_int = if value { 1 } else { 0 };
        self.set_property_raw(name, Format::Flag, &mut value as *mut c_int as *mut c_void)
    }

    /// Whether playback is paused.
    ///
    /// "pause" is a String-typed boolean with the values "yes"/"no", the
    /// engine's documented convention, not a general boolean format.
    pub fn is_paused(&self) -> Result<bool> {
        Ok(self.get_property_string("pause")?.as_deref() == Some("yes"))
    }

    pub fn set_paused(&self, paused: bool) -> Result<Status> {
        self.set_property_string("pause", if paused { "yes" } else { "no" })
    }

    fn get_property_raw(&self, name: &str, format: Format, data: *mut c_void) -> Result<Status> {
        let handle = self.live_handle()?;
        let get_property = self
            .entry()
            .get_property
            .ok_or(Error::MissingEntryPoint("mpv_get_property"))?;
        let name = codec::encode(name)?;
        Ok(Status(unsafe {
            get_property(handle, name.as_ptr(), format as c_int, data)
        }))
    }

    fn set_property_raw(&self, name: &str, format: Format, data: *mut c_void) -> Result<Status> {
        let handle = self.live_handle()?;
        let set_property = self
            .entry()
            .set_property
            .ok_or(Error::MissingEntryPoint("mpv_set_property"))?;
        let name = codec::encode(name)?;
        Ok(Status(unsafe {
            set_property(handle, name.as_ptr(), format as c_int, data)
        }))
    }
}
