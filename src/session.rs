//! One native engine instance: create → initialize → use → terminate-destroy.
//!
//! All calls into the engine are synchronous and blocking, and every call on
//! one handle must be serialized. The session holds raw pointers and is
//! therefore neither `Send` nor `Sync`; a single logical thread of control
//! drives it.

use crate::args::ArgBuffer;
use crate::codec;
use crate::error::{Error, Result, Status};
use crate::ffi::{EntryPoints, Format, RawHandle, RawNode};
use crate::library::EngineLibrary;
use crate::node::{NodeTree, NodeValue};
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a session is in its lifecycle. Destroyed is terminal; sessions are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Destroyed,
}

/// An owned native engine instance.
///
/// Dropping the session terminates and destroys the native instance if the
/// caller has not already done so explicitly.
pub struct Session {
    library: Arc<EngineLibrary>,
    handle: *mut RawHandle,
    state: SessionState,
}

impl Session {
    /// Ask the engine for a fresh instance.
    ///
    /// Returns [`Error::MissingEntryPoint`] if create was never resolved and
    /// [`Error::CreateFailed`] if the engine handed back null.
    pub fn create(library: Arc<EngineLibrary>) -> Result<Session> {
        let create = library
            .entry()
            .create
            .ok_or(Error::MissingEntryPoint("mpv_create"))?;
        let handle = unsafe { create() };
        if handle.is_null() {
            return Err(Error::CreateFailed);
        }
        debug!("created engine session");
        Ok(Session {
            library,
            handle,
            state: SessionState::Created,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn entry(&self) -> &EntryPoints {
        self.library.entry()
    }

    /// The handle, if this session is still alive.
    pub(crate) fn live_handle(&self) -> Result<*mut RawHandle> {
        if self.handle.is_null() {
            Err(Error::SessionGone)
        } else {
            Ok(self.handle)
        }
    }

    /// Initialize the instance. The status code is the engine's, unchanged;
    /// the session only advances to Initialized when it reports success.
    pub fn initialize(&mut self) -> Result<Status> {
        let handle = self.live_handle()?;
        let initialize = self
            .entry()
            .initialize
            .ok_or(Error::MissingEntryPoint("mpv_initialize"))?;
        let status = Status(unsafe { initialize(handle) });
        if status.is_ok() {
            self.state = SessionState::Initialized;
        } else {
            warn!("engine initialize failed with status {}", status);
        }
        Ok(status)
    }

    /// Set an option by name with a string value.
    pub fn set_option_string(&self, name: &str, value: &str) -> Result<Status> {
        let handle = self.live_handle()?;
        let set_option_string = self
            .entry()
            .set_option_string
            .ok_or(Error::MissingEntryPoint("mpv_set_option_string"))?;
        let name = codec::encode(name)?;
        let value = codec::encode(value)?;
        Ok(Status(unsafe {
            set_option_string(handle, name.as_ptr(), value.as_ptr())
        }))
    }

    /// Set an Int64-tagged option, e.g. the native window id video output
    /// attaches to.
    pub fn set_option_int64(&self, name: &str, value: i64) -> Result<Status> {
        let handle = self.live_handle()?;
        let set_option = self
            .entry()
            .set_option
            .ok_or(Error::MissingEntryPoint("mpv_set_option"))?;
        let name = codec::encode(name)?;
        let mut value = value;
        Ok(Status(unsafe {
            set_option(
                handle,
                name.as_ptr(),
                Format::Int64 as c_int,
                &mut value as *mut i64 as *mut c_void,
            )
        }))
    }

    /// Dispatch a flat string command.
    ///
    /// Every buffer encoded for the call (the element strings and the
    /// sentinel-terminated pointer array) is released before this returns,
    /// whether or not the engine reported success.
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Result<Status> {
        let handle = self.live_handle()?;
        let command = self
            .entry()
            .command
            .ok_or(Error::MissingEntryPoint("mpv_command"))?;
        let mut buffer = ArgBuffer::new(args)?;
        let status = Status(unsafe { command(handle, buffer.as_ptr()) });
        Ok(status)
    }

    /// Dispatch a command in node form.
    ///
    /// The input tree is allocated here and released here on every exit path.
    /// The output node is pre-tagged with `output_format` for the engine to
    /// populate; on success its contents are copied out and then released
    /// through the engine's node-free entry point when that symbol resolved.
    /// The status code reaches the caller unchanged.
    pub fn command_node(
        &self,
        input: &NodeValue,
        output_format: Format,
    ) -> Result<(Status, NodeValue)> {
        let handle = self.live_handle()?;
        let command_node = self
            .entry()
            .command_node
            .ok_or(Error::MissingEntryPoint("mpv_command_node"))?;
        let mut input_tree = NodeTree::build(input)?;
        let mut output = RawNode::empty(output_format);
        let status =
            Status(unsafe { command_node(handle, input_tree.root_ptr(), &mut output) });
        if status.is_err() {
            return Ok((status, NodeValue::None));
        }
        let value = unsafe { NodeValue::from_raw(&output) };
        if let Some(free_node_contents) = self.entry().free_node_contents {
            unsafe { free_node_contents(&mut output) };
        }
        Ok((status, value))
    }

    /// Terminate and destroy the native instance.
    ///
    /// The handle is cleared before returning, so the native call can happen
    /// at most once per created instance; further operations on this session
    /// are rejected as [`Error::SessionGone`]. Safe to call repeatedly.
    pub fn terminate_destroy(&mut self) {
        if self.handle.is_null() {
            return;
        }
        let handle = self.handle;
        self.handle = ptr::null_mut();
        self.state = SessionState::Destroyed;
        match self.entry().terminate_destroy {
            Some(terminate_destroy) => {
                unsafe { terminate_destroy(handle) };
                debug!("destroyed engine session");
            }
            None => warn!("mpv_terminate_destroy unresolved; engine instance leaked"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.terminate_destroy();
    }
}


#[cfg(test)]
mod tests {
    use super::stub;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn create_initialize_command_flow() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::COMMANDS.lock().unwrap().clear();

        let mut session = Session::create(stub::library()).unwrap();
        assert_eq!(session.state(), SessionState::Created);

        assert_eq!(session.initialize().unwrap(), Status::SUCCESS);
        assert_eq!(session.state(), SessionState::Initialized);

        let status = session.command(&["loadfile", "/tmp/clip.mkv"]).unwrap();
        assert!(status.is_ok());
        assert_eq!(
            stub::COMMANDS.lock().unwrap().as_slice(),
            &[vec!["loadfile".to_string(), "/tmp/clip.mkv".to_string()]]
        );
    }

    #[test]
    fn initialize_failure_propagates_the_code_unchanged() {
        let _guard = stub::LOCK.lock().unwrap();
        let entry = EntryPoints {
            initialize: Some(stub::initialize_failing),
            ..stub::entry_points()
        };
        let mut session =
            Session::create(Arc::new(EngineLibrary::from_entry_points(entry))).unwrap();
        assert_eq!(session.initialize().unwrap(), Status(-5));
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn operations_after_destroy_are_rejected_without_native_calls() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::COMMANDS.lock().unwrap().clear();
        let before = stub::DESTROYED.load(Ordering::SeqCst);

        let mut session = Session::create(stub::library()).unwrap();
        session.initialize().unwrap();
        session.terminate_destroy();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before + 1);

        assert!(matches!(session.initialize(), Err(Error::SessionGone)));
        assert!(matches!(
            session.command(&["stop"]),
            Err(Error::SessionGone)
        ));
        assert!(matches!(
            session.set_option_string("keep-open", "always"),
            Err(Error::SessionGone)
        ));
        assert!(stub::COMMANDS.lock().unwrap().is_empty());

        // Explicit destroy plus drop must still release exactly once.
        session.terminate_destroy();
        drop(session);
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn dropping_a_live_session_destroys_it() {
        let _guard = stub::LOCK.lock().unwrap();
        let before = stub::DESTROYED.load(Ordering::SeqCst);
        let session = Session::create(stub::library()).unwrap();
        drop(session);
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn command_node_returns_status_and_decoded_output() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::COMMANDS.lock().unwrap().clear();

        let mut session = Session::create(stub::library()).unwrap();
        session.initialize().unwrap();

        let input = NodeValue::strings(["screenshot-raw", "video"]);
        let (status, output) = session.command_node(&input, Format::NodeMap).unwrap();
        assert_eq!(status, Status::SUCCESS);

        let NodeValue::Map(pairs) = output else {
            panic!("expected a map, got {:?}", output);
        };
        assert!(pairs.contains(&("w".to_string(), NodeValue::Int64(640))));
        assert!(pairs.contains(&("format".to_string(), NodeValue::String("bgr0".to_string()))));

        assert_eq!(
            stub::COMMANDS.lock().unwrap().as_slice(),
            &[vec!["screenshot-raw".to_string(), "video".to_string()]]
        );
    }

    #[test]
    fn unresolved_create_is_reported_not_invoked() {
        let entry = EntryPoints::default();
        let result = Session::create(Arc::new(EngineLibrary::from_entry_points(entry)));
        assert!(matches!(result, Err(Error::MissingEntryPoint("mpv_create"))));
    }

    #[test]
    fn null_create_result_is_a_create_failure() {
        let entry = EntryPoints {
            create: Some(stub::create_null),
            ..stub::entry_points()
        };
        let result = Session::create(Arc::new(EngineLibrary::from_entry_points(entry)));
        assert!(matches!(result, Err(Error::CreateFailed)));
    }
}
