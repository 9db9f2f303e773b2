//! Playback orchestration: one live session, recreated per play request.
//!
//! This is the layer UI actions call into. It owns the loaded engine library
//! (every operation no-ops when the load failed), enforces the at-most-one
//! initialized session rule, and carries the diagnostic log file side
//! channel.

use crate::error::{Error, Result, Status};
use crate::ffi::Format;
use crate::library::EngineLibrary;
use crate::node::NodeValue;
use crate::session::Session;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Snapshot of the current playback state, JSON-serializable for reporting.
#[derive(Debug, Serialize)]
pub struct PlaybackStatus {
    pub path: Option<String>,
    pub paused: bool,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
}

/// Drives the engine through its documented operations.
pub struct Player {
    library: Option<Arc<EngineLibrary>>,
    session: Option<Session>,
    window_id: Option<i64>,
    log_file: Option<PathBuf>,
    current: Option<String>,
}

impl Player {
    /// Load the engine by its conventional platform names.
    ///
    /// A failed load is not fatal: the player is constructed without a
    /// library and every operation reports [`Error::EngineUnavailable`].
    pub fn new() -> Player {
        Player::from_load_result(EngineLibrary::load_default())
    }

    /// Load a specific library name or path instead of the defaults.
    pub fn with_library(name: &str) -> Player {
        Player::from_load_result(EngineLibrary::load(name))
    }

    /// Wrap an already loaded library.
    pub fn from_library(library: EngineLibrary) -> Player {
        Player {
            library: Some(Arc::new(library)),
            session: None,
            window_id: None,
            log_file: None,
            current: None,
        }
    }

    fn from_load_result(result: Result<EngineLibrary>) -> Player {
        let library = match result {
            Ok(library) => Some(Arc::new(library)),
            Err(e) => {
                warn!("engine library unavailable: {}", e);
                None
            }
        };
        Player {
            library,
            session: None,
            window_id: None,
            log_file: None,
            current: None,
        }
    }

    /// Whether the engine library loaded.
    pub fn is_available(&self) -> bool {
        self.library.is_some()
    }

    /// Native window id to attach video output to, applied at the next play.
    pub fn attach_window(&mut self, window_id: i64) {
        self.window_id = Some(window_id);
    }

    /// The live session, if one exists.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn live_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::SessionGone)
    }

    /// Start playing `path` in a fresh session.
    ///
    /// Any existing session is terminated and destroyed first; sessions are
    /// never reused across play requests. Reusing the session is cheaper, see
    /// [`Player::load_file`], but a new play deliberately starts from a clean
    /// instance. Option-set failures are logged and do not abort the
    /// sequence; the returned status is the engine's answer to `loadfile`,
    /// unchanged.
    pub fn play(&mut self, path: &str) -> Result<Status> {
        if let Some(mut session) = self.session.take() {
            session.terminate_destroy();
        }
        let library = self.library.clone().ok_or(Error::EngineUnavailable)?;

        let mut session = Session::create(library)?;
        let status = session.initialize()?;
        if status.is_err() {
            return Ok(status);
        }

        warn_on_failure("keep-open", session.set_option_string("keep-open", "always")?);
        if let Some(window_id) = self.window_id {
            warn_on_failure("wid", session.set_option_int64("wid", window_id)?);
        }
        if let Some(log_file) = &self.log_file {
            warn_on_failure(
                "log-file",
                session.set_option_string("log-file", &log_file.to_string_lossy())?,
            );
        }

        let status = session.command(&["loadfile", path])?;
        self.current = Some(path.to_string());
        self.session = Some(session);
        Ok(status)
    }

    /// Load `path` into the existing session instead of recreating it.
    pub fn load_file(&mut self, path: &str) -> Result<Status> {
        let status = self.live_session()?.command(&["loadfile", path])?;
        self.current = Some(path.to_string());
        Ok(status)
    }

    pub fn pause(&self) -> Result<Status> {
        self.live_session()?.set_paused(true)
    }

    pub fn resume(&self) -> Result<Status> {
        self.live_session()?.set_paused(false)
    }

    /// Pause if playing, resume if paused.
    pub fn toggle_pause(&self) -> Result<Status> {
        if self.live_session()?.is_paused()? {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// Paused state; a player without a session reports paused.
    pub fn is_paused(&self) -> bool {
        match &self.session {
            Some(session) => session.is_paused().unwrap_or(true),
            None => true,
        }
    }

    /// Seek to an absolute position. Seconds are formatted with `.` as the
    /// decimal separator regardless of locale.
    pub fn seek(&self, seconds: f64) -> Result<Status> {
        self.live_session()?
            .command(&["seek", &format_seconds(seconds), "absolute"])
    }

    /// Pause and rewind to the start.
    pub fn stop(&self) -> Result<Status> {
        self.pause()?;
        self.seek(0.0)
    }

    /// Grab the current video frame via the node command interface.
    ///
    /// Returns the engine's status unchanged plus the decoded output map
    /// (dimensions, stride, pixel format, and the raw pixel bytes, all of it
    /// engine-defined).
    pub fn screenshot_raw(&self) -> Result<(Status, NodeValue)> {
        self.live_session()?.command_node(
            &NodeValue::strings(["screenshot-raw", "video"]),
            Format::NodeMap,
        )
    }

    /// Route engine diagnostics to a log file.
    ///
    /// With no explicit path a timestamped name is generated. Applies to the
    /// live session immediately and to every later session at play time.
    pub fn enable_logging(&mut self, path: Option<PathBuf>) -> Result<PathBuf> {
        let path = path.unwrap_or_else(|| {
            PathBuf::from(format!(
                "mpv-{}.log",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ))
        });
        if let Some(session) = &self.session {
            warn_on_failure(
                "log-file",
                session.set_option_string("log-file", &path.to_string_lossy())?,
            );
        }
        self.log_file = Some(path.clone());
        Ok(path)
    }

    /// Read what the engine has logged so far.
    ///
    /// The file is opened with shared read access; the engine may still be
    /// appending, so a torn UTF-8 tail is tolerated via lossy decoding.
    /// `None` when logging was never enabled, an empty string when the engine
    /// has not created the file yet.
    pub fn read_log(&self) -> Result<Option<String>> {
        let Some(path) = &self.log_file else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(Some(String::new()));
        }
        let bytes = std::fs::read(path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Snapshot the current playback state.
    pub fn status(&self) -> PlaybackStatus {
        let (time_pos, duration) = match &self.session {
            Some(session) => (
                session.get_property_double("time-pos").ok().flatten(),
                session.get_property_double("duration").ok().flatten(),
            ),
            None => (None, None),
        };
        PlaybackStatus {
            path: self.current.clone(),
            paused: self.is_paused(),
            time_pos,
            duration,
        }
    }

    /// Terminate and destroy the live session, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.terminate_destroy();
        }
    }
}

impl Default for Player {
    fn default() -> Player {
        Player::new()
    }
}

fn warn_on_failure(option: &str, status: Status) {
    if status.is_err() {
        warn!("setting option {} failed with status {}", option, status);
    }
}

fn format_seconds(seconds: f64) -> String {
    // f64 Display never uses a locale-dependent separator.
    format!("{}", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::stub;
    use std::sync::atomic::Ordering;

    fn stub_player() -> Player {
        Player::from_library(EngineLibrary::from_entry_points(stub::entry_points()))
    }

    #[test]
    fn play_applies_options_and_dispatches_loadfile() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let mut player = stub_player();
        player.attach_window(0x1234);
        let status = player.play("/tmp/clip.mkv").unwrap();
        assert!(status.is_ok());

        let options = stub::OPTIONS.lock().unwrap();
        assert!(options.contains(&("keep-open".to_string(), "always".to_string())));
        assert!(options.contains(&("wid".to_string(), (0x1234).to_string())));
        drop(options);

        assert_eq!(
            stub::COMMANDS.lock().unwrap().as_slice(),
            &[vec!["loadfile".to_string(), "/tmp/clip.mkv".to_string()]]
        );
        assert_eq!(player.status().path.as_deref(), Some("/tmp/clip.mkv"));
    }

    #[test]
    fn replay_destroys_the_previous_session_before_creating_a_new_one() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();
        let before = stub::DESTROYED.load(Ordering::SeqCst);

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before);

        player.play("/tmp/b.mkv").unwrap();
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before + 1);

        player.shutdown();
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn load_file_reuses_the_existing_session() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();
        let before = stub::DESTROYED.load(Ordering::SeqCst);

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        player.load_file("/tmp/b.mkv").unwrap();
        assert_eq!(stub::DESTROYED.load(Ordering::SeqCst), before);
        assert_eq!(stub::COMMANDS.lock().unwrap().len(), 2);
        assert_eq!(player.status().path.as_deref(), Some("/tmp/b.mkv"));
    }

    #[test]
    fn seek_formats_fractional_seconds_with_a_dot() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        player.seek(3.5).unwrap();

        let commands = stub::COMMANDS.lock().unwrap();
        assert_eq!(
            commands.last().unwrap(),
            &vec!["seek".to_string(), "3.5".to_string(), "absolute".to_string()]
        );
    }

    #[test]
    fn stop_pauses_then_rewinds() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        player.stop().unwrap();

        assert!(player.is_paused());
        let commands = stub::COMMANDS.lock().unwrap();
        assert_eq!(
            commands.last().unwrap(),
            &vec!["seek".to_string(), "0".to_string(), "absolute".to_string()]
        );
    }

    #[test]
    fn toggle_flips_the_pause_property() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        player.resume().unwrap();
        assert!(!player.is_paused());

        player.toggle_pause().unwrap();
        assert!(player.is_paused());
        player.toggle_pause().unwrap();
        assert!(!player.is_paused());
    }

    #[test]
    fn screenshot_raw_goes_through_the_node_command() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let mut player = stub_player();
        player.play("/tmp/a.mkv").unwrap();
        let (status, output) = player.screenshot_raw().unwrap();
        assert_eq!(status, Status::SUCCESS);
        assert!(matches!(output, NodeValue::Map(_)));
        assert_eq!(
            stub::COMMANDS.lock().unwrap().last().unwrap(),
            &vec!["screenshot-raw".to_string(), "video".to_string()]
        );
    }

    #[test]
    fn operations_without_a_session_are_rejected() {
        let _guard = stub::LOCK.lock().unwrap();
        stub::reset();

        let player = stub_player();
        assert!(matches!(player.pause(), Err(Error::SessionGone)));
        assert!(matches!(player.seek(1.0), Err(Error::SessionGone)));
        assert!(player.is_paused());
        assert!(stub::COMMANDS.lock().unwrap().is_empty());
    }
}
