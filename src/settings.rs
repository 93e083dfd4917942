//! Settings for the serial control channel, the local artifacts to push and
//! the remote layout on the board.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

// =============================================================================
// Public Interface
// =============================================================================

/// Groups all settings for one deployment run and acts as the value produced
/// by the [`SettingsBuilder`].
///
/// The settle delays default to values tuned for common ESP32/Pico boards.
/// They are tunables, not protocol invariants; a slower board may need more
/// generous values, never less.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The port name, usually the device path.
    pub path: Option<String>,
    /// The baud rate in symbols-per-second. The MicroPython REPL runs its
    /// line discipline at 115200.
    pub baud_rate: u32,
    /// Read timeout applied to the serial handle during the interrupt step.
    pub read_timeout: Duration,

    /// Path to the compiled program to push. The rewrite stage writes
    /// `main.py` by default, so the push stage looks for the same.
    pub program_file: String,
    /// Path to the runtime support file the generated program imports.
    pub runtime_file: String,

    /// Remote directory receiving library files, created if missing.
    pub remote_lib_dir: String,
    /// Remote path of the user program. MicroPython auto-runs `/main.py`
    /// after reset, so this stays fixed regardless of the local file name.
    pub remote_program: String,

    /// Pause after each interrupt byte, letting the running program yield.
    pub interrupt_settle: Duration,
    /// Pause after the soft-reboot byte while the interpreter restarts.
    pub reboot_settle: Duration,
    /// Pause after closing the serial handle, before the transfer backend
    /// opens its own connection to the same port.
    pub reconnect_settle: Duration,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```
/// use micropush::SettingsBuilder;
/// let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
/// assert_eq!(settings.baud_rate, 115_200);
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and no path for the
    /// port.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                baud_rate: 115_200,
                read_timeout: Duration::from_secs(1),
                program_file: "main.py".into(),
                runtime_file: "runtime/boardio.py".into(),
                remote_lib_dir: "/lib".into(),
                remote_program: "/main.py".into(),
                interrupt_settle: Duration::from_millis(100),
                reboot_settle: Duration::from_millis(1000),
                reconnect_settle: Duration::from_millis(2000),
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port.
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the baud rate in symbols-per-second.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout of the serial handle.
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.settings.read_timeout = read_timeout;
        self
    }

    /// Set the path to the compiled program file.
    pub fn program_file<'a>(mut self, program_file: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.program_file = program_file.into().as_ref().to_owned();
        self
    }

    /// Set the path to the runtime support file.
    pub fn runtime_file<'a>(mut self, runtime_file: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.runtime_file = runtime_file.into().as_ref().to_owned();
        self
    }

    /// Set the remote directory receiving library files.
    pub fn remote_lib_dir<'a>(
        mut self,
        remote_lib_dir: impl Into<std::borrow::Cow<'a, str>>,
    ) -> Self {
        self.settings.remote_lib_dir = remote_lib_dir.into().as_ref().to_owned();
        self
    }

    /// Set the pause after each interrupt byte.
    pub fn interrupt_settle(mut self, interrupt_settle: Duration) -> Self {
        self.settings.interrupt_settle = interrupt_settle;
        self
    }

    /// Set the pause after the soft-reboot byte.
    pub fn reboot_settle(mut self, reboot_settle: Duration) -> Self {
        self.settings.reboot_settle = reboot_settle;
        self
    }

    /// Set the pause between closing the serial handle and the first backend
    /// call.
    pub fn reconnect_settle(mut self, reconnect_settle: Duration) -> Self {
        self.settings.reconnect_settle = reconnect_settle;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        SettingsBuilder::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(settings.path, None);
    assert_eq!(settings.baud_rate, 115_200);
    assert_eq!(settings.read_timeout, Duration::from_secs(1));
    assert_eq!(settings.program_file, "main.py");
    assert_eq!(settings.runtime_file, "runtime/boardio.py");
    assert_eq!(settings.remote_lib_dir, "/lib");
    assert_eq!(settings.remote_program, "/main.py");
    assert_eq!(settings.interrupt_settle, Duration::from_millis(100));
    assert_eq!(settings.reboot_settle, Duration::from_millis(1000));
    assert_eq!(settings.reconnect_settle, Duration::from_millis(2000));
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyUSB0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyUSB0");
}

#[test]
fn baud_rate() {
    let baud_rate = 9_600;
    let settings = SettingsBuilder::new().baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn program_file() {
    let settings = SettingsBuilder::new().program_file("blink.py").finalize();
    assert_eq!(settings.program_file, "blink.py");
}

#[test]
fn runtime_file() {
    let settings = SettingsBuilder::new()
        .runtime_file("custom/io.py")
        .finalize();
    assert_eq!(settings.runtime_file, "custom/io.py");
}

#[test]
fn remote_lib_dir() {
    let settings = SettingsBuilder::new().remote_lib_dir("/libs").finalize();
    assert_eq!(settings.remote_lib_dir, "/libs");
}

#[test]
fn settle_delays() {
    let settings = SettingsBuilder::new()
        .interrupt_settle(Duration::from_millis(250))
        .reboot_settle(Duration::from_millis(1500))
        .reconnect_settle(Duration::from_millis(3000))
        .finalize();
    assert_eq!(settings.interrupt_settle, Duration::from_millis(250));
    assert_eq!(settings.reboot_settle, Duration::from_millis(1500));
    assert_eq!(settings.reconnect_settle, Duration::from_millis(3000));
}
