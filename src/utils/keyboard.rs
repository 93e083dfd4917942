use std::io::stdout;
use std::{process, time::Duration};

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
    Result,
};

/// Non-blocking check for the `ESC` key, polling for up to half a second.
///
/// The terminal is switched to raw mode for the duration of the poll, so
/// Ctrl+C arrives here as a key event instead of a signal; it is honored by
/// exiting the process.
pub(crate) fn poll_escape() -> Result<bool> {
    enable_raw_mode()?;
    execute!(stdout(), Hide)?;
    let ready = poll(Duration::from_millis(500))?;
    execute!(stdout(), MoveToColumn(0), Show)?;
    disable_raw_mode()?;

    if !ready {
        // Timeout expired with no event
        return Ok(false);
    }

    // It's guaranteed that read() wont block if `poll` returns `Ok(true)`
    let event = read()?;
    if event == Event::Key(KeyCode::Esc.into()) {
        return Ok(true);
    }
    if event
        == Event::Key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
        })
    {
        // Raw mode swallows the usual SIGINT; do it ourselves.
        process::exit(0);
    }

    Ok(false)
}
