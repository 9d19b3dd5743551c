//! Terminal output for builds and watch mode.
//!
//! All writes go through one [`Painter`] that owns the terminal's bottom
//! "sticky" row. Phase progress counters and the watch-mode status ticker
//! render into that row; regular log lines print above it and the row is
//! repainted afterwards. Non-interactive sessions (CI, pipes) get plain
//! line output only.

use std::io::{IsTerminal, Write, stdout};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Global quiet flag (set by --quiet CLI argument)
static QUIET: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Set quiet mode globally (suppresses non-error log output)
pub fn set_quiet(q: bool) {
    QUIET.store(q, Ordering::SeqCst);
}

/// Check if quiet mode is enabled
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::SeqCst)
}

/// Whether sticky-row output is allowed.
///
/// Disabled under CI or when stdout is not a terminal.
pub fn is_interactive() -> bool {
    std::env::var_os("CI").is_none() && stdout().is_terminal()
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored channel tag
///
/// # Usage
/// ```ignore
/// log!("channel"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($channel:expr; $($arg:tt)*) => {{
        $crate::logger::log($channel, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
#[macro_export]
macro_rules! debug {
    ($channel:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($channel, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Painter
// ============================================================================

/// Serializes terminal writes and keeps the sticky row at the bottom.
#[derive(Default)]
struct Painter {
    sticky: Option<String>,
}

impl Painter {
    fn erase_row(out: &mut impl Write) {
        execute!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    }

    /// Print a full line above the sticky row.
    fn line(&mut self, text: &str) {
        let mut out = stdout().lock();
        if self.sticky.is_some() {
            Self::erase_row(&mut out);
        }
        writeln!(out, "{text}").ok();
        if let Some(row) = &self.sticky {
            write!(out, "{row}").ok();
        }
        out.flush().ok();
    }

    /// Replace (or clear, with `None`) the sticky row in place.
    fn set_sticky(&mut self, row: Option<String>) {
        let mut out = stdout().lock();
        if self.sticky.is_some() {
            Self::erase_row(&mut out);
        }
        if let Some(row) = &row {
            write!(out, "{row}").ok();
        }
        self.sticky = row;
        out.flush().ok();
    }
}

static PAINTER: LazyLock<Mutex<Painter>> = LazyLock::new(|| Mutex::new(Painter::default()));

/// Log a message on its own line, above any active progress row.
pub fn log(channel: &str, message: &str) {
    if is_quiet() && channel != "error" {
        return;
    }
    PAINTER
        .lock()
        .line(&format!("{} {message}", channel_tag(channel)));
}

fn channel_tag(channel: &str) -> String {
    let tag = format!("[{channel}]");
    match channel {
        "error" => tag.red().bold().to_string(),
        "warn" => tag.yellow().bold().to_string(),
        "serve" | "watch" | "reload" => tag.cyan().bold().to_string(),
        _ => tag.green().bold().to_string(),
    }
}

// ============================================================================
// Phase progress
// ============================================================================

/// Live counter for one build phase, rendered in the sticky row as
/// `[build] render 12/40`.
///
/// Phases run one at a time, so each phase owns its own counter and simply
/// takes over the row; dropping it clears the row.
pub struct PhaseProgress {
    label: &'static str,
    total: usize,
    completed: AtomicUsize,
    live: bool,
}

impl PhaseProgress {
    pub fn start(label: &'static str, total: usize) -> Self {
        let live = total > 0 && is_interactive() && !is_quiet();
        let progress = Self {
            label,
            total,
            completed: AtomicUsize::new(0),
            live,
        };
        if live {
            PAINTER.lock().set_sticky(Some(progress.row()));
        }
        progress
    }

    /// Record one completed item.
    ///
    /// Repaints unless another thread holds the painter; the count is never
    /// lost, only the intermediate frame.
    pub fn advance(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !self.live {
            return;
        }
        if let Some(mut painter) = PAINTER.try_lock() {
            painter.set_sticky(Some(self.row()));
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    fn row(&self) -> String {
        format!(
            "{} {} {}/{}",
            channel_tag("build"),
            self.label,
            self.completed(),
            self.total
        )
    }

    /// Clear the row; the orchestrator logs its own summary line.
    pub fn finish(self) {}
}

impl Drop for PhaseProgress {
    fn drop(&mut self) {
        if self.live {
            PAINTER.lock().set_sticky(None);
        }
    }
}

// ============================================================================
// Watch ticker
// ============================================================================

/// Outcome glyph for one watch-mode status update.
enum Tick {
    Ok,
    Idle,
    Warn,
    Fail,
}

impl Tick {
    fn glyph(&self) -> String {
        match self {
            Self::Ok => "✓".green().to_string(),
            Self::Idle => "·".dimmed().to_string(),
            Self::Warn => "⚠".yellow().to_string(),
            Self::Fail => "✗".red().to_string(),
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Show a status update. Interactive sessions keep exactly one status line
/// alive in the sticky row; everything else scrolls normally.
fn tick(tick: Tick, message: &str) {
    let line = format!("{} {} {message}", timestamp().dimmed(), tick.glyph());
    let mut painter = PAINTER.lock();
    if is_interactive() && !is_quiet() {
        painter.set_sticky(Some(line));
    } else {
        painter.line(&line);
    }
}

/// Watch status: rebuild succeeded.
pub fn status_success(message: &str) {
    tick(Tick::Ok, message);
}

/// Watch status: nothing to do.
pub fn status_unchanged(message: &str) {
    tick(Tick::Idle, message);
}

/// Watch status: warning.
pub fn status_warning(message: &str) {
    tick(Tick::Warn, message);
}

/// Watch status: failure. Detail lines land in the scrollback; only the
/// summary occupies the status row.
pub fn status_error(summary: &str, detail: &str) {
    {
        let mut painter = PAINTER.lock();
        for line in detail.lines() {
            painter.line(&format!("  {line}"));
        }
    }
    tick(Tick::Fail, summary);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_and_quiet_flags_roundtrip() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());

        set_quiet(true);
        assert!(is_quiet());
        set_quiet(false);
        assert!(!is_quiet());
    }

    #[test]
    fn channel_tag_carries_channel_name() {
        assert!(channel_tag("build").contains("[build]"));
        assert!(channel_tag("error").contains("[error]"));
    }

    #[test]
    fn phase_progress_counts_without_terminal() {
        // Tests run without a tty: the counter works, the row stays off.
        let progress = PhaseProgress::start("render", 3);
        progress.advance();
        progress.advance();
        assert_eq!(progress.completed(), 2);
        assert!(progress.row().contains("render 2/3"));
        progress.finish();
    }

    #[test]
    fn zero_total_phase_is_inert() {
        let progress = PhaseProgress::start("assets", 0);
        assert!(!progress.live);
        assert_eq!(progress.completed(), 0);
    }

    #[test]
    fn concurrent_advance_never_drops_counts() {
        use std::sync::Arc;
        let progress = Arc::new(PhaseProgress::start("render", 400));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let p = progress.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    p.advance();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.completed(), 400);
    }
}
