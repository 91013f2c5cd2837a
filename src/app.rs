//! Terminal front end for a picker session.
//!
//! `mediapick <dir>` indexes the directory, then reads commands from stdin.
//! Each cell of the visible window is printed as one line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use mediapick::capture::{
    CaptureDirs, CaptureDispatcher, CaptureKind, CaptureOutcome, CaptureTarget, DiscardPolicy,
};
use mediapick::error::{CaptureError, FeedbackForm, SelectionError};
use mediapick::grid::{format_duration, CellBadge, CellView};
use mediapick::models::{Item, MediaCursor, MediaStore, SelectionSpec};
use mediapick::scanner::FileScanner;
use mediapick::selection::CheckState;
use mediapick::session::{Collaborators, Feedback, PickerSession};
use mediapick::thumbnails::{Thumbnail, ThumbnailLoader};

const DEFAULT_VIEWPORT_WIDTH: u32 = 1080;

/// Settle time for thumbnails before `show` prints the grid.
const SHOW_SETTLE: Duration = Duration::from_millis(150);

const HELP: &str = "commands: show | scroll N | tap SLOT | width PX | columns N | done | captured | canceled | quit";

pub struct PickerApp {
    dir: PathBuf,
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    capture_root: Option<PathBuf>,
    pool: usize,
    keep_cancelled: bool,
}

impl PickerApp {
    pub fn from_env() -> Result<Self> {
        let mut args = pico_args::Arguments::from_env();
        let app = Self {
            config: args.opt_value_from_str("--config")?,
            db: args.opt_value_from_str("--db")?,
            capture_root: args.opt_value_from_str("--capture-dir")?,
            pool: args.opt_value_from_str("--pool")?.unwrap_or(12),
            keep_cancelled: args.contains("--keep-cancelled"),
            dir: args
                .free_from_str()
                .context("usage: mediapick <dir> [--config FILE] [--db FILE] [--capture-dir DIR] [--pool N] [--keep-cancelled]")?,
        };
        let rest = args.finish();
        if !rest.is_empty() {
            bail!("Unexpected arguments: {:?}", rest);
        }
        Ok(app)
    }

    pub fn run(self) -> Result<()> {
        let spec = match &self.config {
            Some(path) => SelectionSpec::load(path)?,
            None => SelectionSpec::default(),
        };

        let store = match &self.db {
            Some(path) => MediaStore::open(path)?,
            None => MediaStore::open_default()?,
        };
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let (store, scan) = runtime.block_on(FileScanner::new().scan_directory(&self.dir, store))?;
        info!(total = scan.total_files, new = scan.new_items, "Index ready");

        let library = MediaCursor::new(store, spec.media_type_mode)?;
        let capture_dirs = match &self.capture_root {
            Some(root) => CaptureDirs::under(root),
            None => CaptureDirs::default_dirs()?,
        };

        let parts = Collaborators {
            views: (0..self.pool).map(TerminalCell::new).collect(),
            engine: Box::new(ThumbnailLoader::builder().build()?),
            library: Box::new(library),
            feedback: Box::new(TerminalFeedback),
            dispatcher: Box::new(TerminalDispatcher),
            capture_dirs,
            discard_policy: if self.keep_cancelled {
                DiscardPolicy::Keep
            } else {
                DiscardPolicy::Remove
            },
        };
        let mut session = PickerSession::new(spec, parts)?;
        session.set_viewport_width(DEFAULT_VIEWPORT_WIDTH);
        session.scroll_to(0, self.pool);

        println!("{}", HELP);
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    println!("{}\n{}", e, HELP);
                    continue;
                }
            };

            match command {
                Command::Show => {
                    std::thread::sleep(SHOW_SETTLE);
                    session.pump();
                    print_grid(&session);
                }
                Command::Scroll(first) => session.scroll_to(first, self.pool),
                Command::Tap(slot) => session.tap(slot),
                Command::Width(px) => session.set_viewport_width(px),
                Command::Columns(n) => session.set_columns(n),
                Command::Captured => {
                    if let Some(item) = session.capture_finished(CaptureOutcome::Success) {
                        println!("captured {}", item.uri());
                    }
                }
                Command::Canceled => {
                    session.capture_finished(CaptureOutcome::Canceled);
                }
                Command::Done => {
                    for item in session.finish() {
                        println!("{}", item.uri());
                    }
                    return Ok(());
                }
                Command::Quit => break,
            }
            session.pump();
        }

        session.finish();
        info!("Picker cancelled");
        Ok(())
    }
}

fn print_grid(session: &PickerSession<TerminalCell>) {
    let grid = session.grid();
    let window = grid.window();
    println!(
        "positions {}..{} of {}, {} selected",
        window.start,
        window.end,
        grid.position_count(session.library()),
        session.selection().len()
    );
    for position in window {
        if let Some(cell) = grid.slot_for_position(position).and_then(|s| grid.view(s)) {
            println!("{:>5} {}", position, cell.render());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Show,
    Scroll(usize),
    Tap(usize),
    Width(u32),
    Columns(u32),
    Done,
    Captured,
    Canceled,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| anyhow!("Empty command"))?;
        let mut number = || -> Result<u64> {
            words
                .next()
                .ok_or_else(|| anyhow!("`{}` needs a number", name))?
                .parse()
                .with_context(|| format!("Bad number for `{}`", name))
        };

        let command = match name {
            "show" => Self::Show,
            "scroll" => Self::Scroll(number()? as usize),
            "tap" => Self::Tap(number()? as usize),
            "width" => Self::Width(u32::try_from(number()?)?),
            "columns" => Self::Columns(u32::try_from(number()?)?),
            "done" => Self::Done,
            "captured" => Self::Captured,
            "canceled" | "cancelled" => Self::Canceled,
            "quit" | "q" => Self::Quit,
            other => bail!("Unknown command `{}`", other),
        };
        Ok(command)
    }
}

/// One line of terminal output standing in for a grid cell.
#[derive(Debug, Default)]
struct TerminalCell {
    slot: usize,
    label: Option<String>,
    thumbnail: Option<(u32, u32)>,
    badge: Option<CellBadge>,
}

impl TerminalCell {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            ..Default::default()
        }
    }

    fn render(&self) -> String {
        let check = match self.badge.map(|b| b.check) {
            Some(CheckState::Numbered(n)) => format!("({})", n),
            Some(CheckState::Checked) => "(x)".to_string(),
            Some(CheckState::Unchecked) | None => "( )".to_string(),
        };
        let dimmed = if self.badge.is_some_and(|b| !b.enabled) {
            " dimmed"
        } else {
            ""
        };
        let thumb = match self.thumbnail {
            Some((w, h)) => format!("[{}x{}]", w, h),
            None => "[...]".to_string(),
        };
        format!(
            "slot {:>2} {} {} {}{}",
            self.slot,
            check,
            thumb,
            self.label.as_deref().unwrap_or("-"),
            dimmed
        )
    }
}

impl CellView for TerminalCell {
    fn show_capture(&mut self, kind: CaptureKind) {
        self.label = Some(match kind {
            CaptureKind::Photo => "take photo".to_string(),
            CaptureKind::Video => "record video".to_string(),
        });
        self.thumbnail = None;
        self.badge = None;
    }

    fn show_media(&mut self, item: &Item) {
        let mut label = item.uri().to_string();
        if item.is_gif() {
            label.push_str(" GIF");
        }
        if item.is_video() {
            label.push(' ');
            label.push_str(&format_duration(item.duration_ms()));
        }
        self.label = Some(label);
    }

    fn show_placeholder(&mut self) {
        self.thumbnail = None;
    }

    fn set_thumbnail(&mut self, thumbnail: &Thumbnail) {
        self.thumbnail = Some((thumbnail.width, thumbnail.height));
    }

    fn set_badge(&mut self, badge: CellBadge) {
        self.badge = Some(badge);
    }

    fn clear(&mut self) {
        *self = Self::new(self.slot);
    }
}

struct TerminalFeedback;

impl Feedback for TerminalFeedback {
    fn report(&mut self, cause: &SelectionError) {
        match cause.form() {
            FeedbackForm::Dialog => println!("[!] {}", cause),
            FeedbackForm::Toast => println!("[i] {}", cause),
            FeedbackForm::None => {}
        }
    }

    fn capture_failed(&mut self, error: &CaptureError) {
        println!("[!] {}", error);
    }

    fn selection_changed(&mut self, count: usize, max: usize) {
        println!("selected {}/{}", count, max);
    }
}

/// Asks the user to produce the file by hand.
struct TerminalDispatcher;

impl CaptureDispatcher for TerminalDispatcher {
    fn dispatch(&mut self, target: &CaptureTarget) -> Result<(), CaptureError> {
        println!(
            "write the {} to {} then enter `captured` (or `canceled`)",
            match target.kind {
                CaptureKind::Photo => "photo",
                CaptureKind::Video => "video",
            },
            target.temp_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediapick::models::{ItemId, Uri};

    #[test]
    fn test_parse_commands() {
        assert_eq!("show".parse::<Command>().unwrap(), Command::Show);
        assert_eq!("scroll 12".parse::<Command>().unwrap(), Command::Scroll(12));
        assert_eq!("  tap   3 ".parse::<Command>().unwrap(), Command::Tap(3));
        assert_eq!("width 720".parse::<Command>().unwrap(), Command::Width(720));
        assert_eq!("cancelled".parse::<Command>().unwrap(), Command::Canceled);
        assert!("tap".parse::<Command>().is_err());
        assert!("tap x".parse::<Command>().is_err());
        assert!("jump 1".parse::<Command>().is_err());
    }

    #[test]
    fn test_terminal_cell_render() {
        let mut cell = TerminalCell::new(4);
        let video = Item::new(ItemId(1), "video/mp4", 1, 65_000, Uri::new("file:///v.mp4"));
        cell.show_media(&video);
        cell.set_badge(CellBadge {
            check: CheckState::Numbered(2),
            enabled: true,
        });
        assert_eq!(cell.render(), "slot  4 (2) [...] file:///v.mp4 01:05");

        cell.clear();
        assert_eq!(cell.render(), "slot  4 ( ) [...] -");
    }
}
