use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::{DefaultTerminal, Frame};

use crate::error::Result;
use crate::fmt::cents;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const WARNING_STYLE: Style = Style::new().fg(Color::Yellow);

pub const LIMIT_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));

pub const STAGE_STYLE: Style = Style::new().fg(Color::Cyan);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const CURSOR_STYLE: Style = Style::new().bg(Color::Rgb(30, 30, 30));

/// Credit limit as a colored Span; zero limits are dimmed.
pub fn limit_span(limit_cents: i64) -> Span<'static> {
    let style = if limit_cents == 0 {
        FOOTER_STYLE
    } else {
        LIMIT_STYLE
    };
    Span::styled(cents(limit_cents), style)
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

pub enum ScreenAction {
    Continue,
    Close,
}

/// An interactive full-screen view driven by [`run_screen`].
pub trait Screen {
    fn draw(&mut self, frame: &mut Frame);
    fn handle_key(&mut self, key: KeyEvent) -> ScreenAction;
}

/// Set up the terminal, event loop and panic hook, then restore the
/// terminal on exit.
pub fn run_screen(screen: &mut dyn Screen) -> Result<()> {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));

    let mut terminal: DefaultTerminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| screen.draw(frame)) {
            break Err(e.into());
        }

        match event::read() {
            Err(e) => break Err(e.into()),
            Ok(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match screen.handle_key(key) {
                    ScreenAction::Close => break Ok(()),
                    ScreenAction::Continue => {}
                }
            }
            _ => {}
        }
    };

    drop(terminal);
    ratatui::restore();
    result
}
