use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use log::{LevelFilter, trace};
use ratatui::{Frame, layout::Rect, text::Line};
use tui_logger::{LogFormatter, TuiLoggerLevelOutput, TuiWidgetEvent, TuiWidgetState};

use crate::{component::Component, tunefeed_error::TunefeedError};

pub struct DebugFormatter;

impl LogFormatter for DebugFormatter {
    fn min_width(&self) -> u16 {
        4
    }

    fn format(&'_ self, _width: usize, evt: &tui_logger::ExtLogRecord) -> Vec<Line<'_>> {
        vec![Line::from(format!(
            "{} {:5} {}: {}",
            evt.timestamp.format("%H:%M:%S"),
            evt.level,
            evt.file().unwrap_or(""),
            evt.msg()
        ))]
    }
}

/// Log pane over the whole screen, toggled with `` ` ``.
pub struct DebugComponent {
    state: TuiWidgetState,
}

impl DebugComponent {
    pub fn new() -> Self {
        DebugComponent {
            state: TuiWidgetState::new().set_default_display_level(LevelFilter::Debug),
        }
    }
}

impl Component for DebugComponent {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        if let Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event
        {
            match code {
                KeyCode::Char('j') => self.state.transition(TuiWidgetEvent::NextPageKey),
                KeyCode::Char('k') => self.state.transition(TuiWidgetEvent::PrevPageKey),
                KeyCode::Char('+') => self.state.transition(TuiWidgetEvent::PlusKey),
                KeyCode::Char('-') => self.state.transition(TuiWidgetEvent::MinusKey),
                KeyCode::Esc => self.state.transition(TuiWidgetEvent::EscapeKey),
                _ => trace!("debug pane ignores {}", code),
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        use ratatui::widgets::{Block, Widget};
        use tui_logger::TuiLoggerWidget;

        let buf = frame.buffer_mut();
        TuiLoggerWidget::default()
            .block(Block::bordered().title("Log"))
            .formatter(Box::new(DebugFormatter))
            .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
            .state(&self.state)
            .render(area, buf);
    }
}
