use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, BorderType, List, ListState, Paragraph, StatefulWidget, Widget, Wrap},
};
use tokio::sync::mpsc::Sender;

use crate::{app::AppEvent, component::Component, config::Channel, tunefeed_error::TunefeedError};

pub struct ChannelListComponent {
    app_event_sender: Sender<AppEvent>,
    channels: Vec<Channel>,
    list_state: ListState,
}

impl ChannelListComponent {
    pub fn new(channels: Vec<Channel>, app_event_sender: Sender<AppEvent>) -> Self {
        let selected = if channels.is_empty() { None } else { Some(0) };
        ChannelListComponent {
            app_event_sender,
            channels,
            list_state: ListState::default().with_selected(selected),
        }
    }
}

impl Component for ChannelListComponent {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        if let Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event
        {
            match code {
                KeyCode::Char('j') | KeyCode::Down => {
                    self.list_state.select_next();
                    self.app_event_sender.send(AppEvent::Draw).await?;
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.list_state.select_previous();
                    self.app_event_sender.send(AppEvent::Draw).await?;
                }
                KeyCode::Char('l') | KeyCode::Enter => {
                    let channel = self
                        .list_state
                        .selected()
                        .and_then(|index| self.channels.get(index))
                        .cloned();
                    if let Some(channel) = channel {
                        self.app_event_sender.send(AppEvent::OpenFeed(channel)).await?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let buf = frame.buffer_mut();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title("Channels");

        if self.channels.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            let [center] = Layout::vertical([Constraint::Length(2)])
                .flex(Flex::Center)
                .areas(inner);
            Paragraph::new("No channels configured.\nAdd [[channels]] entries to ~/.config/tunefeed/config.toml")
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(center, buf);
            return;
        }

        let selected_style = Style::new().bg(Color::Blue).add_modifier(Modifier::BOLD);
        let list = List::new(self.channels.iter().map(|channel| channel.name.clone()))
            .highlight_style(selected_style)
            .block(block);
        StatefulWidget::render(list, area, buf, &mut self.list_state);
    }
}
