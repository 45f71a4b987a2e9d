#[cfg(debug_assertions)]
use std::time::Duration;
use std::sync::Arc;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use log::debug;
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout},
    style::{Color, Stylize},
    widgets::{Paragraph, Widget},
};
use ratatui_image::picker::Picker;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_stream::StreamExt;

#[cfg(debug_assertions)]
use crate::component::debug::DebugComponent;

use crate::{
    api::MusicApi,
    component::{
        Component, channellist::ChannelListComponent, feed::FeedComponent,
        postdetail::PostDetailComponent, profile::ProfileComponent,
    },
    config::{Channel, Config},
    model::post::Post,
    tunefeed_error::TunefeedError,
};

#[derive(Debug)]
pub enum AppEvent {
    Quit,
    Draw,
    OpenFeed(Channel),
    CloseFeed,
    OpenPostDetail(Post),
    ClosePostDetail,
    OpenProfile(String),
    CloseProfile,
    Notice(String),
    #[cfg(debug_assertions)]
    ToggleShowDebug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Channels,
    Feed,
    PostDetail,
    Profile,
}

pub struct App {
    #[cfg(debug_assertions)]
    show_debug: bool,
    #[cfg(debug_assertions)]
    debug_component: DebugComponent,
    running: bool,
    app_event_sender: Sender<AppEvent>,
    app_event_receiver: Receiver<AppEvent>,
    screens: Vec<Screen>,
    notice: Option<String>,
    channels: ChannelListComponent,
    feed: FeedComponent,
    post_detail: PostDetailComponent,
    profile: ProfileComponent,
}

impl App {
    pub fn new(config: Config, api: Arc<MusicApi>, picker: Arc<Picker>) -> Self {
        let (sender, receiver) = mpsc::channel(100);
        let session = config.session;
        Self {
            #[cfg(debug_assertions)]
            debug_component: DebugComponent::new(),
            #[cfg(debug_assertions)]
            show_debug: false,
            running: true,
            screens: vec![Screen::Channels],
            notice: None,
            channels: ChannelListComponent::new(config.channels, sender.clone()),
            feed: FeedComponent::new(
                api.clone(),
                session.clone(),
                config.page_size,
                sender.clone(),
            ),
            post_detail: PostDetailComponent::new(
                api.clone(),
                session.clone(),
                picker,
                sender.clone(),
            ),
            profile: ProfileComponent::new(api, session, sender.clone()),
            app_event_sender: sender,
            app_event_receiver: receiver,
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<(), TunefeedError> {
        let mut events = EventStream::new();
        terminal.draw(|f| self.draw(f))?;

        #[cfg(debug_assertions)]
        let mut interval = {
            let period = Duration::from_secs_f32(1.0 / 30.0);
            tokio::time::interval(period)
        };

        #[cfg(debug_assertions)]
        while self.running {
            tokio::select! {
                Some(Ok(event)) = events.next() => self.handle_event(&event).await?,
                Some(app_event) = self.app_event_receiver.recv() => self.handle_app_event(app_event, terminal).await?,
                _ = interval.tick() => {
                    if self.show_debug {
                        terminal.draw(|f| self.draw(f))?;
                    }
                }
            }
        }

        #[cfg(not(debug_assertions))]
        while self.running {
            tokio::select! {
                Some(Ok(event)) = events.next() => self.handle_event(&event).await?,
                Some(app_event) = self.app_event_receiver.recv() => self.handle_app_event(app_event, terminal).await?,
            }
        }
        Ok(())
    }

    fn current(&self) -> Screen {
        self.screens.last().copied().unwrap_or(Screen::Channels)
    }

    fn push(&mut self, screen: Screen) {
        if let Some(position) = self.screens.iter().position(|s| *s == screen) {
            self.close(position);
        }
        self.screens.push(screen);
    }

    /// Drops `screen` and everything stacked above it.
    fn pop(&mut self, screen: Screen) {
        if let Some(position) = self.screens.iter().position(|s| *s == screen) {
            self.close(position);
        }
    }

    fn close(&mut self, position: usize) {
        // The channel list is the root and always stays.
        let position = position.max(1);
        for screen in self.screens.split_off(position.min(self.screens.len())) {
            match screen {
                Screen::PostDetail => self.post_detail.close(),
                Screen::Profile => self.profile.close(),
                Screen::Channels | Screen::Feed => {}
            }
        }
    }

    async fn handle_app_event(
        &mut self,
        app_event: AppEvent,
        terminal: &mut DefaultTerminal,
    ) -> Result<(), TunefeedError> {
        match app_event {
            AppEvent::Quit => self.running = false,
            AppEvent::Draw => {
                terminal.draw(|frame| self.draw(frame))?;
            }
            AppEvent::OpenFeed(channel) => {
                debug!("opening channel {}", channel.id);
                self.feed.open(channel);
                self.push(Screen::Feed);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::CloseFeed => {
                self.pop(Screen::Feed);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::OpenPostDetail(post) => {
                debug!("opening post {} of channel {}", post.id, post.channel_id);
                self.push(Screen::PostDetail);
                self.post_detail.load(post);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::ClosePostDetail => {
                self.pop(Screen::PostDetail);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::OpenProfile(user_id) => {
                debug!("opening profile {}", user_id);
                self.push(Screen::Profile);
                self.profile.load(user_id);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::CloseProfile => {
                self.pop(Screen::Profile);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            AppEvent::Notice(notice) => {
                self.notice = Some(notice);
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
            #[cfg(debug_assertions)]
            AppEvent::ToggleShowDebug => {
                self.show_debug = !self.show_debug;
                self.app_event_sender.send(AppEvent::Draw).await?;
            }
        };
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [main_area, notice_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(u16::from(self.notice.is_some())),
        ])
        .areas(frame.area());

        #[cfg(debug_assertions)]
        if self.show_debug {
            self.debug_component.draw(frame, main_area);
            return;
        }

        match self.current() {
            Screen::Channels => self.channels.draw(frame, main_area),
            Screen::Feed => self.feed.draw(frame, main_area),
            Screen::PostDetail => self.post_detail.draw(frame, main_area),
            Screen::Profile => self.profile.draw(frame, main_area),
        }

        if let Some(notice) = &self.notice {
            Paragraph::new(format!(" {}  (Esc to dismiss)", notice))
                .fg(Color::Black)
                .bg(Color::Yellow)
                .render(notice_area, frame.buffer_mut());
        }
    }

    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        if let Event::Resize(..) = event {
            self.app_event_sender.send(AppEvent::Draw).await?;
            return Ok(());
        }
        // Typed text belongs to the comment box, not to the shortcuts.
        let composing = self.current() == Screen::PostDetail && self.post_detail.is_composing();

        match event {
            Event::Key(KeyEvent {
                kind: KeyEventKind::Press,
                code: KeyCode::Char('q'),
                ..
            }) if !composing => self.app_event_sender.send(AppEvent::Quit).await?,
            Event::Key(KeyEvent {
                kind: KeyEventKind::Press,
                code: KeyCode::Esc,
                ..
            }) if self.notice.is_some() => {
                self.notice = None;
                self.app_event_sender.send(AppEvent::Draw).await?
            }
            #[cfg(debug_assertions)]
            Event::Key(KeyEvent {
                kind: KeyEventKind::Press,
                code: KeyCode::Char('`'),
                ..
            }) if !composing => {
                self.app_event_sender
                    .send(AppEvent::ToggleShowDebug)
                    .await?
            }
            _ => {
                #[cfg(debug_assertions)]
                if self.show_debug {
                    return self.debug_component.handle_event(event).await;
                }

                match self.current() {
                    Screen::Channels => self.channels.handle_event(event).await?,
                    Screen::Feed => self.feed.handle_event(event).await?,
                    Screen::PostDetail => self.post_detail.handle_event(event).await?,
                    Screen::Profile => self.profile.handle_event(event).await?,
                }
            }
        }
        Ok(())
    }
}
