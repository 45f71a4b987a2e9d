use std::sync::{Arc, RwLock};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use log::{debug, error};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::Stylize,
    text::Line,
    widgets::{Block, BorderType, Paragraph, Widget, Wrap},
};
use tokio::sync::mpsc::Sender;

use crate::{
    api::MusicApi, app::AppEvent, component::Component, model::author::Author,
    session::Session, tunefeed_error::TunefeedError, view_scope::ViewScope,
};

pub struct ProfileState {
    loading: bool,
    author: Option<Author>,
}

pub struct ProfileComponent {
    api: Arc<MusicApi>,
    session: Option<Session>,
    app_event_sender: Sender<AppEvent>,
    state: Arc<RwLock<ProfileState>>,
    scope: ViewScope,
}

impl ProfileComponent {
    pub fn new(
        api: Arc<MusicApi>,
        session: Option<Session>,
        app_event_sender: Sender<AppEvent>,
    ) -> Self {
        Self {
            api,
            session,
            app_event_sender,
            state: Arc::new(RwLock::new(ProfileState {
                loading: false,
                author: None,
            })),
            scope: ViewScope::new(),
        }
    }

    pub fn load(&mut self, user_id: String) {
        let ticket = self.scope.remount();
        {
            let mut state = self.state.write().unwrap();
            state.loading = true;
            state.author = None;
        }

        tokio::spawn({
            let state = self.state.clone();
            let api = self.api.clone();
            let session = self.session.clone();
            let app_event_sender = self.app_event_sender.clone();
            async move {
                app_event_sender.send(AppEvent::Draw).await.ok();

                let res = api.get_user(session.as_ref(), &user_id).await;
                if !ticket.is_live() {
                    debug!("dropping profile of {}", user_id);
                    return;
                }
                let notice = {
                    let mut state = state.write().unwrap();
                    state.loading = false;
                    match res {
                        Ok(user) => {
                            state.author = Some(Author::from(user));
                            None
                        }
                        Err(e) => {
                            error!("loading user {} failed: {}", user_id, e);
                            Some(if e.is_not_found() {
                                "This user no longer exists".to_string()
                            } else {
                                format!("Could not load profile: {}", e)
                            })
                        }
                    }
                };
                if let Some(notice) = notice {
                    app_event_sender.send(AppEvent::CloseProfile).await.ok();
                    app_event_sender.send(AppEvent::Notice(notice)).await.ok();
                }
                app_event_sender.send(AppEvent::Draw).await.ok();
            }
        });
    }

    pub fn close(&mut self) {
        self.scope.unmount();
    }
}

impl Component for ProfileComponent {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        if let Event::Key(KeyEvent {
            code: KeyCode::Char('h') | KeyCode::Backspace,
            kind: KeyEventKind::Press,
            ..
        }) = event
        {
            self.app_event_sender.send(AppEvent::CloseProfile).await?;
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let buf = frame.buffer_mut();
        let state = self.state.read().unwrap();
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title("Profile")
            .title_bottom("h back");
        let inner = block.inner(area);
        block.render(area, buf);

        let Some(author) = &state.author else {
            let [center] = Layout::vertical([Constraint::Length(1)])
                .flex(Flex::Center)
                .areas(inner);
            let text = if state.loading { "Loading..." } else { "" };
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .render(center, buf);
            return;
        };

        let avatar = match &author.image_url {
            Some(url) => format!("avatar: {}", url),
            None => "avatar: default".to_string(),
        };
        let mut lines = vec![
            Line::from(format!("@{}", author.nickname)).bold(),
            Line::from(author.full_name.clone()),
            Line::from(avatar).dim(),
            Line::default(),
        ];
        lines.extend(author.bio.lines().map(|line| Line::from(line.to_string())));

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}
