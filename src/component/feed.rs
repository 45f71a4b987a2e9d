use std::sync::{Arc, RwLock};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use log::{debug, error};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::Color,
    text::Text,
    widgets::{Block, BorderType, Paragraph, StatefulWidget, Widget},
};
use tokio::sync::mpsc::Sender;
use tui_widget_list::{ListBuilder, ListState, ListView};

use crate::{
    api::MusicApi,
    app::AppEvent,
    component::Component,
    config::Channel,
    model::post::Post,
    session::Session,
    tunefeed_error::TunefeedError,
    view_scope::ViewScope,
    widget::post_card::PostCard,
};

pub const FIRST_PAGE: u32 = 1;

pub struct FeedState {
    loading: bool,
    channel: Option<Channel>,
    items: Vec<Post>,
    /// Last page fetched.
    page: u32,
    exhausted: bool,
    list_state: ListState,
}

pub struct FeedComponent {
    api: Arc<MusicApi>,
    session: Option<Session>,
    page_size: u32,
    app_event_sender: Sender<AppEvent>,
    state: Arc<RwLock<FeedState>>,
    scope: ViewScope,
}

impl FeedComponent {
    pub fn new(
        api: Arc<MusicApi>,
        session: Option<Session>,
        page_size: u32,
        app_event_sender: Sender<AppEvent>,
    ) -> Self {
        let state = FeedState {
            loading: false,
            channel: None,
            items: Vec::default(),
            page: 0,
            exhausted: false,
            list_state: ListState::default(),
        };
        Self {
            api,
            session,
            page_size,
            app_event_sender,
            state: Arc::new(RwLock::new(state)),
            scope: ViewScope::new(),
        }
    }

    /// Shows `channel`, keeping the loaded pages if it's already shown.
    pub fn open(&mut self, channel: Channel) {
        {
            let state = self.state.read().unwrap();
            if state.channel.as_ref() == Some(&channel) {
                return;
            }
        }
        {
            let mut state = self.state.write().unwrap();
            state.channel = Some(channel);
            state.items.clear();
            state.page = 0;
            state.exhausted = false;
            state.loading = false;
            state.list_state.select(None);
        }
        self.scope.unmount();
        self.fetch_page(FIRST_PAGE);
    }

    pub fn refresh(&mut self) {
        {
            let mut state = self.state.write().unwrap();
            state.items.clear();
            state.page = 0;
            state.exhausted = false;
            state.loading = false;
            state.list_state.select(None);
        }
        self.scope.unmount();
        self.fetch_page(FIRST_PAGE);
    }

    fn load_more(&self) {
        let next_page = {
            let state = self.state.read().unwrap();
            if state.loading || state.exhausted {
                return;
            }
            state.page + 1
        };
        self.fetch_page(next_page);
    }

    fn fetch_page(&self, page: u32) {
        let channel_id = {
            let mut state = self.state.write().unwrap();
            let Some(channel) = &state.channel else {
                return;
            };
            let channel_id = channel.id.clone();
            state.loading = true;
            channel_id
        };

        tokio::spawn({
            let state = self.state.clone();
            let api = self.api.clone();
            let session = self.session.clone();
            let app_event_sender = self.app_event_sender.clone();
            let ticket = self.scope.ticket();
            let page_size = self.page_size;
            async move {
                app_event_sender.send(AppEvent::Draw).await.ok();

                let res = api
                    .get_channel_posts(session.as_ref(), &channel_id, page, page_size)
                    .await;

                if !ticket.is_live() {
                    debug!("dropping page {} of channel {}", page, channel_id);
                    return;
                }
                let notice = {
                    let mut state = state.write().unwrap();
                    state.loading = false;
                    match res {
                        Ok(posts) => {
                            debug!("channel {} page {}: {} posts", channel_id, page, posts.len());
                            state.exhausted = (posts.len() as u32) < page_size;
                            state.page = page;
                            state.items.extend(posts.into_iter().map(Post::from));
                            if state.list_state.selected.is_none() && !state.items.is_empty() {
                                state.list_state.select(Some(0));
                            }
                            None
                        }
                        Err(e) => {
                            error!("loading channel {} page {} failed: {}", channel_id, page, e);
                            Some(format!("Could not load posts: {}", e))
                        }
                    }
                };
                if let Some(notice) = notice {
                    app_event_sender.send(AppEvent::Notice(notice)).await.ok();
                }
                app_event_sender.send(AppEvent::Draw).await.ok();
            }
        });
    }

    fn select_next(&self) {
        let at_end = {
            let mut state = self.state.write().unwrap();
            state.list_state.next();
            state.list_state.selected == Some(state.items.len().saturating_sub(1))
        };
        if at_end {
            self.load_more();
        }
    }
}

impl Component for FeedComponent {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        if let Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event
        {
            match code {
                KeyCode::Char('h') | KeyCode::Backspace => {
                    self.app_event_sender.send(AppEvent::CloseFeed).await?;
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    self.select_next();
                    self.app_event_sender.send(AppEvent::Draw).await?
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.state.write().unwrap().list_state.previous();
                    self.app_event_sender.send(AppEvent::Draw).await?
                }
                KeyCode::Char('n') => self.load_more(),
                KeyCode::Char('r') => self.refresh(),
                KeyCode::Char('l') | KeyCode::Enter => {
                    let post = {
                        let state = self.state.read().unwrap();
                        state
                            .list_state
                            .selected
                            .and_then(|index| state.items.get(index))
                            .cloned()
                    };
                    if let Some(post) = post {
                        self.app_event_sender
                            .send(AppEvent::OpenPostDetail(post))
                            .await?
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let buf = frame.buffer_mut();
        let (title, loading, posts) = {
            let state = self.state.read().unwrap();
            let title = state
                .channel
                .as_ref()
                .map(|channel| channel.name.clone())
                .unwrap_or_default();
            (title, state.loading, state.items.clone())
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .title_bottom(if loading { "Loading..." } else { "" });

        if posts.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            let text = Text::raw(if loading { "Loading..." } else { "No posts yet" });
            let [center] = Layout::vertical([Constraint::Length(text.height() as u16)])
                .flex(Flex::Center)
                .areas(inner);
            Paragraph::new(text)
                .alignment(Alignment::Center)
                .render(center, buf);
            return;
        }

        let user_id = self.session.as_ref().map(|session| session.user_id.clone());
        let item_len = posts.len();
        let builder = ListBuilder::new(move |ctx| {
            let width = ctx.cross_axis_size as usize;
            let mut card = PostCard::new(&posts[ctx.index], user_id.as_deref(), width);
            if ctx.is_selected {
                card.set_background(Color::DarkGray);
            }
            let height = card.height();
            (card, height as u16)
        });
        let list = ListView::new(builder, item_len).block(block);

        StatefulWidget::render(list, area, buf, &mut self.state.write().unwrap().list_state);
    }
}
