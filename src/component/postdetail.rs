use std::sync::{Arc, RwLock};

use chrono::Utc;
use chrono_humanize::HumanTime;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use image::DynamicImage;
use log::{debug, error, warn};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect, Size},
    style::{Color, Stylize},
    text::Line,
    widgets::{Block, BorderType, Paragraph, StatefulWidget, Widget},
};
use ratatui_image::{Resize, StatefulImage, picker::Picker, protocol::StatefulProtocol};
use tokio::sync::mpsc::Sender;
use tui_input::{Input, InputRequest};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::{
    api::{ApiError, MusicApi, NotificationKind, NotificationRequest},
    app::AppEvent,
    component::Component,
    model::{
        decode::Album,
        post::{Like, Post},
    },
    reaction::{
        Applied, CommentAction, CommentPhase, CommentReconciler, LikeAction, LikeReconciler,
        LikeRequest, LikeState, ReactionPhase, Revision, compute_like_state,
    },
    session::Session,
    tunefeed_error::TunefeedError,
    view_scope::{ScopeTicket, ViewScope},
    widget::comment_widget::CommentWidget,
};

const POST_GONE: &str = "This post is no longer available";

/// Reconciler revisions at the moment a `get_post` went out.
#[derive(Debug, Clone, Copy)]
struct SnapshotMark {
    likes: Option<Revision>,
    comments: Revision,
}

/// Which reconciler a mutation went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutated {
    Likes,
    Comments,
}

pub struct PostDetailState {
    loading: bool,
    post: Post,
    /// Only tracked with a session; anonymous viewers just see counts.
    likes: Option<LikeReconciler>,
    comments: CommentReconciler,
    selected_comment: Option<usize>,
    scroll_state: ScrollViewState,
    cover: Option<StatefulProtocol>,
}

impl PostDetailState {
    fn like_state(&self) -> LikeState {
        match &self.likes {
            Some(likes) => likes.state(),
            None => compute_like_state(&self.post, ""),
        }
    }

    fn is_saving(&self) -> bool {
        let likes_saving = self.likes.as_ref().is_some_and(|likes| {
            matches!(
                likes.phase(),
                ReactionPhase::OptimisticallyLiked
                    | ReactionPhase::OptimisticallyUnliked
                    | ReactionPhase::Reconciling
            )
        });
        let comments_saving = matches!(
            self.comments.phase(),
            CommentPhase::Pending(..) | CommentPhase::Reconciling
        );
        likes_saving || comments_saving
    }

    fn mark(&self) -> SnapshotMark {
        SnapshotMark {
            likes: self.likes.as_ref().map(LikeReconciler::revision),
            comments: self.comments.revision(),
        }
    }

    /// Takes the server's copy of the post as the truth, unless a comment
    /// change was acknowledged after it was requested.
    fn apply_snapshot(&mut self, post: Post, mark: SnapshotMark) {
        if let (Some(likes), Some(revision)) = (self.likes.as_mut(), mark.likes) {
            likes.confirm(&post, revision);
        }
        if mark.comments != self.comments.revision() {
            debug!("snapshot of post {} predates a comment change", post.id);
            return;
        }
        self.comments.confirm(&post, mark.comments);
        if self
            .selected_comment
            .is_some_and(|selected| selected >= post.comments.len())
        {
            self.selected_comment = post.comments.len().checked_sub(1);
        }
        self.post = post;
    }

    fn settle(&mut self, mutated: Mutated) {
        match mutated {
            Mutated::Likes => {
                if let Some(likes) = self.likes.as_mut() {
                    likes.settle();
                }
            }
            Mutated::Comments => self.comments.settle(),
        }
    }
}

pub struct PostDetailComponent {
    api: Arc<MusicApi>,
    session: Option<Session>,
    app_event_sender: Sender<AppEvent>,
    state: Arc<RwLock<PostDetailState>>,
    picker: Arc<Picker>,
    scope: ViewScope,
    composer: Option<Input>,
}

/// What a background task needs to report back to this view.
struct DetailTask {
    api: Arc<MusicApi>,
    session: Option<Session>,
    state: Arc<RwLock<PostDetailState>>,
    app_event_sender: Sender<AppEvent>,
    ticket: ScopeTicket,
}

impl DetailTask {
    async fn draw(&self) {
        self.app_event_sender.send(AppEvent::Draw).await.ok();
    }

    async fn notice(&self, message: String) {
        self.app_event_sender.send(AppEvent::Notice(message)).await.ok();
    }

    async fn post_gone(&self) {
        self.app_event_sender
            .send(AppEvent::ClosePostDetail)
            .await
            .ok();
        self.notice(POST_GONE.to_string()).await;
    }

    /// Re-fetches the post after a mutation went through.
    async fn reconcile(&self, post_id: &str, mutated: Mutated) {
        let mark = self.state.read().unwrap().mark();
        let snapshot = self.api.get_post(self.session.as_ref(), post_id).await;
        if !self.ticket.is_live() {
            debug!("dropping snapshot of post {} for a closed view", post_id);
            return;
        }
        match snapshot {
            Ok(data) => {
                let post = Post::from(data);
                self.state.write().unwrap().apply_snapshot(post, mark);
            }
            Err(e) if e.is_not_found() => {
                self.post_gone().await;
                return;
            }
            Err(e) => {
                warn!("post {} not refreshed, keeping local state: {}", post_id, e);
                self.state.write().unwrap().settle(mutated);
            }
        }
        self.draw().await;
    }

    /// Best effort; the author just misses a notification if this fails.
    fn notify(&self, request: NotificationRequest) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if session.is_owner(&request.user_id) {
            return;
        }
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.create_notification(&session, &request).await {
                Ok(notification) => debug!("notification {} sent", notification.id),
                Err(e) => warn!(
                    "notification for {} not delivered: {}",
                    request.notification_type_id, e
                ),
            }
        });
    }
}

impl PostDetailComponent {
    pub fn new(
        api: Arc<MusicApi>,
        session: Option<Session>,
        picker: Arc<Picker>,
        app_event_sender: Sender<AppEvent>,
    ) -> Self {
        let state = PostDetailState {
            loading: false,
            post: Post::default(),
            likes: None,
            comments: CommentReconciler::new(&Post::default()),
            selected_comment: None,
            scroll_state: ScrollViewState::default(),
            cover: None,
        };
        Self {
            api,
            session,
            app_event_sender,
            state: Arc::new(RwLock::new(state)),
            picker,
            scope: ViewScope::new(),
            composer: None,
        }
    }

    fn task(&self) -> DetailTask {
        DetailTask {
            api: self.api.clone(),
            session: self.session.clone(),
            state: self.state.clone(),
            app_event_sender: self.app_event_sender.clone(),
            ticket: self.scope.ticket(),
        }
    }

    /// Shows `post` right away and refreshes it from the server.
    pub fn load(&mut self, post: Post) {
        let ticket = self.scope.remount();
        self.composer = None;
        let (post_id, cover_url) = (
            post.id.clone(),
            post.first_album().map(|album| album.cover_url.clone()),
        );
        let mark = {
            let mut state = self.state.write().unwrap();
            state.likes = self
                .session
                .as_ref()
                .map(|session| LikeReconciler::new(&post, &session.user_id));
            state.comments = CommentReconciler::new(&post);
            state.post = post;
            state.selected_comment = None;
            state.cover = None;
            state.loading = true;
            state.scroll_state.scroll_to_top();
            state.mark()
        };

        let task = DetailTask {
            ticket,
            ..self.task()
        };
        let picker = self.picker.clone();
        tokio::spawn(async move {
            task.draw().await;

            let snapshot_future = task.api.get_post(task.session.as_ref(), &post_id);
            let cover_future = fetch_cover(&task.api, cover_url);
            let (snapshot, cover) = futures::future::join(snapshot_future, cover_future).await;

            if !task.ticket.is_live() {
                debug!("post {} closed before it loaded", post_id);
                return;
            }
            match snapshot {
                Ok(data) => {
                    task.state.write().unwrap().apply_snapshot(Post::from(data), mark);
                }
                Err(e) if e.is_not_found() => {
                    task.post_gone().await;
                    return;
                }
                Err(e) => {
                    error!("loading post {} failed: {}", post_id, e);
                    task.notice(format!("Showing cached post: {}", e)).await;
                }
            }
            {
                let mut state = task.state.write().unwrap();
                state.cover = cover.map(|image| picker.new_resize_protocol(image));
                state.loading = false;
            }
            task.draw().await;
        });
    }

    pub fn close(&mut self) {
        self.scope.unmount();
        self.composer = None;
    }

    pub fn is_composing(&self) -> bool {
        self.composer.is_some()
    }

    fn reload(&mut self) {
        let post = self.state.read().unwrap().post.clone();
        self.load(post);
    }

    fn toggle_like(&self) -> Option<String> {
        let Some(session) = self.session.clone() else {
            return Some(ApiError::Unauthenticated.to_string());
        };
        let (applied, post_id, author_id) = {
            let mut state = self.state.write().unwrap();
            let post_id = state.post.id.clone();
            let author_id = state.post.author.id.clone();
            let likes = state.likes.as_mut()?;
            let action = LikeAction::toggle(likes.state());
            (likes.apply(action), post_id, author_id)
        };
        let request = match applied {
            Applied::Request(request) => request,
            Applied::Skipped => {
                debug!("no like of {} on post {} to change", session.user_id, post_id);
                return None;
            }
            Applied::Busy => return Some("Still saving your last like".to_string()),
        };

        let task = self.task();
        tokio::spawn(async move {
            task.draw().await;

            let result = match &request {
                LikeRequest::Create { post_id } => task
                    .api
                    .create_like(&session, post_id)
                    .await
                    .map(|like| Some(Like::from(like))),
                LikeRequest::Delete { like_id } => {
                    task.api.delete_like(&session, like_id).await.map(|_| None)
                }
            };

            if !task.ticket.is_live() {
                debug!("dropping like result of post {} for a closed view", post_id);
                return;
            }
            // Deleting a like that is already gone leaves the post the way
            // the user asked for; the snapshot settles the count.
            let result = match (result, &request) {
                (Err(e), LikeRequest::Delete { like_id }) if e.is_not_found() => {
                    debug!("like {} was already removed", like_id);
                    Ok(None)
                }
                (result, _) => result,
            };
            match result {
                Ok(created) => {
                    if let Some(like) = &created {
                        task.notify(NotificationRequest {
                            notification_type: NotificationKind::Like,
                            notification_type_id: like.id.clone(),
                            user_id: author_id,
                            post_id: Some(post_id.clone()),
                        });
                    }
                    if let Some(likes) = task.state.write().unwrap().likes.as_mut() {
                        likes.network_ok(created);
                    }
                    task.draw().await;
                    task.reconcile(&post_id, Mutated::Likes).await;
                }
                Err(e) => {
                    error!("{:?} on post {} failed: {}", request, post_id, e);
                    let message = {
                        let mut state = task.state.write().unwrap();
                        state.likes.as_mut().and_then(|likes| {
                            likes.rollback(e.to_string());
                            likes.take_error()
                        })
                    };
                    if e.is_not_found() {
                        task.post_gone().await;
                        return;
                    }
                    if let Some(message) = message {
                        task.notice(format!("Couldn't update like: {}", message)).await;
                    }
                    task.draw().await;
                }
            }
        });
        None
    }

    fn submit_comment(&self, text: String) -> Option<String> {
        let Some(session) = self.session.clone() else {
            return Some(ApiError::Unauthenticated.to_string());
        };
        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let (post_id, author_id) = {
            let mut state = self.state.write().unwrap();
            if !state.comments.begin(CommentAction::Add) {
                return Some("Still saving your last comment".to_string());
            }
            (state.post.id.clone(), state.post.author.id.clone())
        };

        let task = self.task();
        tokio::spawn(async move {
            task.draw().await;
            let result = task.api.create_comment(&session, &post_id, &text).await;
            if !task.ticket.is_live() {
                debug!("dropping comment result of post {} for a closed view", post_id);
                return;
            }
            match result {
                Ok(comment) => {
                    task.notify(NotificationRequest {
                        notification_type: NotificationKind::Comment,
                        notification_type_id: comment.id,
                        user_id: author_id,
                        post_id: Some(post_id.clone()),
                    });
                    task.state.write().unwrap().comments.network_ok();
                    task.draw().await;
                    task.reconcile(&post_id, Mutated::Comments).await;
                }
                Err(e) => task.comment_failed(&post_id, e).await,
            }
        });
        None
    }

    fn delete_selected_comment(&self) -> Option<String> {
        let Some(session) = self.session.clone() else {
            return Some(ApiError::Unauthenticated.to_string());
        };
        let (post_id, comment_id) = {
            let mut state = self.state.write().unwrap();
            let comment = state
                .selected_comment
                .and_then(|index| state.post.comments.get(index))?;
            if !session.is_owner(&comment.author.id) {
                return Some("You can only delete your own comments".to_string());
            }
            let ids = (state.post.id.clone(), comment.id.clone());
            if !state.comments.begin(CommentAction::Remove) {
                return Some("Still saving your last comment".to_string());
            }
            ids
        };

        let task = self.task();
        tokio::spawn(async move {
            task.draw().await;
            let result = task.api.delete_comment(&session, &comment_id).await;
            if !task.ticket.is_live() {
                debug!("dropping comment removal of post {} for a closed view", post_id);
                return;
            }
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!("comment {} was already removed", comment_id),
                Err(e) => {
                    task.comment_failed(&post_id, e).await;
                    return;
                }
            }
            task.state.write().unwrap().comments.network_ok();
            task.draw().await;
            task.reconcile(&post_id, Mutated::Comments).await;
        });
        None
    }

    fn select_comment(&self, forward: bool) {
        let mut state = self.state.write().unwrap();
        let count = state.post.comments.len();
        if count == 0 {
            state.selected_comment = None;
            return;
        }
        state.selected_comment = Some(match (state.selected_comment, forward) {
            (None, _) => 0,
            (Some(index), true) => (index + 1).min(count - 1),
            (Some(index), false) => index.saturating_sub(1),
        });
    }

    fn open_video(&self) -> Option<String> {
        let link = self
            .state
            .read()
            .unwrap()
            .post
            .albums
            .iter()
            .find_map(Album::video_link);
        let Some(url) = link else {
            return Some("This post has no video".to_string());
        };
        match open::that_detached(&url) {
            Ok(()) => {
                debug!("opened {}", url);
                None
            }
            Err(e) => {
                error!("opening {} failed: {}", url, e);
                Some(format!("Couldn't open {}: {}", url, e))
            }
        }
    }

    async fn handle_composer_key(&mut self, code: &KeyCode) -> Result<(), TunefeedError> {
        let Some(input) = self.composer.as_mut() else {
            return Ok(());
        };
        match code {
            KeyCode::Esc => self.composer = None,
            KeyCode::Enter => {
                let text = input.value().to_string();
                self.composer = None;
                if let Some(notice) = self.submit_comment(text) {
                    self.app_event_sender.send(AppEvent::Notice(notice)).await?;
                }
            }
            KeyCode::Backspace => {
                input.handle(InputRequest::DeletePrevChar);
            }
            KeyCode::Delete => {
                input.handle(InputRequest::DeleteNextChar);
            }
            KeyCode::Left => {
                input.handle(InputRequest::GoToPrevChar);
            }
            KeyCode::Right => {
                input.handle(InputRequest::GoToNextChar);
            }
            KeyCode::Home => {
                input.handle(InputRequest::GoToStart);
            }
            KeyCode::End => {
                input.handle(InputRequest::GoToEnd);
            }
            KeyCode::Char(c) => {
                input.handle(InputRequest::InsertChar(*c));
            }
            _ => {}
        }
        self.app_event_sender.send(AppEvent::Draw).await?;
        Ok(())
    }
}

impl DetailTask {
    async fn comment_failed(&self, post_id: &str, e: ApiError) {
        error!("comment request on post {} failed: {}", post_id, e);
        let message = {
            let mut state = self.state.write().unwrap();
            state.comments.rollback(e.to_string());
            state.comments.take_error()
        };
        if e.is_not_found() {
            self.post_gone().await;
            return;
        }
        if let Some(message) = message {
            self.notice(format!("Couldn't save comment: {}", message)).await;
        }
        self.draw().await;
    }
}

/// Rows of the scrolled content: header, cover, the comments title line and
/// the comments. Clamped to what a buffer can address.
fn content_height(header_rows: usize, image_rows: u16, comment_rows: usize) -> u16 {
    let clamp = |rows: usize| u16::try_from(rows).unwrap_or(u16::MAX);
    clamp(header_rows)
        .saturating_add(image_rows)
        .saturating_add(1)
        .saturating_add(clamp(comment_rows))
}

async fn fetch_cover(api: &MusicApi, url: Option<String>) -> Option<DynamicImage> {
    let url = url.filter(|url| !url.is_empty())?;
    let bytes = match api.client().get(&url).send().await {
        Ok(response) => match response.error_for_status() {
            Ok(response) => response.bytes().await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
        Err(e) => Err(e.to_string()),
    };
    match bytes.and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string())) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("cover {} not shown: {}", url, e);
            None
        }
    }
}

impl Component for PostDetailComponent {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        let Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event
        else {
            return Ok(());
        };
        if self.composer.is_some() {
            return self.handle_composer_key(code).await;
        }

        let notice = match code {
            KeyCode::Char('h') | KeyCode::Backspace => {
                self.app_event_sender
                    .send(AppEvent::ClosePostDetail)
                    .await?;
                None
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.write().unwrap().scroll_state.scroll_down();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.write().unwrap().scroll_state.scroll_up();
                None
            }
            KeyCode::Char('n') => {
                self.select_comment(true);
                None
            }
            KeyCode::Char('p') => {
                self.select_comment(false);
                None
            }
            KeyCode::Char('f') => self.toggle_like(),
            KeyCode::Char('c') => {
                if self.session.is_some() {
                    self.composer = Some(Input::default());
                    None
                } else {
                    Some(ApiError::Unauthenticated.to_string())
                }
            }
            KeyCode::Char('x') => self.delete_selected_comment(),
            KeyCode::Char('o') => self.open_video(),
            KeyCode::Char('r') => {
                self.reload();
                None
            }
            KeyCode::Char('u') => {
                let author_id = self.state.read().unwrap().post.author.id.clone();
                self.app_event_sender
                    .send(AppEvent::OpenProfile(author_id))
                    .await?;
                None
            }
            _ => return Ok(()),
        };
        if let Some(notice) = notice {
            self.app_event_sender.send(AppEvent::Notice(notice)).await?;
        }
        self.app_event_sender.send(AppEvent::Draw).await?;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let user_id = self.session.as_ref().map(|session| session.user_id.clone());
        let mut guard = self.state.write().unwrap();
        let state = &mut *guard;

        let root_block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(format!("@{}", state.post.author.nickname).italic())
            .title_bottom("f like · c comment · n/p select · x delete · o video · u profile · h back");
        let root_block_inner = root_block.inner(area);
        let [content_area, composer_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(if self.composer.is_some() { 3 } else { 0 }),
        ])
        .areas(root_block_inner);
        let [content_area_no_scrollbar, _] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(1)]).areas(content_area);
        let width = content_area_no_scrollbar.width.max(1) as usize;

        let mut header: Vec<Line> = textwrap::wrap(&state.post.title, width)
            .into_iter()
            .map(|line| Line::from(line.into_owned()).bold())
            .collect();
        if let Some(created_at) = state.post.created_at {
            header.push(Line::from(HumanTime::from(created_at - Utc::now()).to_string()).italic());
        }
        let like_state = state.like_state();
        let mut reactions = format!(
            "{} {}  💬 {}",
            if like_state.is_liked { "♥" } else { "♡" },
            like_state.like_count,
            state.comments.count()
        );
        if state.is_saving() {
            reactions.push_str("  saving...");
        } else if state.loading {
            reactions.push_str("  refreshing...");
        }
        header.push(Line::from(reactions).fg(Color::Magenta));
        header.push(Line::default());
        header.extend(
            textwrap::wrap(&state.post.description, width)
                .into_iter()
                .map(|line| Line::from(line.into_owned())),
        );
        if !state.post.albums.is_empty() {
            header.push(Line::default());
            for (index, album) in state.post.albums.iter().enumerate() {
                let video = if album.video_link().is_some() { " ▶" } else { "" };
                header.push(
                    Line::from(format!(
                        "{}. {} - {}{}",
                        index + 1,
                        album.artist,
                        album.title,
                        video
                    ))
                    .fg(Color::Cyan),
                );
            }
        }
        header.push(Line::default());

        let image_size = match &state.cover {
            Some(image) => {
                let [image_area] = Layout::vertical([Constraint::Percentage(50)])
                    .areas(content_area_no_scrollbar);
                image.size_for(Resize::Scale(None), image_area)
            }
            None => Rect::ZERO,
        };

        let comments: Vec<CommentWidget> = state
            .post
            .comments
            .iter()
            .enumerate()
            .map(|(index, comment)| {
                let is_own = user_id.as_deref() == Some(comment.author.id.as_str());
                CommentWidget::new(
                    comment,
                    state.selected_comment == Some(index),
                    is_own,
                    content_area_no_scrollbar.width,
                )
            })
            .collect();
        let comments_height: usize = comments.iter().map(CommentWidget::height).sum();

        let image_gap = u16::from(image_size.height > 0);
        let content_height =
            content_height(header.len(), image_size.height.saturating_add(image_gap), comments_height);

        let mut scrollview = ScrollView::new(Size::new(content_area.width, content_height))
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);
        let [scrollview_area, _for_scrollbar] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(1)])
                .areas(scrollview.area());
        let scrollview_buf = scrollview.buf_mut();

        let [header_area, image_area, _, comments_title_area, comments_area] = Layout::vertical([
            Constraint::Length(u16::try_from(header.len()).unwrap_or(u16::MAX)),
            Constraint::Length(image_size.height),
            Constraint::Length(image_gap),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .areas(scrollview_area);

        Paragraph::new(header).render(header_area, scrollview_buf);

        if let Some(image) = &mut state.cover {
            let [image_center] = Layout::horizontal([Constraint::Length(image_size.width)])
                .flex(Flex::Center)
                .areas(image_area);
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            image_widget.render(image_center, scrollview_buf, image);
        }

        Paragraph::new(format!("Comments ({})", state.comments.count()))
            .bold()
            .render(comments_title_area, scrollview_buf);
        let mut y = comments_area.y;
        for comment in comments {
            let height = u16::try_from(comment.height()).unwrap_or(u16::MAX);
            let area = Rect::new(comments_area.x, y, comments_area.width, height);
            comment.render(area, scrollview_buf);
            y = y.saturating_add(height);
        }

        let buf = frame.buffer_mut();
        root_block.render(area, buf);
        scrollview.render(content_area, buf, &mut state.scroll_state);

        if let Some(input) = &self.composer {
            let block = Block::bordered()
                .border_type(BorderType::Rounded)
                .title("Comment · Enter to send · Esc to cancel");
            let inner = block.inner(composer_area);
            let scroll = input.visual_scroll(inner.width.max(1) as usize - 1);
            Paragraph::new(input.value())
                .scroll((0, scroll as u16))
                .block(block)
                .render(composer_area, buf);
            let cursor = input.visual_cursor().max(scroll) - scroll;
            frame.set_cursor_position((inner.x + cursor as u16, inner.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::mpsc::{self, Receiver};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::api::PostData;

    fn post_json(title: &str, likes: Value, comments: Value) -> Value {
        json!({
            "_id": "p1",
            "title": json!({ "title": title, "albums": [], "description": "d" }).to_string(),
            "author": { "_id": "u2", "fullName": "{\"nickName\":\"minji\"}" },
            "likes": likes,
            "comments": comments,
            "channel": "ch1"
        })
    }

    fn own_comment() -> Value {
        json!([{
            "_id": "c1",
            "author": { "_id": "u1", "fullName": "{}" },
            "comment": "nice",
            "createdAt": "2024-05-01T10:00:00Z"
        }])
    }

    fn post(body: &Value) -> Post {
        Post::from(serde_json::from_value::<PostData>(body.clone()).unwrap())
    }

    fn view(server: &MockServer) -> (PostDetailComponent, Receiver<AppEvent>) {
        let (sender, receiver) = mpsc::channel(100);
        let api = Arc::new(MusicApi::new(&server.uri()).unwrap());
        let view = PostDetailComponent::new(
            api,
            Some(Session::new("tok", "u1")),
            Arc::new(Picker::from_fontsize((8, 16))),
            sender,
        );
        (view, receiver)
    }

    async fn mount_notifications(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "n1" })))
            .mount(server)
            .await;
    }

    /// Collects events until `done` holds, then whatever trails in shortly after.
    async fn wait_until(
        receiver: &mut Receiver<AppEvent>,
        state: &Arc<RwLock<PostDetailState>>,
        done: impl Fn(&[AppEvent], &PostDetailState) -> bool,
    ) -> Vec<AppEvent> {
        let mut events = Vec::new();
        loop {
            if done(&events, &state.read().unwrap()) {
                break;
            }
            match tokio::time::timeout(Duration::from_secs(5), receiver.recv()).await {
                Ok(Some(event)) => events.push(event),
                _ => panic!("view did not settle, events so far: {:?}", events),
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn loaded(_: &[AppEvent], state: &PostDetailState) -> bool {
        !state.loading
    }

    fn has_notice(events: &[AppEvent], _: &PostDetailState) -> bool {
        events.iter().any(|event| matches!(event, AppEvent::Notice(..)))
    }

    fn likes_idle(state: &PostDetailState) -> bool {
        state
            .likes
            .as_ref()
            .is_some_and(|likes| *likes.phase() == ReactionPhase::Idle)
    }

    fn was_closed(events: &[AppEvent]) -> bool {
        events
            .iter()
            .any(|event| matches!(event, AppEvent::ClosePostDetail))
    }

    #[test]
    fn content_height_saturates_on_long_threads() {
        assert_eq!(content_height(4, 10, 20), 35);
        assert_eq!(content_height(4, 0, 70_000), u16::MAX);
        assert_eq!(content_height(usize::MAX, 10, 0), u16::MAX);
    }

    #[test]
    fn failed_comment_refresh_leaves_like_reconciling() {
        let body = post_json("Sunset", json!([]), json!([]));
        let post = post(&body);
        let mut likes = LikeReconciler::new(&post, "u1");
        likes.apply(LikeAction::Like);
        likes.network_ok(None);
        let mut comments = CommentReconciler::new(&post);
        comments.begin(CommentAction::Add);
        comments.network_ok();
        let mut state = PostDetailState {
            loading: false,
            post,
            likes: Some(likes),
            comments,
            selected_comment: None,
            scroll_state: ScrollViewState::default(),
            cover: None,
        };

        state.settle(Mutated::Comments);

        assert_eq!(*state.comments.phase(), CommentPhase::Idle);
        assert_eq!(
            state.likes.as_ref().map(LikeReconciler::phase),
            Some(&ReactionPhase::Reconciling)
        );
        state.settle(Mutated::Likes);
        assert!(likes_idle(&state));
    }

    #[tokio::test]
    async fn failed_like_rolls_back_and_keeps_post_open() {
        let server = MockServer::start().await;
        let body = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posts/p1/likes"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&body));
        wait_until(&mut receiver, &view.state, loaded).await;

        assert_eq!(view.toggle_like(), None);
        assert!(view.state.read().unwrap().like_state().is_liked);
        let events = wait_until(&mut receiver, &view.state, has_notice).await;

        let state = view.state.read().unwrap();
        assert_eq!(state.like_state(), LikeState::default());
        assert!(likes_idle(&state));
        assert!(events.iter().any(|event| matches!(
            event,
            AppEvent::Notice(message) if message.starts_with("Couldn't update like")
        )));
        assert!(!was_closed(&events));
    }

    #[tokio::test]
    async fn acknowledged_like_takes_server_snapshot() {
        let server = MockServer::start().await;
        let before = post_json("Sunset", json!([]), json!([]));
        let after = post_json(
            "Sunset",
            json!([{ "_id": "l8", "user": "u3" }, { "_id": "l9", "user": "u1" }]),
            json!([]),
        );
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&before))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&after))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posts/p1/likes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "_id": "l9", "user": "u1", "post": "p1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_notifications(&server).await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&before));
        wait_until(&mut receiver, &view.state, loaded).await;

        assert_eq!(view.toggle_like(), None);
        let events = wait_until(&mut receiver, &view.state, |_, state| {
            likes_idle(state) && state.like_state().like_count == 2
        })
        .await;

        let state = view.state.read().unwrap();
        assert!(state.like_state().is_liked);
        assert_eq!(state.post.likes.len(), 2);
        assert!(!was_closed(&events));
    }

    #[tokio::test]
    async fn load_snapshot_older_than_acknowledged_like_is_dropped() {
        let server = MockServer::start().await;
        let before = post_json("Sunset", json!([]), json!([]));
        let after = post_json("Sunset", json!([{ "_id": "l9", "user": "u1" }]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(&before)
                    .set_delay(Duration::from_millis(300)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&after))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posts/p1/likes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "_id": "l9", "user": "u1", "post": "p1" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_notifications(&server).await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&before));
        assert_eq!(view.toggle_like(), None);
        wait_until(&mut receiver, &view.state, |events, state| {
            loaded(events, state) && likes_idle(state)
        })
        .await;

        let state = view.state.read().unwrap();
        assert_eq!(
            state.like_state(),
            LikeState {
                is_liked: true,
                like_count: 1
            }
        );
    }

    #[tokio::test]
    async fn unlike_of_already_removed_like_keeps_post_open() {
        let server = MockServer::start().await;
        let liked = post_json("Sunset", json!([{ "_id": "l1", "user": "u1" }]), json!([]));
        let unliked = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&liked))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&unliked))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/likes/l1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&liked));
        wait_until(&mut receiver, &view.state, loaded).await;

        assert_eq!(view.toggle_like(), None);
        let events = wait_until(&mut receiver, &view.state, |_, state| {
            likes_idle(state) && state.like_state().like_count == 0
        })
        .await;

        assert!(!view.state.read().unwrap().like_state().is_liked);
        assert!(!was_closed(&events));
        assert!(!has_notice(&events, &view.state.read().unwrap()));
    }

    #[tokio::test]
    async fn deleting_already_removed_comment_keeps_post_open() {
        let server = MockServer::start().await;
        let with_comment = post_json("Sunset", json!([]), own_comment());
        let without = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&with_comment))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&without))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/comments/c1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&with_comment));
        wait_until(&mut receiver, &view.state, loaded).await;

        view.select_comment(true);
        assert_eq!(view.delete_selected_comment(), None);
        let events = wait_until(&mut receiver, &view.state, |_, state| {
            *state.comments.phase() == CommentPhase::Idle && state.post.comments.is_empty()
        })
        .await;

        let state = view.state.read().unwrap();
        assert_eq!(state.comments.count(), 0);
        assert_eq!(state.selected_comment, None);
        assert!(!was_closed(&events));
    }

    #[tokio::test]
    async fn missing_post_closes_view() {
        let server = MockServer::start().await;
        let body = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&body));
        let events = wait_until(&mut receiver, &view.state, has_notice).await;

        let closed_at = events
            .iter()
            .position(|event| matches!(event, AppEvent::ClosePostDetail));
        let notice_at = events
            .iter()
            .position(|event| matches!(event, AppEvent::Notice(message) if message == POST_GONE));
        assert!(closed_at.is_some());
        assert!(closed_at < notice_at);
    }

    #[tokio::test]
    async fn like_on_deleted_post_closes_view() {
        let server = MockServer::start().await;
        let body = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posts/p1/likes"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&body));
        wait_until(&mut receiver, &view.state, loaded).await;

        assert_eq!(view.toggle_like(), None);
        let events = wait_until(&mut receiver, &view.state, has_notice).await;

        assert!(was_closed(&events));
        assert_eq!(
            view.state.read().unwrap().like_state(),
            LikeState::default()
        );
    }

    #[tokio::test]
    async fn closed_view_ignores_late_snapshot() {
        let server = MockServer::start().await;
        let body = post_json("Sunset", json!([]), json!([]));
        Mock::given(method("GET"))
            .and(path("/posts/p1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(post_json("Renamed", json!([{ "_id": "l1", "user": "u3" }]), json!([])))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (mut view, mut receiver) = view(&server);
        view.load(post(&body));
        view.close();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }

        let state = view.state.read().unwrap();
        assert_eq!(state.post.title, "Sunset");
        assert_eq!(state.like_state().like_count, 0);
        assert!(state.loading);
        assert!(!was_closed(&events));
        assert!(!has_notice(&events, &state));
    }
}
