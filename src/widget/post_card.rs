use std::borrow::Cow;

use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Stylize},
    text::Line,
    widgets::{Block, BorderType, Paragraph, Widget},
};

use crate::{model::post::Post, reaction::compute_like_state};

const DESCRIPTION_LINES: usize = 3;

/// One post in a feed.
pub struct PostCard {
    pub nickname: String,
    pub title_lines: Vec<String>,
    pub album_line: Option<String>,
    pub description_lines: Vec<String>,
    pub background: Option<Color>,
    pub like_count: usize,
    pub is_liked: bool,
    pub comment_count: usize,
}

impl PostCard {
    pub fn new(post: &Post, user_id: Option<&str>, width: usize) -> Self {
        let width = width.max(1);
        let title_lines = textwrap::wrap(&post.title, width)
            .iter()
            .map(|i| i.to_string())
            .collect();
        let album_line = post.first_album().map(|album| {
            let more = post.albums.len() - 1;
            if more > 0 {
                format!("♪ {} - {} (+{})", album.artist, album.title, more)
            } else {
                format!("♪ {} - {}", album.artist, album.title)
            }
        });

        let mut description_wrap = textwrap::wrap(&post.description, width);
        if description_wrap.len() > DESCRIPTION_LINES {
            description_wrap.truncate(DESCRIPTION_LINES);
            let last = DESCRIPTION_LINES - 1;
            let mut new_last = description_wrap[last].to_string();
            let chars = new_last.chars().count();
            if chars > 3 {
                new_last = new_last.chars().take(chars - 3).collect::<String>() + "...";
            } else {
                new_last = "...".to_string();
            }
            description_wrap[last] = Cow::Owned(new_last);
        }
        let description_lines = description_wrap.iter().map(|i| i.to_string()).collect();

        let like_state = compute_like_state(post, user_id.unwrap_or_default());

        Self {
            nickname: post.author.nickname.clone(),
            title_lines,
            album_line,
            description_lines,
            background: None,
            like_count: like_state.like_count,
            is_liked: user_id.is_some() && like_state.is_liked,
            comment_count: post.comments.len(),
        }
    }

    pub fn height(&self) -> usize {
        self.title_lines.len()
         + usize::from(self.album_line.is_some())
         + 1 //Spacing
         + self.description_lines.len()
         + 2 //block border
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = Some(background);
    }
}

impl Widget for PostCard {
    fn render(self, area: ratatui::prelude::Rect, buf: &mut ratatui::prelude::Buffer)
    where
        Self: Sized,
    {
        let heart = if self.is_liked { "♥" } else { "♡" };
        let mut block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(format!("@{}", self.nickname).italic())
            .title_bottom(format!("{}{}", heart, self.like_count))
            .title_bottom(format!("💬{}", self.comment_count));

        if let Some(background) = self.background {
            block = block.bg(background);
        }

        let [title_area, album_area, body_area] = Layout::vertical([
            Constraint::Length(self.title_lines.len() as u16),
            Constraint::Length(u16::from(self.album_line.is_some()) + 1),
            Constraint::Fill(1),
        ])
        .areas(block.inner(area));
        block.render(area, buf);

        Paragraph::new(
            self.title_lines
                .into_iter()
                .map(Line::from)
                .collect::<Vec<Line>>(),
        )
        .add_modifier(Modifier::BOLD)
        .render(title_area, buf);
        if let Some(album_line) = self.album_line {
            Paragraph::new(album_line)
                .fg(Color::Cyan)
                .render(album_area, buf);
        }
        Paragraph::new(
            self.description_lines
                .into_iter()
                .map(Line::from)
                .collect::<Vec<Line>>(),
        )
        .render(body_area, buf);
    }
}
