use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use ratatui::{
    style::{Color, Stylize},
    text::Line,
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::model::comment::Comment;

pub struct CommentWidget {
    body_texts: Vec<String>,
    is_selected: bool,
    is_own: bool,
    nickname: String,
    created: DateTime<Utc>,
}

impl CommentWidget {
    pub fn new(comment: &Comment, is_selected: bool, is_own: bool, container_width: u16) -> Self {
        let width = container_width.saturating_sub(1).max(1);
        let text_wrap = textwrap::wrap(&comment.body, textwrap::Options::new(width as usize));
        Self {
            body_texts: text_wrap.into_iter().map(|v| v.into_owned()).collect(),
            is_selected,
            is_own,
            nickname: comment.author.nickname.clone(),
            created: comment.created_at,
        }
    }

    pub fn height(&self) -> usize {
        self.body_texts.len() + 2
    }
}

impl Widget for CommentWidget {
    fn render(self, area: ratatui::prelude::Rect, buf: &mut ratatui::prelude::Buffer)
    where
        Self: Sized,
    {
        let lines: Vec<Line> = self.body_texts.into_iter().map(Line::from).collect();
        let mut title = vec![
            self.nickname.bold(),
            format!(" • {}", HumanTime::from(self.created - Utc::now())).italic(),
        ];
        if self.is_own {
            title.push(" (you)".dim());
        }
        let mut item = Paragraph::new(lines).block(
            Block::new()
                .borders(Borders::TOP | Borders::LEFT)
                .border_type(BorderType::Rounded)
                .title(Line::from(title)),
        );
        if self.is_selected {
            item = item.fg(Color::Green);
        }
        item.render(area, buf);
    }
}
