use crossterm::event::Event;
use ratatui::{Frame, layout::Rect};

use crate::tunefeed_error::TunefeedError;

#[cfg(debug_assertions)]
pub mod debug;

pub mod channellist;
pub mod feed;
pub mod postdetail;
pub mod profile;

pub trait Component {
    async fn handle_event(&mut self, event: &Event) -> Result<(), TunefeedError> {
        let _ = event;
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let _ = (frame, area);
    }
}
