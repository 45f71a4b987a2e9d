use std::sync::Arc;

use log::warn;
use ratatui_image::picker::Picker;

use crate::{api::MusicApi, app::App, config::Config, tunefeed_error::TunefeedError};

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

mod api;
mod app;
mod component;
mod config;
mod model;
mod reaction;
mod session;
mod tunefeed_error;
mod view_scope;
mod widget;

#[tokio::main]
async fn main() -> Result<(), TunefeedError> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();
    #[cfg(debug_assertions)]
    {
        use log::debug;
        tui_logger::init_logger(log::LevelFilter::Trace)?;
        tui_logger::set_default_level(log::LevelFilter::Debug);
        debug!("App started")
    }

    let config = Config::load()?;
    let api = Arc::new(MusicApi::new(&config.api_base_url)?);
    if config.session.is_none() {
        warn!("no session configured, browsing read-only");
    }

    let mut terminal = ratatui::init();
    let picker = Picker::from_query_stdio().unwrap_or_else(|e| {
        warn!("terminal graphics query failed, using default font size: {:?}", e);
        Picker::from_fontsize((8, 16))
    });
    let app_result = App::new(config, api, Arc::new(picker))
        .run(&mut terminal)
        .await;

    ratatui::restore();

    app_result
}
