pub mod comment_widget;
pub mod post_card;
