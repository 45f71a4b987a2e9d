pub mod author;
pub mod comment;
pub mod decode;
pub mod post;
