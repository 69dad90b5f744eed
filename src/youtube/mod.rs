pub mod embed;
pub mod extractor;
pub mod platform;
pub mod player;
pub mod url;
pub mod ytdlp;
