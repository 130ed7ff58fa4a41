mod reader;

pub use reader::{VideoSession, VideoSessionReader};
