/// The single page, served as-is.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");
