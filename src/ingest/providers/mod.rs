pub mod jina_reader;
pub mod newsapi;

pub use jina_reader::JinaReaderProvider;
pub use newsapi::NewsApiProvider;
