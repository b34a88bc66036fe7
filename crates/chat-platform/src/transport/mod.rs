pub mod fetch;
pub mod utf8;

pub use fetch::FetchTransport;
pub use utf8::Utf8ChunkDecoder;
