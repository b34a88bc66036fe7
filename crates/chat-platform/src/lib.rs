pub mod transport;


pub use transport::{FetchTransport, Utf8ChunkDecoder};
