pub mod chunker;
pub mod documents;
pub mod embed_batch;
pub mod extract;
pub mod grammars;
pub mod languages;
pub mod parser;
pub mod scanner;
pub mod sync;
