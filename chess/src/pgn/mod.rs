pub mod parser;
pub mod san;

pub use parser::{normalize, replay, replay_with, tokenize, ImportedGame, ImportedPly, PgnError};
pub use san::{classify, play_san, resolve, ParsedToken, ResolvedMove, SanError};
