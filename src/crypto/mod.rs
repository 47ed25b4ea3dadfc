mod engine;

pub use engine::TokenCipher;
