/// The core words of teh language.
pub mod base_words;

/// Words that perform I/O operations.
pub mod io_words;

/// Words that work with the terminal.
pub mod terminal_words;

/// Words that access the user's environment.
pub mod user_words;

/// Words that interface with foreign functions.
pub mod ffi_words;
