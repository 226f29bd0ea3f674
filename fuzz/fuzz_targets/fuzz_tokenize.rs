#![no_main]
use libfuzzer_sys::fuzz_target;
use sandman_core::command::{COMMAND_BUFFER_LEN, tokenize_text};

fuzz_target!(|data: &str| {
    // One token per space-separated word of the truncated buffer.
    assert!(tokenize_text(data).len() <= COMMAND_BUFFER_LEN + 1);
});
