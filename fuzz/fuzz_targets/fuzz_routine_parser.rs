#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Bad steps are skipped and bad documents rejected, never a panic.
    let _ = sandman_config::parse_routine(data);
});
