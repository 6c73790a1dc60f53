#![no_main]

use libfuzzer_sys::fuzz_target;
use stardust_vault::seed::{parse_mnemonic, validate_mnemonic};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let parsed = parse_mnemonic(s);
        // A phrase that validates must also parse.
        if validate_mnemonic(s) {
            assert!(parsed.is_ok());
        }
    }
});
