#![no_main]

use libfuzzer_sys::fuzz_target;
use stardust_vault::record::{EncryptedRecord, StoredFields};

fuzz_target!(|data: &[u8]| {
    // Split arbitrary text into the four stored fields.
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = s.splitn(4, '\n');
    let fields = StoredFields {
        encrypted: parts.next().unwrap_or_default().to_string(),
        salt: parts.next().unwrap_or_default().to_string(),
        iv: parts.next().unwrap_or_default().to_string(),
        address: parts.next().unwrap_or_default().to_string(),
    };

    // Decoding must never panic, and a decoded record re-encodes to the same bytes.
    if let Ok(record) = EncryptedRecord::from_fields(&fields) {
        let again = EncryptedRecord::from_fields(&record.to_fields()).unwrap();
        assert_eq!(record, again);
    }
});
