#![no_main]

use haversine::pairs::parse_pairs;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed documents must come back as errors, never panics
        if let Ok(pairs) = parse_pairs(input) {
            assert!(!pairs.is_empty());
            let _ = haversine::haversine::mean_distance(&pairs);
        }
    }
});
