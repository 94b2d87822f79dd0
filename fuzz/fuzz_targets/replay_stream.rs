#![no_main]

use bus::RecordEvent;
use libfuzzer_sys::fuzz_target;
use replay::Replayer;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let events: Vec<RecordEvent> = text
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    let mut replayer = Replayer::new();
    let failed = replayer.apply_all(&events);
    assert!(failed <= events.len());
    let _ = replayer.snapshot();
});
