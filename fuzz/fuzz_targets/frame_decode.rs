#![no_main]
use libfuzzer_sys::fuzz_target;

use kafkaesque::protocol::frame::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        // Anything that decodes must re-encode to the exact input bytes.
        let encoded = frame.encode().expect("decoded frame must encode");
        assert_eq!(&encoded[..], data);
    }
});
