#![no_main]

use cordyceps_avl::{AvlSet, DecodeOptions};
use libfuzzer_sys::fuzz_target;

// Any input either fails cleanly or decodes to a valid set that re-encodes to the same bytes.
fuzz_target!(|data: &[u8]| {
    let options = DecodeOptions {
        max_nodes: 1 << 12,
        ..DecodeOptions::default()
    };

    let mut buf = data;
    if let Ok(set) = AvlSet::deserialize_with(&mut buf, &options) {
        assert!(set.validate());

        let consumed = data.len() - buf.len();
        assert_eq!(set.to_bytes(), &data[..consumed]);
    }
});
