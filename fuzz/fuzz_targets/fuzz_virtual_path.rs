#![no_main]
use libfuzzer_sys::fuzz_target;
use shepherd_types::{resolve_address, VirtualPath, ADDRESS_HEX_LENGTH};

// Request paths come straight from the URL; parsing and hashing must never
// panic and must stay deterministic.
fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(path) = VirtualPath::under_root(raw) {
        assert!(!path.is_empty());
        assert!(path.segments().iter().all(|s| !s.is_empty() && s != "." && s != ".."));

        let address = resolve_address(&path);
        assert_eq!(address.as_str().len(), ADDRESS_HEX_LENGTH);
        assert_eq!(address, resolve_address(&path));

        let site = path.with_index_document();
        let _ = site.extension();
    }
});
