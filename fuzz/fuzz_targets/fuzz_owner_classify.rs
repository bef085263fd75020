#![no_main]
use libfuzzer_sys::fuzz_target;
use shepherd_types::{resolve_address, scope_to_owner, OwnerIdentity, VirtualPath};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    match OwnerIdentity::classify(raw) {
        OwnerIdentity::Canonical(owner) => {
            assert_eq!(owner.as_str(), raw);
            if let Ok(path) = VirtualPath::parse("s/index.html") {
                let _ = scope_to_owner(&resolve_address(&path), &owner);
            }
        }
        OwnerIdentity::Alias(alias) => assert_eq!(alias, raw),
    }
});
