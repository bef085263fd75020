#![no_main]
use libfuzzer_sys::fuzz_target;
use shepherd_files::render_page;

// Provider bodies are untrusted; rendering must always produce a full page.
fuzz_target!(|data: &[u8]| {
    if let Ok(markdown) = std::str::from_utf8(data) {
        if markdown.len() < 100_000 {
            let page = render_page(markdown, "fuzz.md");
            assert!(page.starts_with("<!DOCTYPE html>"));
            assert!(page.trim_end().ends_with("</html>"));
        }
    }
});
