#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zipdir::{IndexBuilder, IndexOptions, InitMethod};

fuzz_target!(|data: &[u8]| {
    // Every init method must fail cleanly on arbitrary input
    for init_method in [InitMethod::Default, InitMethod::Full, InitMethod::Validate] {
        let options = IndexOptions::new().init_method(init_method);
        let mut index = match IndexBuilder::new(options).build(Cursor::new(data)) {
            Ok(index) => index,
            Err(_) => continue,
        };

        let paths: Vec<String> = index.entries().into_iter().map(|(path, _)| path).collect();
        for path in &paths {
            let _ = index.read_file(path);
        }
        let _ = index.validate_all();

        let _ = index.find_dir("");
        let _ = index.contains("test.txt");
        let _ = index.contains("");
        let _ = index.contains("/");
        let _ = index.contains("..\\..\\etc\\passwd");
    }
});
