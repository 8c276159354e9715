#![no_main]

use bundleweave::{classfile::ClassFile, config::TransformConfig, rewrite::RewriteEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(class) = ClassFile::parse(data) {
        let emitted = class.to_bytes().expect("parsed class must re-emit");
        assert_eq!(emitted, data);
    }
    let _ = RewriteEngine::new(TransformConfig::default()).rewrite(data);
});
