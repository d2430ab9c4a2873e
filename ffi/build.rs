use std::env;
use std::path::PathBuf;

/// Regenerate `include/fetch_ffi.h` from the `extern "C"` surface.
fn main() {
    println!("cargo:rerun-if-changed=src");
    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let include_dir = PathBuf::from(&crate_dir).join("include");
    if let Err(e) = std::fs::create_dir_all(&include_dir) {
        println!("cargo:warning=cannot create {}: {e}", include_dir.display());
        return;
    }

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("FETCH_FFI_H".to_string()),
        header: Some(
            "/* A fetch_request handle belongs to one thread at a time. While\n \
             * fetch_request_execute runs, poll progress through a fetch_monitor and\n \
             * stop the call through a fetch_cancel handle, both created beforehand.\n \
             */"
                .to_string(),
        ),
        cpp_compat: true,
        ..Default::default()
    };
    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(include_dir.join("fetch_ffi.h"));
        }
        Err(e) => println!("cargo:warning=header generation skipped: {e}"),
    }
}
