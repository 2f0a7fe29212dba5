//! Locates the system HEVC (libde265) and AAC (fdk-aac) codec libraries when the
//! `system-codecs` feature is enabled. Mirrors the way `moonfire-ffmpeg` and
//! `moonfire-tflite` locate their external C libraries in their own `build.rs`.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var_os("CARGO_FEATURE_SYSTEM_CODECS").is_none() {
        return;
    }

    if let Err(e) = pkg_config::Config::new().probe("libde265") {
        println!("cargo:warning=libde265 not found via pkg-config: {e}");
    }
    if let Err(e) = pkg_config::Config::new().probe("fdk-aac") {
        println!("cargo:warning=fdk-aac not found via pkg-config: {e}");
    }
}
