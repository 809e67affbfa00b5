//! Records target, profile and build time for `receiptscan --version`

use std::env;

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    let var = |name: &str| env::var(name).unwrap_or_else(|_| "unknown".to_string());
    emit("RECEIPTSCAN_BUILD_TARGET", &var("TARGET"));
    emit("RECEIPTSCAN_BUILD_PROFILE", &var("PROFILE"));
    emit(
        "RECEIPTSCAN_BUILD_TIME",
        &chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
    );
    println!("cargo:rerun-if-changed=build.rs");
}
