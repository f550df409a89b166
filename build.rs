// build.rs
//
// Stamps BUILD_DATE into $OUT_DIR/build_info.rs for the startup banner.

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    fs::write(&dest_path, format!("pub const BUILD_DATE: &str = \"{}\";\n", build_date))
        .expect("write build_info.rs");

    // only re-stamp when this script changes
    println!("cargo:rerun-if-changed=build.rs");
}
