use std::env;
use std::path::{Path, PathBuf};

const WATCHED_VARIABLES: &[&str] = &[
    "FFMPEG_DIR",
    "FFMPEG_PKG_CONFIG_PATH",
    "VCPKG_ROOT",
    "VCPKGRS_DYNAMIC",
    "VCPKGRS_TRIPLET",
];

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // ffmpeg-sys-next finds FFmpeg through pkg-config everywhere but
    // Windows; an explicit FFMPEG_DIR always wins.
    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows"
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=shotgrid needs FFmpeg; on Windows install it with vcpkg and set VCPKG_ROOT or FFMPEG_DIR."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let installed = vcpkg_install_dir(Path::new(&vcpkg_root), &triplet);
    if !installed.join("include").join("libavformat").exists() {
        println!(
            "cargo:warning=no FFmpeg headers under {}; run `vcpkg install ffmpeg:{triplet}`.",
            installed.display(),
        );
        return;
    }

    println!(
        "cargo:warning=using vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to silence this message.",
        installed.display(),
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=set VCPKGRS_DYNAMIC=1 when linking against a dynamic vcpkg FFmpeg.");
    }
}

fn vcpkg_install_dir(root: &Path, triplet: &str) -> PathBuf {
    root.join("installed").join(triplet)
}
