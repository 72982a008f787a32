//! Builds the C++ catch-all shim and generates the `__cxa_exception` layout
//! constant used by the catch probe.

use std::{env, fs, path::PathBuf};

/// Overrides the size of the C++ runtime's `__cxa_exception` control block.
const SIZE_OVERRIDE_VAR: &str = "CUSTOM_EH_CXA_EXCEPTION_SIZE";

#[derive(Clone, Copy, Debug)]
enum CxxRuntime {
    LibStdCxx,
    LibCxxAbi,
}

impl CxxRuntime {
    fn from_features() -> Self {
        let libstdcxx = env::var_os("CARGO_FEATURE_LIBSTDCXX").is_some();
        let libcxxabi = env::var_os("CARGO_FEATURE_LIBCXXABI").is_some();
        // Apple and the BSDs only ship libc++, whatever the features say.
        let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
        let system_libcxx = matches!(
            target_os.as_str(),
            "macos" | "ios" | "freebsd" | "openbsd" | "netbsd"
        );
        match (libstdcxx, libcxxabi || system_libcxx) {
            (_, true) => Self::LibCxxAbi,
            (true, false) => Self::LibStdCxx,
            (false, false) => {
                panic!("enable one of the `libstdcxx` or `libcxxabi` features of custom-eh")
            }
        }
    }

    fn cfg_name(self) -> &'static str {
        match self {
            Self::LibStdCxx => "libstdcxx",
            Self::LibCxxAbi => "libcxxabi",
        }
    }

    /// `sizeof(__cxa_exception)` as laid out by each runtime on LP64 targets.
    ///
    /// libstdc++ ends the block with the unwind header right after
    /// `adjustedPtr`; libc++abi additionally carries `reserved` and
    /// `referenceCount` words in front of `exceptionType`.
    fn default_cxa_exception_size(self, pointer_width: &str) -> Option<usize> {
        match (self, pointer_width) {
            (Self::LibStdCxx, "64") => Some(0x70),
            (Self::LibCxxAbi, "64") => Some(0x80),
            _ => None,
        }
    }
}

fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn main() {
    println!("cargo:rerun-if-changed=src/shim/catch.cc");
    println!("cargo:rerun-if-env-changed={SIZE_OVERRIDE_VAR}");
    println!("cargo::rustc-check-cfg=cfg(cxx_runtime, values(\"libstdcxx\", \"libcxxabi\"))");

    let runtime = CxxRuntime::from_features();
    let pointer_width = env::var("CARGO_CFG_TARGET_POINTER_WIDTH").unwrap();

    let cxa_exception_size = match env::var(SIZE_OVERRIDE_VAR) {
        Ok(value) => parse_size(&value)
            .unwrap_or_else(|| panic!("{SIZE_OVERRIDE_VAR} is not a valid size: {value:?}")),
        Err(_) => runtime
            .default_cxa_exception_size(&pointer_width)
            .unwrap_or_else(|| {
                panic!(
                    "no known `__cxa_exception` size for {runtime:?} on {pointer_width}-bit \
                     targets; set {SIZE_OVERRIDE_VAR}"
                )
            }),
    };

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(
        out_dir.join("cxa_layout.rs"),
        format!(
            "/// Size in bytes of the C++ runtime's `__cxa_exception` control block.\n\
             pub const CXA_EXCEPTION_SIZE: usize = {cxa_exception_size:#x};\n"
        ),
    )
    .expect("Could not write the generated layout constants");

    let mut build = cc::Build::new();
    build.cpp(true).file("src/shim/catch.cc");
    if let CxxRuntime::LibCxxAbi = runtime {
        build.cpp_set_stdlib("c++");
    }
    println!("cargo:rustc-cfg=cxx_runtime=\"{}\"", runtime.cfg_name());
    build.compile("custom_eh_shim");
}
