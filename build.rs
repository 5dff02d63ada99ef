// Build script to record the compiler version
//
// Host and backend modules exchange Rust trait objects through the plugin
// descriptor, so both sides must come from the same rustc. The version string
// ends up in every descriptor and is compared by the host at load time.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

    let version = match Command::new(&rustc).arg("--version").output() {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Ok(output) => {
            println!("cargo:warning=`{} --version` exited with {:?}", rustc, output.status.code());
            "unknown".to_string()
        }
        Err(e) => {
            println!("cargo:warning=couldn't run `{} --version`: {}", rustc, e);
            "unknown".to_string()
        }
    };

    println!("cargo:rustc-env=RENDERPLUG_RUSTC_VERSION={}", version);
}
