use std::process::Command;

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    let vars = [
        ("GEOTREK_GIT_COMMIT", "git", &["rev-parse", "--short", "HEAD"][..]),
        ("GEOTREK_GIT_BRANCH", "git", &["rev-parse", "--abbrev-ref", "HEAD"][..]),
        ("GEOTREK_BUILD_TIMESTAMP", "date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"][..]),
    ];

    for (name, program, args) in vars {
        if let Some(value) = command_output(program, args) {
            println!("cargo:rustc-env={name}={value}");
        }
    }
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
