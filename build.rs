use std::process::Command;
use vergen::EmitBuilder;

fn inside_git_checkout() -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn main() {
    let mut builder = EmitBuilder::builder();
    builder.build_timestamp();

    // The version endpoint falls back to "unknown" when the SHA is not emitted.
    if inside_git_checkout() {
        builder.git_sha(true);
    }

    builder.emit().expect("Unable to generate build metadata");
}
