fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Emit version information for --build
    vergen::EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()?;

    println!("cargo:rerun-if-env-changed=VERGEN_BUILD_TIMESTAMP");
    println!("cargo:rerun-if-env-changed=VERGEN_GIT_SHA");

    Ok(())
}
