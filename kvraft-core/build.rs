fn main() -> Result<(), Box<dyn std::error::Error>> {
    // protoc comes from protoc-bin-vendored.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .type_attribute(
            ".kvraft.Response",
            "#[derive(serde::Serialize, serde::Deserialize)]",
        )
        .compile_protos(&["proto/kvraft.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/kvraft.proto");
    Ok(())
}
