fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Server stubs back the in-process target used by integration tests.
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(&["proto/gnmi.proto"], &["proto/"])?;
    Ok(())
}
