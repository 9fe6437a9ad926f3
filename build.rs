use std::io::Result;

fn main() -> Result<()> {
    prost_build::compile_protos(&["src/dialogue.proto"], &["src/"])?;

    Ok(())
}
