//! Recipe fixtures and archive builders for tests.

use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::platform::{CompilerId, HostOs, PlatformContext};
use crate::core::recipe::Recipe;

/// The smallest valid recipe. Relies on the default build steps.
pub fn minimal_recipe_toml() -> String {
    format!(
        r#"[package]
name = "hello"
version = "2.12.1"

[source]
url = "https://ftp.gnu.org/gnu/hello/hello-2.12.1.tar.gz"
sha256 = "{}"

[configure]
args = ["--prefix={{prefix}}", "--disable-nls"]
"#,
        "0".repeat(64)
    )
}

/// The QEMU recipe shipped in `recipes/`.
pub fn qemu_recipe() -> Recipe {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("recipes/qemu.toml");
    Recipe::load(&path).unwrap()
}

/// A platform context from an OS and a `family@version` compiler.
pub fn context(os: HostOs, compiler: &str) -> PlatformContext {
    PlatformContext::new(os, compiler.parse::<CompilerId>().unwrap())
}

/// Build a gzipped tarball of regular files in memory.
///
/// Names are written into the header verbatim, so fixtures can contain
/// paths a well-behaved archiver would refuse (`..`, absolute paths).
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut data, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            let bytes = name.as_bytes();
            header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append(&header, *content).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }
    data
}
