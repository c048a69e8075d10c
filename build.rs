// crates.io
use vergen_gitcl::{Cargo, Emitter, Gitcl};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut emitter = Emitter::default();

	emitter.add_instructions(&Cargo::builder().target_triple(true).build())?;

	// Installed from a source tarball without git metadata.
	if emitter.add_instructions(&Gitcl::builder().sha(true).build()).is_err() {
		println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");
	}

	emitter.emit()?;

	Ok(())
}
