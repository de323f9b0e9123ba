use super::{warn_if_not_installed, GlobalArgs};
use shield::git::GitRepo;
use shield::hook::{self, HookContext, HookFlavor};
use shield::pattern::PatternSet;
use shield::Result;

/// Generate and install the git pre-commit hook
pub fn generate_hooks(args: &GlobalArgs, flavor: HookFlavor) -> Result<()> {
    println!("Generating git pre-commit hook...");

    let config = args.config()?;
    // The hook reads the same files at commit time; fail now if they are unusable.
    PatternSet::load(&config.root)?;

    let repo = GitRepo::open(&config.root)?;
    let root = repo
        .relative_root(&config.root)?
        .unwrap_or_else(|| ".".to_string());

    let ctx = HookContext {
        marker: config.marker()?,
        root,
        cipher: config.cipher,
        encryption_version: config.encryption_version.clone(),
    };

    let hooks_dir = repo.hooks_dir()?;
    for path in hook::install(&hooks_dir, flavor, &ctx)? {
        println!("Wrote {}", path.display());
    }

    warn_if_not_installed();
    println!("Git pre-commit hook successfully generated!");
    Ok(())
}
