use super::{warn_if_not_installed, GlobalArgs};
use shield::git::GitRepo;
use shield::oracle::{CandidateFile, FileState};
use shield::{Result, Shield, ShieldError};

/// Report matching files that are not sealed
pub fn check(args: &GlobalArgs) -> Result<()> {
    let shield = Shield::from_config(args.config()?)?;
    let unsealed = shield.check()?;
    report_unsealed(&unsealed)
}

/// Report staged files that match the patterns but whose staged content is
/// not sealed
pub fn scan(args: &GlobalArgs) -> Result<()> {
    let shield = Shield::from_config(args.config()?)?;
    let repo = GitRepo::open(shield.root())?;

    warn_if_not_installed();
    let staged = shield.classify_staged(&repo)?;
    println!("Scanning {} staged matching files...", staged.len());

    let unsealed: Vec<CandidateFile> = staged
        .into_iter()
        .filter(|candidate| candidate.state != FileState::Sealed)
        .collect();
    report_unsealed(&unsealed)
}

fn report_unsealed(unsealed: &[CandidateFile]) -> Result<()> {
    if unsealed.is_empty() {
        println!("All matching files are sealed.");
        return Ok(());
    }

    for candidate in unsealed {
        println!("ERROR: {} is {}", candidate.path.display(), candidate.state);
    }
    Err(ShieldError::Other(format!(
        "{} matching files are not sealed; run 'shield seal'",
        unsealed.len()
    )))
}
