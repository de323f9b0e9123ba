use super::{finish, print_report, warn_if_not_installed, GlobalArgs};
use shield::{BatchReport, Result, Shield};

/// Seal every matching plaintext file
pub fn seal(args: &GlobalArgs) -> Result<()> {
    let shield = Shield::from_config(args.config()?)?;
    println!("Sealing files in {}...", shield.root().display());
    warn_if_not_installed();

    let report = shield.seal()?;
    summarize(&shield, "Sealed", &report);
    finish(&report, "be sealed")
}

/// Unseal every matching sealed file
pub fn unseal(args: &GlobalArgs) -> Result<()> {
    let shield = Shield::from_config(args.config()?)?;
    println!("Unsealing files in {}...", shield.root().display());
    warn_if_not_installed();

    let report = shield.unseal()?;
    summarize(&shield, "Unsealed", &report);
    finish(&report, "be unsealed")
}

fn summarize(shield: &Shield, verb: &str, report: &BatchReport) {
    if report.total() == 0 {
        println!("Nothing to do.");
        return;
    }

    if let Ok(secret) = shield.config().secret() {
        if let Ok(fingerprint) = secret.fingerprint() {
            println!(
                "Secret: {} (fingerprint {fingerprint})",
                secret.path().display()
            );
        }
    }
    print_report(verb, report);
    println!(
        "{verb} {} of {} files.",
        report.succeeded.len(),
        report.total()
    );
}
