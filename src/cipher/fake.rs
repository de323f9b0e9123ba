//! Deterministic stand-in cipher for tests.
//!
//! Seals by reversing the input and XOR-ing every byte with a key byte derived
//! from the secret. Offers no secrecy at all.

use super::{write_output, CipherProvider, Secret};
use crate::error::{Result, ShieldError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeCipher {
    fail_seal: Vec<String>,
    fail_unseal: Vec<String>,
    seal_calls: AtomicUsize,
    unseal_calls: AtomicUsize,
    sealed_inputs: Mutex<Vec<String>>,
}

impl FakeCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `seal` for any input whose file name contains `needle`.
    pub fn fail_seal_on(mut self, needle: &str) -> Self {
        self.fail_seal.push(needle.to_string());
        self
    }

    /// Fail `unseal` for any input whose file name contains `needle`.
    pub fn fail_unseal_on(mut self, needle: &str) -> Self {
        self.fail_unseal.push(needle.to_string());
        self
    }

    pub fn seal_calls(&self) -> usize {
        self.seal_calls.load(Ordering::SeqCst)
    }

    pub fn unseal_calls(&self) -> usize {
        self.unseal_calls.load(Ordering::SeqCst)
    }

    /// File names passed to `seal`, in call order.
    pub fn sealed_inputs(&self) -> Vec<String> {
        self.sealed_inputs
            .lock()
            .map(|names| names.clone())
            .unwrap_or_default()
    }

    fn should_fail(needles: &[String], input: &Path) -> bool {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        needles.iter().any(|needle| name.contains(needle.as_str()))
    }

    fn transform(secret: &Secret, input: &Path) -> Result<Vec<u8>> {
        let key = secret.read()?.iter().fold(0x5Au8, |acc, b| acc ^ b);
        let mut data = fs::read(input).map_err(|e| ShieldError::io_at(input, e))?;
        data.reverse();
        data.iter_mut().for_each(|b| *b ^= key);
        Ok(data)
    }
}

impl CipherProvider for FakeCipher {
    fn name(&self) -> &str {
        "fake"
    }

    fn seal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        self.seal_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut names) = self.sealed_inputs.lock() {
            names.push(
                input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }
        if Self::should_fail(&self.fail_seal, input) {
            return Err(ShieldError::Cipher(format!(
                "injected seal failure for {}",
                input.display()
            )));
        }
        write_output(output, &Self::transform(secret, input)?)
    }

    fn unseal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        self.unseal_calls.fetch_add(1, Ordering::SeqCst);
        if Self::should_fail(&self.fail_unseal, input) {
            return Err(ShieldError::Cipher(format!(
                "injected unseal failure for {}",
                input.display()
            )));
        }
        write_output(output, &Self::transform(secret, input)?)
    }
}
