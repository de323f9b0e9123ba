//! # Pre-commit Hook Generation
//!
//! The generated hook does not call back into shield to decide whether a
//! staged file needs sealing. It reads `.shield` and `.shieldignore` itself,
//! translates each glob into an anchored regular expression, and checks the
//! first bytes of each staged file for the seal marker. Only when something
//! is unsealed does it run `shield seal`, re-stage the files, and abort the
//! commit so the user can retry.
//!
//! ## Glob Translation
//!
//! The scripts apply the same rules as the resolver:
//!
//! | glob  | regex     |
//! |-------|-----------|
//! | `**/` | `(.*/)?`  |
//! | `**`  | `.*`      |
//! | `*`   | `[^/]*`   |
//! | `?`   | `[^/]`    |
//!
//! Everything else is matched literally and case-sensitively. Patterns the
//! resolver would reject make the hook fail too.

use crate::cipher::CipherKind;
use crate::error::{Result, ShieldError};
use crate::marker::SealMarker;
use crate::transform::Operation;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Script dialect to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HookFlavor {
    /// bash script
    Posix,
    /// PowerShell script plus a `sh` shim
    Powershell,
}

impl HookFlavor {
    /// The flavor for the platform shield was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            HookFlavor::Powershell
        } else {
            HookFlavor::Posix
        }
    }
}

/// Everything baked into a generated hook.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub marker: SealMarker,
    /// Operating root relative to the repository top level, `.` for the top.
    pub root: String,
    pub cipher: CipherKind,
    pub encryption_version: String,
}

impl HookContext {
    fn seal_args(&self) -> Vec<String> {
        vec![
            "-C".into(),
            self.root.clone(),
            "--cipher".into(),
            self.cipher.as_str().into(),
            "--encryption-version".into(),
            self.encryption_version.clone(),
            "seal".into(),
        ]
    }
}

const POSIX_TEMPLATE: &str = r#"#!/usr/bin/env bash
# pre-commit hook generated by shield @SHIELD_VERSION@.
# Regenerate with `shield generate-hooks`; manual edits are overwritten.

MARKER=@MARKER@
MARKER_LEN=@MARKER_LEN@
MARKER_HEX=@MARKER_HEX@
ROOT=@ROOT@

WS=$' \t\n\r\v\f'
UNSUPPORTED='[][{}\]'
BAD_STAR='[^/][*][*]|[*][*][^/]'

if ! command -v shield >/dev/null 2>&1; then
    echo "shield is not on PATH, so the pre-commit hook cannot seal files." >&2
    echo "Install it (shield install) and make sure it is on PATH, then try again." >&2
    exit 1
fi

cd "$(git rev-parse --show-toplevel)" || exit 1

glob_to_regex() {
    local glob="$1" re="" i=0 c
    local n=${#glob}
    while (( i < n )); do
        c="${glob:i:1}"
        if [[ "$c" == '*' ]]; then
            if [[ "${glob:i+1:1}" == '*' ]]; then
                if [[ "${glob:i+2:1}" == '/' ]]; then
                    re+='(.*/)?'
                    i=$((i + 3))
                else
                    re+='.*'
                    i=$((i + 2))
                fi
                continue
            fi
            re+='[^/]*'
        elif [[ "$c" == '?' ]]; then
            re+='[^/]'
        else
            case "$c" in
                '.'|'+'|'('|')'|'|'|'^'|'$') re+="\\$c" ;;
                *) re+="$c" ;;
            esac
        fi
        i=$((i + 1))
    done
    printf '^%s$' "$re"
}

trim() {
    local s="$1"
    s="${s#"${s%%[!$WS]*}"}"
    s="${s%"${s##*[!$WS]}"}"
    printf '%s' "$s"
}

check_pattern() {
    if [[ "$1" == /* || "$1" =~ $UNSUPPORTED || "$1" =~ $BAD_STAR ]]; then
        echo "shield: unsupported pattern '$1' in $2" >&2
        exit 1
    fi
}

for pattern_file in "$ROOT/.shield" "$ROOT/.shieldignore"; do
    if [[ ! -r "$pattern_file" ]]; then
        echo "shield: cannot read $pattern_file" >&2
        exit 1
    fi
done

INCLUDE_RE=()
while IFS= read -r line || [[ -n "$line" ]]; do
    pattern="$(trim "$line")"
    [[ -z "$pattern" || "$pattern" == \#* ]] && continue
    check_pattern "$pattern" "$ROOT/.shield"
    INCLUDE_RE+=("$(glob_to_regex "$pattern")")
done < "$ROOT/.shield"

EXCLUDE_RE=()
while IFS= read -r line || [[ -n "$line" ]]; do
    pattern="$(trim "$line")"
    [[ -z "$pattern" || "$pattern" == \#* ]] && continue
    check_pattern "$pattern" "$ROOT/.shieldignore"
    EXCLUDE_RE+=("$(glob_to_regex "$pattern")")
done < "$ROOT/.shieldignore"

matches_any() {
    local path="$1" re
    shift
    for re in "$@"; do
        if [[ "$path" =~ $re ]]; then
            return 0
        fi
    done
    return 1
}

# Judge the blob in the index, which is what the commit will contain.
staged_is_sealed() {
    local head
    head="$(git cat-file blob ":$1" | head -c "$MARKER_LEN" | od -An -tx1 | tr -d ' \n')"
    [[ "$head" == "$MARKER_HEX" ]]
}

UNSEALED=()
while IFS= read -r -d '' path; do
    entry="$(git ls-files -s -- ":(literal)$path")"
    [[ "${entry%% *}" == 100* ]] || continue
    [[ "$path" == *@TEMP_SEAL@ || "$path" == *@TEMP_UNSEAL@ ]] && continue

    rel="$path"
    if [[ "$ROOT" != "." ]]; then
        [[ "$path" == "$ROOT/"* ]] || continue
        rel="${path#"$ROOT/"}"
    fi

    if (( ${#INCLUDE_RE[@]} == 0 )) || ! matches_any "$rel" "${INCLUDE_RE[@]}"; then
        continue
    fi
    if (( ${#EXCLUDE_RE[@]} > 0 )) && matches_any "$rel" "${EXCLUDE_RE[@]}"; then
        continue
    fi

    if ! staged_is_sealed "$path"; then
        echo "ERROR: $path is not sealed (expected $MARKER)."
        UNSEALED+=("$path")
    fi
done < <(git diff --cached --name-only --diff-filter=ACMR -z)

if (( ${#UNSEALED[@]} > 0 )); then
    echo "Some staged files are not sealed. Sealing them now..."
    if ! shield @SEAL_ARGS@; then
        echo "shield seal failed; commit aborted." >&2
        exit 1
    fi
    for file in "${UNSEALED[@]}"; do
        git add -- "$file"
    done
    echo "Files have been sealed and re-staged. Please re-run the commit command."
    exit 1
fi

exit 0
"#;

const POWERSHELL_TEMPLATE: &str = r#"#Requires -Version 5.0
# pre-commit hook generated by shield @SHIELD_VERSION@.
# Regenerate with `shield generate-hooks`; manual edits are overwritten.
$ErrorActionPreference = "Stop"

$Marker = @MARKER@
$Root = @ROOT@

if (!(Get-Command shield -ErrorAction SilentlyContinue)) {
    Write-Host "shield is not on PATH, so the pre-commit hook cannot seal files."
    Write-Host "Install it (shield install) and make sure it is on PATH, then try again."
    exit 1
}

Set-Location (git rev-parse --show-toplevel)
[Environment]::CurrentDirectory = (Get-Location).Path

function Convert-GlobToRegex([string]$Glob) {
    $re = New-Object System.Text.StringBuilder
    $i = 0
    while ($i -lt $Glob.Length) {
        $c = [string]$Glob[$i]
        if ($c -eq '*') {
            if (($i + 1 -lt $Glob.Length) -and ([string]$Glob[$i + 1] -eq '*')) {
                if (($i + 2 -lt $Glob.Length) -and ([string]$Glob[$i + 2] -eq '/')) {
                    [void]$re.Append('(.*/)?')
                    $i += 3
                } else {
                    [void]$re.Append('.*')
                    $i += 2
                }
                continue
            }
            [void]$re.Append('[^/]*')
        } elseif ($c -eq '?') {
            [void]$re.Append('[^/]')
        } else {
            [void]$re.Append([Regex]::Escape($c))
        }
        $i++
    }
    return '^' + $re.ToString() + '$'
}

$PatternWhitespace = [char[]]@(' ', "`t", "`n", "`r", [char]11, [char]12)

function Read-Patterns([string]$Path) {
    if (!(Test-Path -LiteralPath $Path -PathType Leaf)) {
        Write-Host "shield: cannot read $Path"
        exit 1
    }
    $result = @()
    foreach ($line in Get-Content -LiteralPath $Path) {
        $pattern = $line.Trim($PatternWhitespace)
        if ($pattern.Length -eq 0 -or $pattern.StartsWith('#')) { continue }
        if ($pattern.StartsWith('/') -or $pattern -cmatch '[\[\]{}\\]' -or $pattern -cmatch '[^/]\*\*|\*\*[^/]') {
            Write-Host "shield: unsupported pattern '$pattern' in $Path"
            exit 1
        }
        $result += Convert-GlobToRegex $pattern
    }
    return ,$result
}

# Judge the blob in the index, which is what the commit will contain.
function Test-StagedSealed([string]$Path) {
    $expected = [System.Text.Encoding]::ASCII.GetBytes($Marker)
    $psi = New-Object System.Diagnostics.ProcessStartInfo
    $psi.FileName = "git"
    $psi.Arguments = "cat-file blob `":$Path`""
    $psi.RedirectStandardOutput = $true
    $psi.UseShellExecute = $false
    $proc = [System.Diagnostics.Process]::Start($psi)
    $stream = $proc.StandardOutput.BaseStream
    $buffer = New-Object byte[] $expected.Length
    $read = 0
    while ($read -lt $buffer.Length) {
        $n = $stream.Read($buffer, $read, $buffer.Length - $read)
        if ($n -le 0) { break }
        $read += $n
    }
    $stream.CopyTo([System.IO.Stream]::Null)
    $proc.WaitForExit()
    if ($proc.ExitCode -ne 0 -or $read -lt $expected.Length) { return $false }
    for ($k = 0; $k -lt $expected.Length; $k++) {
        if ($buffer[$k] -ne $expected[$k]) { return $false }
    }
    return $true
}

$IncludeRe = Read-Patterns (Join-Path $Root '.shield')
$ExcludeRe = Read-Patterns (Join-Path $Root '.shieldignore')

$unsealed = @()
$staged = git -c core.quotepath=off diff --cached --name-only --diff-filter=ACMR

foreach ($path in $staged) {
    $path = $path.Trim()
    $entry = git ls-files -s -- ":(literal)$path"
    if (!$entry -or !([string]$entry).StartsWith('100')) { continue }
    if ($path.EndsWith('@TEMP_SEAL@') -or $path.EndsWith('@TEMP_UNSEAL@')) { continue }

    $rel = $path
    if ($Root -ne '.') {
        if (!$path.StartsWith("$Root/")) { continue }
        $rel = $path.Substring($Root.Length + 1)
    }

    $included = $false
    foreach ($re in $IncludeRe) {
        if ($rel -cmatch $re) { $included = $true; break }
    }
    if (!$included) { continue }

    $excluded = $false
    foreach ($re in $ExcludeRe) {
        if ($rel -cmatch $re) { $excluded = $true; break }
    }
    if ($excluded) { continue }

    if (!(Test-StagedSealed $path)) {
        Write-Host "ERROR: $path is not sealed (expected $Marker)."
        $unsealed += $path
    }
}

if ($unsealed.Count -ne 0) {
    Write-Host "Some staged files are not sealed. Sealing them now..."
    & shield @SEAL_ARGS@
    if ($LASTEXITCODE -ne 0) {
        Write-Host "shield seal failed; commit aborted."
        exit 1
    }
    foreach ($file in $unsealed) {
        git add -- $file
    }
    Write-Host "Files have been sealed and re-staged. Please re-run the commit command."
    exit 1
}

exit 0
"#;

const POWERSHELL_SHIM: &str = r#"#!/bin/sh
exec powershell.exe -NoProfile -ExecutionPolicy Bypass -File "$(dirname "$0")/pre-commit.ps1"
"#;

/// Render the hook script for `flavor`.
pub fn render(flavor: HookFlavor, ctx: &HookContext) -> String {
    let (template, quote): (&str, fn(&str) -> String) = match flavor {
        HookFlavor::Posix => (POSIX_TEMPLATE, sh_quote),
        HookFlavor::Powershell => (POWERSHELL_TEMPLATE, ps_quote),
    };

    let seal_args = ctx
        .seal_args()
        .iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    template
        .replace("@SHIELD_VERSION@", env!("CARGO_PKG_VERSION"))
        .replace("@MARKER_LEN@", &ctx.marker.len().to_string())
        .replace("@MARKER_HEX@", &hex::encode(ctx.marker.as_bytes()))
        .replace("@MARKER@", &quote(ctx.marker.as_str()))
        .replace("@ROOT@", &quote(&ctx.root))
        .replace("@SEAL_ARGS@", &seal_args)
        .replace("@TEMP_SEAL@", Operation::Seal.temp_suffix())
        .replace("@TEMP_UNSEAL@", Operation::Unseal.temp_suffix())
}

/// Write the pre-commit hook(s) into `hooks_dir`, replacing existing ones.
///
/// Returns the files written.
pub fn install(hooks_dir: &Path, flavor: HookFlavor, ctx: &HookContext) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(hooks_dir).map_err(|e| ShieldError::io_at(hooks_dir, e))?;

    let script = render(flavor, ctx);
    let hook_path = hooks_dir.join("pre-commit");

    let written = match flavor {
        HookFlavor::Posix => {
            write_hook(&hook_path, &script)?;
            vec![hook_path]
        }
        HookFlavor::Powershell => {
            let ps_path = hooks_dir.join("pre-commit.ps1");
            write_hook(&ps_path, &script)?;
            write_hook(&hook_path, POWERSHELL_SHIM)?;
            vec![ps_path, hook_path]
        }
    };

    debug!(dir = %hooks_dir.display(), files = written.len(), "installed hooks");
    Ok(written)
}

fn write_hook(path: &Path, content: &str) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ShieldError::io_at(path, e)),
    }

    fs::write(path, content).map_err(|e| ShieldError::io_at(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| ShieldError::io_at(path, e))?;
    }

    Ok(())
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternSet;
    use tempfile::TempDir;

    fn ctx() -> HookContext {
        HookContext {
            marker: SealMarker::new("1").unwrap(),
            root: ".".into(),
            cipher: CipherKind::Openssl,
            encryption_version: "1".into(),
        }
    }

    #[test]
    fn test_posix_script_embeds_marker() {
        let script = render(HookFlavor::Posix, &ctx());

        assert!(script.starts_with("#!/usr/bin/env bash"));
        assert!(script.contains("MARKER='SHIELD[1]:'"));
        assert!(script.contains("MARKER_LEN=10"));
        assert!(script.contains(&format!("MARKER_HEX={}", hex::encode("SHIELD[1]:"))));
        assert!(script.contains(
            "shield '-C' '.' '--cipher' 'openssl' '--encryption-version' '1' 'seal'"
        ));
        for placeholder in ["@SHIELD_VERSION@", "@MARKER", "@ROOT@", "@SEAL_ARGS@"] {
            assert!(!script.contains(placeholder), "{placeholder} left in script");
        }
    }

    #[test]
    fn test_powershell_script_embeds_marker() {
        let mut ctx = ctx();
        ctx.cipher = CipherKind::AesGcm;
        let script = render(HookFlavor::Powershell, &ctx);

        assert!(script.contains("$Marker = 'SHIELD[1]:'"));
        assert!(script.contains("'--cipher' 'aes-gcm'"));
        assert!(script.contains("-cmatch"));
        assert!(!script.contains("@MARKER"));
    }

    #[test]
    fn test_scripts_read_the_index() {
        for flavor in [HookFlavor::Posix, HookFlavor::Powershell] {
            let script = render(flavor, &ctx());
            assert!(script.contains("cat-file blob"), "{flavor:?}");
            assert!(script.contains("ls-files -s"), "{flavor:?}");
            assert!(script.contains(".shield-seal"), "{flavor:?}");
            assert!(script.contains(".shield-unseal"), "{flavor:?}");
            assert!(!script.contains("@TEMP_"), "{flavor:?}");
            assert!(!script.contains("OpenRead"), "{flavor:?}");
        }
    }

    #[test]
    fn test_root_is_quoted() {
        let mut ctx = ctx();
        ctx.root = "it's here".into();

        let posix = render(HookFlavor::Posix, &ctx);
        assert!(posix.contains(r"ROOT='it'\''s here'"));

        let ps = render(HookFlavor::Powershell, &ctx);
        assert!(ps.contains("$Root = 'it''s here'"));
    }

    #[test]
    fn test_install_posix_hook() {
        let temp = TempDir::new().unwrap();
        let hooks = temp.path().join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-commit"), "old hook").unwrap();

        let written = install(&hooks, HookFlavor::Posix, &ctx()).unwrap();

        assert_eq!(written, vec![hooks.join("pre-commit")]);
        let content = fs::read_to_string(hooks.join("pre-commit")).unwrap();
        assert!(content.contains("glob_to_regex"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(hooks.join("pre-commit"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_install_powershell_writes_shim() {
        let temp = TempDir::new().unwrap();
        let hooks = temp.path().join("hooks");

        let written = install(&hooks, HookFlavor::Powershell, &ctx()).unwrap();

        assert_eq!(written.len(), 2);
        let shim = fs::read_to_string(hooks.join("pre-commit")).unwrap();
        assert!(shim.contains("pre-commit.ps1"));
        assert!(hooks.join("pre-commit.ps1").exists());
    }

    /// The translation both scripts perform, for comparison with the resolver.
    fn glob_to_regex(glob: &str) -> String {
        let chars: Vec<char> = glob.chars().collect();
        let mut re = String::from("^");
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' if chars.get(i + 1) == Some(&'*') => {
                    if chars.get(i + 2) == Some(&'/') {
                        re.push_str("(.*/)?");
                        i += 3;
                    } else {
                        re.push_str(".*");
                        i += 2;
                    }
                    continue;
                }
                '*' => re.push_str("[^/]*"),
                '?' => re.push_str("[^/]"),
                c @ ('.' | '+' | '(' | ')' | '|' | '^' | '$') => {
                    re.push('\\');
                    re.push(c);
                }
                c => re.push(c),
            }
            i += 1;
        }
        re.push('$');
        re
    }

    #[test]
    fn test_glob_translation_agrees_with_resolver() {
        let include: Vec<String> = ["**/*.secret", "**/secrets/*.txt", "config/?.env", "keys/**"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let exclude: Vec<String> = ["test/*", "**/vendors/**", "keys/public.pem"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let patterns = PatternSet::new(&include, &exclude).unwrap();

        let compile = |globs: &[String]| -> Vec<regex::Regex> {
            globs
                .iter()
                .map(|g| regex::Regex::new(&glob_to_regex(g)).unwrap())
                .collect()
        };
        let include_re = compile(&include);
        let exclude_re = compile(&exclude);

        let paths = [
            "a.secret",
            "a/x.secret",
            "a/b/c/x.secret",
            "x.secret.bak",
            "secrets/w.txt",
            "deep/secrets/w.txt",
            "secrets/nested/w.txt",
            "test/y.secret",
            "test/deeper/y.secret",
            "vendors/z.secret",
            "lib/vendors/z.secret",
            "config/a.env",
            "config/ab.env",
            "config/sub/a.env",
            "keys/private.pem",
            "keys/public.pem",
            "keys/nested/id_rsa",
            "X.SECRET",
            "readme.md",
        ];

        for path in paths {
            let hook = include_re.iter().any(|re| re.is_match(path))
                && !exclude_re.iter().any(|re| re.is_match(path));
            assert_eq!(hook, patterns.matches(path), "disagreement on {path}");
        }
    }
}
