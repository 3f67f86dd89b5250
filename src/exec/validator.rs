//! Command Denylist Engine
//!
//! This module classifies a raw command string as safe-to-run or blocked,
//! using pattern matching over a case-insensitive copy of the command. The
//! original command text is never altered.
//!
//! # Security Model
//!
//! This is a heuristic blacklist, not a sandbox. It rejects known-dangerous
//! invocations (root filesystem deletion, power control, raw disk writes)
//! but can be evaded through shell metacharacter obfuscation, binary
//! renaming, or encoding. That limitation is documented and deliberate;
//! adding more patterns cannot make it complete.

use lazy_static::lazy_static;
use regex::Regex;

/// Outcome of validating a command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No denylist pattern matched; the command may be executed.
    Allowed,
    /// A denylist pattern matched; carries the human-readable category.
    Blocked(&'static str),
}

/// A compiled denylist pattern with its category reason.
struct DenyPattern {
    reason: &'static str,
    regex: Regex,
}

// Block-device names we refuse to read from or write to.
const BLOCK_DEVICE: &str = r"(sd[a-z]\d*|vd[a-z]\d*|nvme\d+n\d+(p\d+)?)";

lazy_static! {
    // `rm` invocations whose flags include both recursive and force variants
    // (in either flag order) targeting `/` or `/*` as a standalone argument.
    static ref RM_ROOT_PATTERNS: [Regex; 2] = [
        Regex::new(r"\brm\b[^;&|]*-[^;&|]*r[^;&|]*f[^;&|]*\s+(/\s*($|[;&|])|/\*\s*($|[;&|]))")
            .expect("invalid rm -rf pattern"),
        Regex::new(r"\brm\b[^;&|]*-[^;&|]*f[^;&|]*r[^;&|]*\s+(/\s*($|[;&|])|/\*\s*($|[;&|]))")
            .expect("invalid rm -fr pattern"),
    ];

    // Category patterns, anchored at the start of the string or immediately
    // after a command separator. Checked in order; first match wins.
    static ref DENY_PATTERNS: Vec<DenyPattern> = vec![
        DenyPattern {
            reason: "power control command",
            regex: Regex::new(r"(^|[;&|])\s*(shutdown|reboot|halt|poweroff)\b")
                .expect("invalid power control pattern"),
        },
        DenyPattern {
            reason: "runlevel switch command",
            regex: Regex::new(r"(^|[;&|])\s*init\s+[06]\b")
                .expect("invalid runlevel pattern"),
        },
        DenyPattern {
            reason: "system power control command",
            regex: Regex::new(r"(^|[;&|])\s*systemctl\s+(reboot|poweroff|halt)\b")
                .expect("invalid systemctl pattern"),
        },
        DenyPattern {
            reason: "disk formatting/partition command",
            regex: Regex::new(r"(^|[;&|])\s*(mkfs(\.[a-z0-9_+-]+)?|fdisk|sfdisk|parted|wipefs)\b")
                .expect("invalid disk tool pattern"),
        },
        DenyPattern {
            reason: "raw disk copy command",
            regex: Regex::new(r"(^|[;&|])\s*dd\b").expect("invalid dd pattern"),
        },
        DenyPattern {
            reason: "block-device access argument",
            regex: Regex::new(&format!(r"\b(of|if)=/dev/{BLOCK_DEVICE}\b"))
                .expect("invalid block-device argument pattern"),
        },
        DenyPattern {
            reason: "block-device overwrite",
            regex: Regex::new(&format!(r"(^|[;&|])\s*:\s*>\s*/dev/{BLOCK_DEVICE}\b"))
                .expect("invalid block-device overwrite pattern"),
        },
        DenyPattern {
            reason: "kill-all command",
            regex: Regex::new(r"(^|[;&|])\s*kill\s+-9\s+-?1\b")
                .expect("invalid kill-all pattern"),
        },
    ];
}

/// Classify a command string against the denylist.
///
/// Matching happens on a lowercased copy, so `RM -RF /` and `Shutdown` are
/// caught. Precedence: the `--no-preserve-root` check runs first, then the
/// root-deletion patterns, then the category patterns; the most severe and
/// most specific reason must not be masked by a generic match.
///
/// Empty and oversized commands are rejected by the supervisor entry point
/// before this function runs; it only decides dangerous vs. not.
///
/// # Example
///
/// ```
/// use cmdgate::exec::{validate, Verdict};
///
/// assert_eq!(validate("echo hello"), Verdict::Allowed);
/// assert_eq!(
///     validate("rm -rf /"),
///     Verdict::Blocked("root filesystem deletion")
/// );
/// ```
pub fn validate(command: &str) -> Verdict {
    let lower = command.to_lowercase();

    if lower.contains("--no-preserve-root") {
        return Verdict::Blocked("dangerous rm flag");
    }

    if RM_ROOT_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        return Verdict::Blocked("root filesystem deletion");
    }

    for pattern in DENY_PATTERNS.iter() {
        if pattern.regex.is_match(&lower) {
            return Verdict::Blocked(pattern.reason);
        }
    }

    Verdict::Allowed
}
