//! Verification report for a signed `rDE`.
//!
//! Aggregates the outcome of each check performed by the XMLDSig verifier so
//! callers (the CLI, tests) can report exactly which step failed.

/// Result of verifying a signed document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureReport {
    /// `Signature` is the sibling directly after `DE`, in the DSig default
    /// namespace, with the expected algorithms and a reference to `#<DE Id>`.
    pub structure_ok: bool,
    /// Recomputed digest of the referenced `DE` matches `DigestValue`.
    pub digest_ok: bool,
    /// `SignatureValue` validates over the canonical `SignedInfo` with the
    /// embedded certificate's public key.
    pub signature_ok: bool,
    /// `KeyInfo` carries a parsable X.509 certificate.
    pub certificate_present: bool,
    /// Human-readable reasons for every failed check.
    pub problems: Vec<String>,
}

impl SignatureReport {
    /// True only if every check passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.structure_ok && self.digest_ok && self.signature_ok && self.certificate_present
    }
}
