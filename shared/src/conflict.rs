//! Last-write-wins conflict resolution
//!
//! A pure decision function shared by every sync participant: the server's
//! batch processor and the device mirror apply the same rule, so both sides
//! converge on the same winner for any pair of divergent writes.
//!
//! # Known limitation
//!
//! Comparing one coarse per-record timestamp means a concurrent edit to a
//! *different* field of the same entity loses wholesale; there is no
//! field-level merging. This is an accepted simplification of the design,
//! not a bug.

/// Anything carrying a last-updated timestamp in epoch millis
pub trait Timestamped {
    fn updated_at_millis(&self) -> i64;
}

/// Decide whether an incoming write supersedes the existing record
///
/// - No existing record: always apply (first write wins trivially).
/// - Otherwise apply iff `incoming.updated_at >= existing.updated_at`;
///   ties are broken in favor of the incoming write.
pub fn should_apply<E: Timestamped, I: Timestamped>(existing: Option<&E>, incoming: &I) -> bool {
    match existing {
        None => true,
        Some(current) => incoming.updated_at_millis() >= current.updated_at_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec(i64);
    impl Timestamped for Rec {
        fn updated_at_millis(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn absent_always_applies() {
        assert!(should_apply(None::<&Rec>, &Rec(0)));
        assert!(should_apply(None::<&Rec>, &Rec(-5)));
    }

    #[test]
    fn older_incoming_rejected() {
        assert!(!should_apply(Some(&Rec(100)), &Rec(99)));
    }

    #[test]
    fn newer_incoming_applies() {
        assert!(should_apply(Some(&Rec(100)), &Rec(101)));
    }

    #[test]
    fn tie_favors_incoming() {
        assert!(should_apply(Some(&Rec(100)), &Rec(100)));
    }
}
