//! # Snapshot Serializer
//!
//! Writes cases back to snapshot text in a fixed layout: two-space
//! indentation, one entry per line, sections in a fixed order, and a blank
//! line after every case. The output for a given [`Case`] is always
//! byte-identical, which is what makes the positional amendment diff
//! meaningful.

use kyc_core::{Case, CaseStatus, OwnerStake};

use crate::sexpr::quote;

/// Serialize `cases` into one snapshot document.
pub fn serialize_cases(cases: &[Case]) -> String {
    let mut out = String::new();
    for case in cases {
        out.push_str(&serialize_case(case));
        out.push_str("\n\n");
    }
    out
}

/// Serialize a single case.
pub fn serialize_case(case: &Case) -> String {
    let mut s = String::new();
    s.push_str(&format!("(kyc-case {}\n", case.name));

    if !case.nature.is_empty() || !case.purpose.is_empty() {
        s.push_str("  (nature-purpose\n");
        if !case.nature.is_empty() {
            s.push_str(&format!("    (nature {})\n", quote(&case.nature)));
        }
        if !case.purpose.is_empty() {
            s.push_str(&format!("    (purpose {})\n", quote(&case.purpose)));
        }
        s.push_str("  )\n");
    }

    if !case.client_business_unit.is_empty() {
        s.push_str(&format!("  (client-business-unit {})\n", atom_or_quoted(&case.client_business_unit)));
    }
    for p in &case.policies {
        s.push_str(&format!("  (policy {})\n", atom_or_quoted(&p.code)));
    }
    for o in &case.obligations {
        s.push_str(&format!("  (obligation {})\n", atom_or_quoted(&o.code)));
    }
    for f in &case.functions {
        match f.status {
            CaseStatus::Pending => {
                s.push_str(&format!("  (function {})\n", atom_or_quoted(&f.action)));
            }
            status => {
                s.push_str(&format!("  (function {} {status})\n", atom_or_quoted(&f.action)));
            }
        }
    }

    if let Some(own) = &case.ownership {
        s.push_str("  (ownership-structure\n");
        for o in &own.legal_owners {
            s.push_str(&format!("    (owner {})\n", stake(o)));
        }
        for o in &own.beneficial_owners {
            s.push_str(&format!("    (beneficial-owner {})\n", stake(o)));
        }
        for c in &own.controllers {
            s.push_str(&format!("    (controller {} {})\n", atom_or_quoted(&c.name), quote(&c.role)));
        }
        for r in &own.operational_roles {
            s.push_str(&format!("    (role {} {})\n", atom_or_quoted(&r.name), quote(&r.role)));
        }
        s.push_str("  )\n");
    }

    if let Some(token) = &case.token {
        s.push_str(&format!("  (kyc-token {})\n", quote(&token.status)));
    }
    if case.status != CaseStatus::Pending {
        s.push_str(&format!("  (status {})\n", case.status));
    }
    s.push_str(")\n");
    s
}

fn stake(o: &OwnerStake) -> String {
    format!("{} {}%", atom_or_quoted(&o.name), percent(o.percent))
}

fn percent(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{p:.0}")
    } else {
        format!("{p}")
    }
}

/// Codes and names are written bare unless they would not read back as a
/// single atom.
fn atom_or_quoted(s: &str) -> String {
    let bare = !s.is_empty()
        && s
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';'));
    if bare {
        s.to_string()
    } else {
        quote(s)
    }
}
