//! Change classification recorded with each amendment.

use kyc_core::Case;

/// Step label of the amendment that creates a case.
pub const CASE_CREATION: &str = "CASE-CREATION";

/// Classification for step labels outside the fixed table.
pub const GENERIC_AMENDMENT: &str = "generic-amendment";

/// Classify an amendment by its step label.
///
/// `approve` reads the token of the amended case, so the classification
/// reflects the status that was actually written.
pub fn classify_change(step_label: &str, case: &Case) -> String {
    let fixed = match step_label {
        CASE_CREATION => "initialization",
        "policy-discovery" => "policy-injection",
        "document-solicitation" => "obligation-addition",
        "ownership-discovery" => "ownership-tree",
        "risk-assessment" => "risk-assessment",
        "regulator-notify" => "regulator-notification",
        "approve" => {
            return match &case.token {
                Some(token) => format!("token-update:{}", token.status),
                None => "finalization-approved".to_string(),
            }
        }
        "decline" => "finalization-declined",
        "review" => "status-review",
        _ => GENERIC_AMENDMENT,
    };
    fixed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_core::CaseName;
    use kyc_state::{apply_action, Action};

    fn fund() -> Case {
        Case::new(CaseName::new("FUND-001").unwrap(), "Corporate", "Fund", "ACME-CBU")
    }

    #[test]
    fn fixed_table() {
        let case = fund();
        for (label, expected) in [
            ("CASE-CREATION", "initialization"),
            ("policy-discovery", "policy-injection"),
            ("document-solicitation", "obligation-addition"),
            ("ownership-discovery", "ownership-tree"),
            ("risk-assessment", "risk-assessment"),
            ("regulator-notify", "regulator-notification"),
            ("decline", "finalization-declined"),
            ("review", "status-review"),
            ("POLICY-DISCOVERY", "generic-amendment"),
            ("", "generic-amendment"),
        ] {
            assert_eq!(classify_change(label, &case), expected, "{label}");
        }
    }

    #[test]
    fn approve_reads_the_token() {
        let approved = apply_action(fund(), &Action::from_step_label("approve").unwrap());
        assert_eq!(classify_change("approve", &approved), "token-update:approved");

        let mut tokenless = fund();
        tokenless.token = None;
        assert_eq!(classify_change("approve", &tokenless), "finalization-approved");
    }

    #[test]
    fn every_action_label_is_classified() {
        let case = fund();
        for action in Action::ALL {
            assert_ne!(classify_change(action.step_label(), &case), GENERIC_AMENDMENT);
        }
    }
}
