//! # Case Subcommands
//!
//! Commands that read or write stored case versions through an
//! [`Amender`].
//!
//! ## Subcommands
//!
//! - `create` — Store a snapshot file as version 1 of a new case.
//! - `amend` — Apply a library action by its step label.
//! - `versions` — List the versions of a case.
//! - `cases` — List every case, most recently updated first.
//! - `history` — Show the amendment log of a case.
//! - `show` — Print a stored snapshot.
//! - `phase` — Infer the current phase and its legal successors.
//! - `validate` — Validate a stored version and log the verdict. Exits 1
//!   when the case fails.
//! - `validations` — Show the validation history of a case.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use kyc_amend::{
    Amender, AmendmentOutcome, AmendmentRecord, CaseSummary, ValidationRecord, ValidationStatus,
    VersionInfo,
};
use kyc_core::{CaseName, SHORT_HASH_LEN};
use kyc_state::{next_allowed_phases, Action};

/// Case subcommands.
#[derive(Subcommand, Debug)]
pub enum CaseCommand {
    /// Store a snapshot file as version 1 of a new case.
    Create {
        /// Path to the snapshot file.
        file: PathBuf,
    },

    /// Apply one lifecycle step to the latest version of a case.
    Amend {
        /// Case name (e.g., "FUND-001").
        case: String,
        /// Step label: policy-discovery, document-solicitation,
        /// ownership-discovery, risk-assessment, regulator-notify,
        /// approve, decline, or review.
        #[arg(long)]
        step: String,
    },

    /// List the versions of a case.
    Versions {
        case: String,
    },

    /// List every case.
    Cases,

    /// Show the amendment log of a case.
    History {
        case: String,
    },

    /// Print a stored snapshot.
    Show {
        case: String,
        /// Version to print instead of the latest.
        #[arg(long)]
        version: Option<u32>,
    },

    /// Infer the current phase of a case.
    Phase {
        case: String,
    },

    /// Validate a stored version and record the verdict.
    Validate {
        case: String,
        /// Version to validate instead of the latest.
        #[arg(long)]
        version: Option<u32>,
        /// Who the verdict is attributed to (default: KYC_ACTOR or "System").
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show the validation history of a case, newest first.
    Validations {
        case: String,
    },
}

/// Execute a case subcommand, writing its report to `out`.
pub async fn run_case(command: &CaseCommand, amender: &Amender, out: &mut dyn Write) -> Result<u8> {
    match command {
        CaseCommand::Create { file } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read snapshot {}", file.display()))?;
            let outcome = amender.create_case(&text).await?;
            writeln!(
                out,
                "Created {} version {} ({})",
                outcome.case_name,
                outcome.version,
                outcome.short_hash()
            )?;
        }
        CaseCommand::Amend { case, step } => {
            let Some(action) = Action::from_step_label(step) else {
                let known: Vec<&str> = Action::ALL.iter().map(|a| a.step_label()).collect();
                bail!("unknown step '{step}' (expected one of: {})", known.join(", "));
            };
            let outcome = amender.apply_action(&case_name(case)?, action).await?;
            write!(out, "{}", format_outcome(&outcome))?;
        }
        CaseCommand::Versions { case } => {
            let versions = amender.store().list_versions(case).await?;
            if versions.is_empty() {
                bail!("case {case} not found");
            }
            write!(out, "{}", format_versions(&versions))?;
        }
        CaseCommand::Cases => {
            let cases = amender.store().list_cases().await?;
            write!(out, "{}", format_cases(&cases))?;
        }
        CaseCommand::History { case } => {
            let log = amender.store().list_amendments(case).await?;
            write!(out, "{}", format_history(&log))?;
        }
        CaseCommand::Show { case, version } => {
            let (stored, _) = amender.load(&case_name(case)?, *version).await?;
            writeln!(
                out,
                ";; {} version {} ({}) {}",
                stored.case_name,
                stored.version,
                short(&stored.content_hash),
                stored.created_at
            )?;
            write!(out, "{}", stored.snapshot)?;
        }
        CaseCommand::Phase { case } => {
            let phase = amender.current_phase(&case_name(case)?).await?;
            writeln!(out, "{phase}: {}", phase.definition().description)?;
            let next: Vec<&str> = next_allowed_phases(phase).iter().map(|p| p.as_str()).collect();
            if next.is_empty() {
                writeln!(out, "terminal phase")?;
            } else {
                writeln!(out, "next: {}", next.join(", "))?;
            }
        }
        CaseCommand::Validate {
            case,
            version,
            actor,
        } => {
            let actor = actor.as_deref().unwrap_or(&amender.config().actor);
            let record = amender.validate(&case_name(case)?, *version, actor).await?;
            write!(out, "{}", format_verdict(&record))?;
            if record.status == ValidationStatus::Fail {
                return Ok(1);
            }
        }
        CaseCommand::Validations { case } => {
            let history = amender.validations(&case_name(case)?).await?;
            write!(out, "{}", format_validations(&history))?;
        }
    }
    Ok(0)
}

fn case_name(raw: &str) -> Result<CaseName> {
    CaseName::new(raw).with_context(|| format!("invalid case name '{raw}'"))
}

fn short(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

// ─── Formatting ──────────────────────────────────────────────────────

pub fn format_outcome(outcome: &AmendmentOutcome) -> String {
    let mut s = format!(
        "{} version {} ({}) {} [{}] phase {}\n",
        outcome.case_name,
        outcome.version,
        outcome.short_hash(),
        outcome.step,
        outcome.classification,
        outcome.phase
    );
    s.push_str(&outcome.diff);
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

pub fn format_versions(versions: &[VersionInfo]) -> String {
    let mut s = format!("{:<8} {:<12} {}\n", "VERSION", "HASH", "CREATED");
    for v in versions {
        s.push_str(&format!(
            "{:<8} {:<12} {}\n",
            v.version,
            short(&v.content_hash),
            v.created_at
        ));
    }
    s
}

pub fn format_cases(cases: &[CaseSummary]) -> String {
    if cases.is_empty() {
        return "no cases\n".to_string();
    }
    let width = cases.iter().map(|c| c.name.len()).max().unwrap_or(4).max(4);
    let mut s = format!(
        "{:<width$} {:>8} {:<8} {}\n",
        "NAME", "VERSIONS", "STATUS", "LAST UPDATED"
    );
    for c in cases {
        s.push_str(&format!(
            "{:<width$} {:>8} {:<8} {}\n",
            c.name,
            c.version_count,
            c.status.as_str(),
            c.last_updated
        ));
    }
    s
}

pub fn format_history(log: &[AmendmentRecord]) -> String {
    if log.is_empty() {
        return "no amendments\n".to_string();
    }
    let mut s = String::new();
    for record in log {
        s.push_str(&format!(
            "#{} {} {} [{}]\n",
            record.id, record.created_at, record.step, record.classification
        ));
        for line in record.diff.lines() {
            s.push_str("    ");
            s.push_str(line);
            s.push('\n');
        }
    }
    s
}

pub fn format_verdict(record: &ValidationRecord) -> String {
    let mut s = format!(
        "{} version {} {} ({}/{} checks passed, actor: {})\n",
        record.case_name,
        record.version,
        record.status,
        record.passed_checks,
        record.total_checks,
        record.actor
    );
    if let Some(message) = &record.error_message {
        s.push_str(message);
        s.push('\n');
    }
    s
}

pub fn format_validations(history: &[ValidationRecord]) -> String {
    if history.is_empty() {
        return "no validations\n".to_string();
    }
    let mut s = String::new();
    for record in history {
        s.push_str(&format!(
            "#{} {} v{} {} {} by {}\n",
            record.id,
            record.created_at,
            record.version,
            record.step,
            record.status,
            record.actor
        ));
        if let Some(message) = &record.error_message {
            for line in message.lines() {
                s.push_str("    ");
                s.push_str(line);
                s.push('\n');
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kyc_amend::{AmendConfig, MemoryVersionStore, VersionStore};
    use kyc_core::{CaseStatus, Timestamp};
    use kyc_dsl::SexprCodec;

    fn amender() -> Amender {
        Amender::new(
            Arc::new(MemoryVersionStore::new()),
            Arc::new(SexprCodec::new().unwrap()),
            AmendConfig::default(),
        )
    }

    const SNAPSHOT: &str = r#"(kyc-case FUND-001
  (nature-purpose (nature "Corporate") (purpose "Fund administration"))
  (client-business-unit ACME-CBU)
  (kyc-token "pending"))
"#;

    async fn run(amender: &Amender, command: CaseCommand) -> Result<String> {
        let mut out = Vec::new();
        run_case(&command, amender, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn create_amend_and_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fund.kyc");
        std::fs::write(&file, SNAPSHOT).unwrap();
        let amender = amender();

        let text = run(&amender, CaseCommand::Create { file }).await.unwrap();
        assert!(text.starts_with("Created FUND-001 version 1 ("));

        let text = run(
            &amender,
            CaseCommand::Amend {
                case: "FUND-001".into(),
                step: "policy-discovery".into(),
            },
        )
        .await
        .unwrap();
        assert!(text.contains("[policy-injection] phase POLICY_DISCOVERY"));
        assert!(text.contains("+ (policy KYCPOL-UK-2025)"));

        let text = run(&amender, CaseCommand::Versions { case: "FUND-001".into() })
            .await
            .unwrap();
        assert_eq!(text.lines().count(), 3);

        let text = run(&amender, CaseCommand::History { case: "FUND-001".into() })
            .await
            .unwrap();
        assert!(text.contains("CASE-CREATION [initialization]"));
        assert!(text.contains("policy-discovery [policy-injection]"));

        let text = run(
            &amender,
            CaseCommand::Show {
                case: "FUND-001".into(),
                version: Some(1),
            },
        )
        .await
        .unwrap();
        assert!(text.contains(";; FUND-001 version 1"));
        assert!(!text.contains("(policy"));

        let text = run(&amender, CaseCommand::Phase { case: "FUND-001".into() })
            .await
            .unwrap();
        assert!(text.starts_with("POLICY_DISCOVERY: "));
        assert!(text.contains("next: DOCUMENT_SOLICITATION"));

        let text = run(&amender, CaseCommand::Cases).await.unwrap();
        assert!(text.contains("FUND-001"));
    }

    #[tokio::test]
    async fn unknown_step_and_case_are_errors() {
        let amender = amender();
        let err = run(
            &amender,
            CaseCommand::Amend {
                case: "FUND-001".into(),
                step: "launder".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unknown step 'launder'"));

        let err = run(&amender, CaseCommand::Versions { case: "NOPE".into() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "case NOPE not found");

        assert!(run(&amender, CaseCommand::Phase { case: "bad name".into() })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn validate_reports_verdicts_and_exit_codes() {
        let store = Arc::new(MemoryVersionStore::new());
        let amender = Amender::new(
            store.clone(),
            Arc::new(SexprCodec::new().unwrap()),
            AmendConfig::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fund.kyc");
        std::fs::write(&file, SNAPSHOT).unwrap();
        run(&amender, CaseCommand::Create { file }).await.unwrap();

        let mut out = Vec::new();
        let command = CaseCommand::Validate {
            case: "FUND-001".into(),
            version: None,
            actor: None,
        };
        let code = run_case(&command, &amender, &mut out).await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "FUND-001 version 1 PASS (1/1 checks passed, actor: System)\n"
        );

        let broken = SNAPSHOT.replace("  (kyc-token \"pending\"))\n", ")\n");
        store
            .insert_version(kyc_amend::NewVersion {
                case_name: "FUND-001".into(),
                version: 2,
                content_hash: kyc_core::snapshot_hash(&broken),
                snapshot: broken,
                status: CaseStatus::Pending,
            })
            .await
            .unwrap();

        let mut out = Vec::new();
        let command = CaseCommand::Validate {
            case: "FUND-001".into(),
            version: None,
            actor: Some("auditor".into()),
        };
        let code = run_case(&command, &amender, &mut out).await.unwrap();
        assert_eq!(code, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("FUND-001 version 2 FAIL (0/1 checks passed, actor: auditor)\n"));
        assert!(text.contains("structure: "));

        let text = run(&amender, CaseCommand::Validations { case: "FUND-001".into() })
            .await
            .unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| l.starts_with('#')).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].ends_with("v2 validate FAIL by auditor"));
        assert!(rows[2].ends_with("v0 CASE-CREATION PASS by System"));
    }

    #[test]
    fn empty_listings() {
        assert_eq!(format_cases(&[]), "no cases\n");
        assert_eq!(format_history(&[]), "no amendments\n");
        assert_eq!(format_validations(&[]), "no validations\n");
    }

    #[test]
    fn case_table_pads_names() {
        let ts = Timestamp::parse("2025-06-01T09:30:00Z").unwrap();
        let text = format_cases(&[CaseSummary {
            name: "AVIVA-EU-EQUITY-FUND".into(),
            version_count: 3,
            status: CaseStatus::Complete,
            last_updated: ts,
        }]);
        let rows: Vec<&str> = text.lines().collect();
        assert!(rows[0].starts_with("NAME                 VERSIONS"));
        assert!(rows[1].ends_with("complete 2025-06-01T09:30:00Z"));
    }
}
