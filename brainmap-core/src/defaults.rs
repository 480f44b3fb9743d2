//! Built-in incident response playbooks, used when no saved collection exists.

use crate::model::{Branch, Color, Playbook, Step, Target};

pub fn default_playbooks() -> Vec<Playbook> {
    vec![phishing(), ransomware(), malware_attack(), data_exfiltration()]
}

fn phishing() -> Playbook {
    Playbook {
        title: "Phishing".into(),
        index: 20,
        color: Color::rgb(0xFF, 0x6B, 0x35),
        steps: vec![
            Step::standard(
                "Triage the report",
                "Confirm the reporter, collect the original message with full headers.",
            ),
            Step::condition(
                "Analyze the message",
                "Detonate attachments in a sandbox and expand every URL.",
                vec![
                    Branch::new(
                        "Contains attachment",
                        "A payload was delivered; treat the recipient host as infected.",
                        Target::playbook("Malware Attack", 100, 2),
                    ),
                    Branch::new(
                        "Credential harvesting link",
                        "The link leads to a login page clone.",
                        Target::Step(3),
                    ),
                    Branch::new(
                        "Spam only",
                        "No malicious content found.",
                        Target::Step(5),
                    ),
                ],
            ),
            Step::standard(
                "Quarantine the message",
                "Pull every copy from mailboxes tenant-wide.",
            ),
            Step::standard(
                "Reset exposed credentials",
                "Force password resets and revoke active sessions for anyone who submitted credentials.",
            )
            .with_link(Branch::new(
                "Data exfiltration",
                "Follow up if the account had access to sensitive data.",
                Target::playbook("Data Exfiltration", 150, 0),
            )),
            Step::standard(
                "Block sender and indicators",
                "Add sender domain, URLs and hashes to the blocklists.",
            ),
            Step::standard(
                "Close and document",
                "Record indicators and notify the reporter.",
            ),
        ],
    }
}

fn malware_attack() -> Playbook {
    Playbook {
        title: "Malware Attack".into(),
        index: 100,
        color: Color::rgb(0xC0, 0x39, 0x2B),
        steps: vec![
            Step::standard(
                "Isolate affected host",
                "Use EDR network containment; keep the host powered on.",
            ),
            Step::standard(
                "Collect volatile evidence",
                "Capture memory, running processes and open connections.",
            ),
            Step::standard(
                "Scan for persistence mechanisms",
                "Check services, scheduled tasks, run keys and startup folders.",
            ),
            Step::condition(
                "Check for encryption activity",
                "Look for mass file renames and ransom notes.",
                vec![
                    Branch::new(
                        "Files being encrypted",
                        "Escalate to the ransomware procedure.",
                        Target::playbook("Ransomware", 45, 0),
                    ),
                    Branch::new(
                        "No encryption",
                        "Continue with eradication.",
                        Target::Step(4),
                    ),
                ],
            ),
            Step::standard(
                "Eradicate and restore",
                "Reimage the host and restore user data from a known-good backup.",
            ),
            Step::standard(
                "Post-incident review",
                "Identify the initial access vector and update detections.",
            ),
        ],
    }
}

fn ransomware() -> Playbook {
    Playbook {
        title: "Ransomware".into(),
        index: 45,
        color: Color::rgb(0x8E, 0x44, 0xAD),
        steps: vec![
            Step::standard(
                "Disconnect from network",
                "Isolate affected segments and disable shared drives.",
            ),
            Step::standard(
                "Identify the strain",
                "Match the ransom note and extension against known families.",
            )
            .with_link(Branch::new(
                "Persistence sweep",
                "Hunt for the loader that delivered the payload.",
                Target::playbook("Malware Attack", 100, 2),
            )),
            Step::condition(
                "Assess backups",
                "Verify backups are intact and were not reachable by the attacker.",
                vec![
                    Branch::new("Clean backups available", "", Target::Step(3)),
                    Branch::new("No usable backups", "", Target::Step(4)),
                ],
            ),
            Step::standard(
                "Restore from backup",
                "Rebuild systems and restore data in priority order.",
            ),
            Step::standard(
                "Engage legal and leadership",
                "Decide on disclosure and negotiation posture.",
            ),
        ],
    }
}

fn data_exfiltration() -> Playbook {
    Playbook {
        title: "Data Exfiltration".into(),
        index: 150,
        color: Color::rgb(0x29, 0x80, 0xB9),
        steps: vec![
            Step::standard(
                "Scope the exposure",
                "Determine which data left, when, and through which channel.",
            ),
            Step::standard(
                "Contain the channel",
                "Revoke tokens, block destinations and disable compromised accounts.",
            ),
            Step::condition(
                "Regulated data involved?",
                "Personal, health or payment data triggers notification duties.",
                vec![
                    Branch::new("Yes", "", Target::Step(3)),
                    Branch::new("No", "", Target::Step(4)),
                ],
            ),
            Step::standard(
                "Notify regulators",
                "File notifications within the statutory deadline.",
            ),
            Step::standard(
                "Harden and monitor",
                "Add DLP rules and watch for reuse of the stolen data.",
            )
            .with_link(Branch::new(
                "Phishing follow-up",
                "Many exfiltration cases start with a phished account.",
                Target::playbook("Phishing", 20, 0),
            )),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_collection;

    #[test]
    fn test_defaults_are_valid() {
        let playbooks = default_playbooks();
        assert_eq!(playbooks.len(), 4);
        validate_collection(&playbooks, 200).unwrap();
    }

    #[test]
    fn test_default_cross_references_resolve() {
        let playbooks = default_playbooks();
        for playbook in &playbooks {
            for (_, branch) in playbook.branches() {
                if let Target::Playbook { title, index, step } = &branch.target {
                    let target = playbooks
                        .iter()
                        .find(|p| &p.title == title)
                        .unwrap_or_else(|| panic!("dangling reference to {title}"));
                    assert_eq!(Some(target.index), *index);
                    assert!(step.unwrap_or(0) < target.steps.len());
                }
            }
        }
    }
}
