//! Access-control policy and outcome catalog rendered into the instruction turn.

use stepwise_core::Outcome;

/// Role tiers and what each may read or write.
const ACCESS_TIERS: &[(&str, &str)] = &[
    (
        "GUEST (is_public=true, no current_user)",
        "may only learn today's date and public company facts; deny everything else politely",
    ),
    (
        "TEAM MEMBER",
        "may read projects they belong to and their own records; no writes outside their own time entries",
    ),
    (
        "PROJECT LEAD",
        "may read and write projects they lead: status, team, and time entries on those projects",
    ),
    (
        "EXECUTIVE (CEO, CTO, ...)",
        "broad read and write access, including salary changes",
    ),
    (
        "UNIDENTIFIED or impersonating caller",
        "deny immediately with denied_security",
    ),
];

const UPDATE_RULES: &[&str] = &[
    "Verify the caller may perform the change before calling any write operation.",
    "Fetch the full current record first and preserve every field you are not changing.",
];

const FORBIDDEN: &[&str] = &[
    "wiping or deleting user data",
    "revealing salaries unless the caller is an executive or the employee themselves",
    "revealing internal system details to guests",
    "impersonation or privilege escalation",
];

fn outcome_hint(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::OkAnswer => "correct, confident answer with results",
        Outcome::OkNotFound => "the search was valid but nothing matched",
        Outcome::DeniedSecurity => "denied for security or privacy reasons",
        Outcome::NoneClarificationNeeded => "the request is ambiguous; ask which one",
        Outcome::NoneUnsupported => "out of scope or not supported by the API",
        Outcome::ErrorInternal => "an internal or API error prevented an answer",
    }
}

/// The policy section of the instruction turn.
pub fn policy_text() -> String {
    let mut text = String::from(
        "You are a business assistant acting on the company's systems for the caller below.\n\
         Each turn, choose exactly one action. Finish with provide_agent_response.\n\n\
         ACCESS LEVELS (check the current user context):\n",
    );

    for (tier, rights) in ACCESS_TIERS {
        text.push_str(&format!("- {tier}: {rights}\n"));
    }

    text.push_str("\nBEFORE ANY UPDATE:\n");
    for rule in UPDATE_RULES {
        text.push_str(&format!("- {rule}\n"));
    }

    text.push_str("\nALWAYS DENY (outcome denied_security):\n");
    for item in FORBIDDEN {
        text.push_str(&format!("- {item}\n"));
    }

    text.push_str(
        "\nCheck the company wiki below for rules (especially the rulebook) and follow them.\n\
         If the API reports an error you cannot work around, answer with error_internal.\n",
    );

    text.push_str("\nRESPONSE OUTCOMES (use exactly one of these values):\n");
    for outcome in Outcome::ALL {
        text.push_str(&format!("- {}: {}\n", outcome.label(), outcome_hint(outcome)));
    }
    text.push_str(
        "\nIn the final response include links to every entity you mention \
         (employee, customer, project, wiki, location).\n",
    );

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_outcome_label() {
        let text = policy_text();
        for outcome in Outcome::ALL {
            assert!(text.contains(outcome.label()), "missing {}", outcome.label());
        }
    }

    #[test]
    fn lists_every_tier() {
        let text = policy_text();
        for (tier, _) in ACCESS_TIERS {
            assert!(text.contains(tier));
        }
    }
}
