//! Output formatting utilities.

use colored::Colorize;
use crowdchain_dao::{Transition, WalkthroughReport};
use crowdchain_funding::Milestone;
use crowdchain_types::Address;
use tabled::{Table, Tabled};

/// Shorten a long identifier to `head...tail`.
pub fn format_short(s: &str) -> String {
    if s.len() > 20 {
        format!("{}...{}", &s[..12], &s[s.len() - 6..])
    } else {
        s.to_string()
    }
}

pub fn format_address(addr: &Address) -> String {
    format_short(&addr.to_string())
}

pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

#[derive(Tabled)]
pub struct MilestoneRow {
    #[tabled(rename = "ID")]
    pub id: u64,
    #[tabled(rename = "Amount")]
    pub amount: String,
    #[tabled(rename = "Description")]
    pub description: String,
    #[tabled(rename = "Released")]
    pub released: String,
}

impl From<&Milestone> for MilestoneRow {
    fn from(m: &Milestone) -> Self {
        Self {
            id: m.id,
            amount: m.amount.to_string(),
            description: m.description.clone(),
            released: if m.released { "yes".to_string() } else { "no".to_string() },
        }
    }
}

#[derive(Tabled)]
pub struct TransitionRow {
    #[tabled(rename = "Proposal")]
    pub proposal: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "At")]
    pub at: u64,
}

impl From<&Transition> for TransitionRow {
    fn from(t: &Transition) -> Self {
        Self {
            proposal: t.proposal.clone(),
            state: t.state.to_string(),
            at: t.at,
        }
    }
}

pub fn milestone_table(milestones: &[Milestone]) -> String {
    Table::new(milestones.iter().map(MilestoneRow::from)).to_string()
}

pub fn transition_table(transitions: &[Transition]) -> String {
    Table::new(transitions.iter().map(TransitionRow::from)).to_string()
}

/// Human-readable walkthrough summary.
pub fn print_walkthrough(report: &WalkthroughReport) {
    println!();
    println!("{}", "Walkthrough".bold().underline());
    println!("  Campaign:    {}", format_address(&report.campaign).cyan());
    println!("  Treasury:    {}", format_address(&report.treasury).cyan());
    println!("  Beneficiary: {}", format_address(&report.beneficiary).cyan());
    println!("  Add proposal:     {}", report.add_proposal.short());
    println!("  Release proposal: {}", report.release_proposal.short());
    println!();

    println!("{}", "Proposal states".bold());
    println!("{}", transition_table(&report.transitions));
    println!();

    println!("{}", "Milestones".bold());
    if report.milestones.is_empty() {
        print_warning("treasury has no milestones");
    } else {
        println!("{}", milestone_table(&report.milestones));
    }
    println!();

    print_success(&format!("Beneficiary balance: {}", report.beneficiary_balance));
    print_info(&format!("Treasury balance: {}", report.treasury_balance));
}
