use super::context::open_ledger;
use quorum::ledger::ProposalStatus;

/// Show the owner set, pool balance and every proposal's status
pub async fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;

    println!("Owners ({} of {} required):", ledger.threshold(), ledger.owners().len());
    for owner in ledger.owners() {
        println!("  {}", owner);
    }
    println!("Balance: {}", ledger.balance().await);

    let count = ledger.proposal_count().await;
    println!("Proposals: {}", count);
    for index in 0..count {
        let view = ledger.get_proposal(index).await?;
        let status = match ledger.proposal_status(index).await? {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Executable => "executable",
            ProposalStatus::Executed => "executed",
        };
        println!(
            "  #{} {} {}/{} value={} to={}",
            index,
            status,
            view.confirmations,
            ledger.threshold(),
            view.value,
            view.target
        );
    }
    Ok(())
}
