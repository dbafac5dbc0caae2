use super::context::open_ledger;
use quorum::Principal;

/// Credit the pool. Any sender may deposit.
pub async fn execute(
    config: Option<String>,
    from: Principal,
    amount: u128,
) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = open_ledger(config).await?;
    let balance = ledger.deposit(from, amount).await?;
    println!("Balance: {}", balance);
    Ok(())
}
